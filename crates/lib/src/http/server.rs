//! HTTP file server: every method and every path goes to the static file responder.

use crate::http::static_files::{self, FileLookup};
use crate::storage::StorageBackend;
use axum::extract::State;
use axum::http::{Method, Uri};
use axum::Router;
use std::sync::Arc;

/// Shared state for the HTTP listener.
#[derive(Clone)]
pub struct HttpState {
    pub storage: Arc<dyn StorageBackend>,
}

/// Router with a single fallback handler, so there is no route that can 404 before storage is consulted.
pub fn router(storage: Arc<dyn StorageBackend>) -> Router {
    Router::new()
        .fallback(serve_file)
        .with_state(HttpState { storage })
}

async fn serve_file(State(state): State<HttpState>, method: Method, uri: Uri) -> FileLookup {
    log::debug!("HTTP {} {}", method, uri.path());
    static_files::lookup(state.storage.as_ref(), uri.path()).await
}
