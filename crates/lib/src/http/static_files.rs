//! Static file responder: request path → file stream or a structured failure.
//!
//! Captive-portal semantics come from routing every path (and every method) here;
//! the root path aliases `/index.html`. No directory listing, no rewriting beyond that.

use crate::http::content_type::content_type_for;
use crate::storage::{StorageBackend, StoredFile};
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

const INDEX_PATH: &str = "/index.html";

const UNAVAILABLE_BODY: &str =
    "<html><body><h1>SD Card Error</h1><p>SD card not available</p></body></html>";

const OPEN_ERROR_BODY: &str =
    "<html><body><h1>File Error</h1><p>Could not open file</p></body></html>";

/// Outcome of resolving one request path against storage.
#[derive(Debug)]
pub enum FileLookup {
    /// Storage not mounted (503).
    Unavailable,
    /// Storage mounted, path absent (404).
    NotFound { path: String },
    /// Path present but could not be opened (500).
    OpenError { path: String, error: std::io::Error },
    /// File ready to stream (200).
    Found(ServedFile),
}

/// An opened file with its resolved content type.
#[derive(Debug)]
pub struct ServedFile {
    pub path: String,
    pub content_type: &'static str,
    pub file: StoredFile,
}

impl FileLookup {
    pub fn status(&self) -> StatusCode {
        match self {
            FileLookup::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            FileLookup::NotFound { .. } => StatusCode::NOT_FOUND,
            FileLookup::OpenError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            FileLookup::Found(_) => StatusCode::OK,
        }
    }
}

/// Empty path and `/` become `/index.html`; everything else is returned unchanged.
pub fn normalize_path(path: &str) -> &str {
    if path.is_empty() || path == "/" {
        INDEX_PATH
    } else {
        path
    }
}

/// Resolve `path` against `storage` in one attempt. The mount check comes first, so an
/// unmounted backend yields `Unavailable` for every path.
pub async fn lookup(storage: &dyn StorageBackend, path: &str) -> FileLookup {
    let path = normalize_path(path);
    if !storage.is_mounted() {
        return FileLookup::Unavailable;
    }
    if !storage.exists(path).await {
        return FileLookup::NotFound {
            path: path.to_string(),
        };
    }
    match storage.open(path).await {
        Ok(file) => FileLookup::Found(ServedFile {
            path: path.to_string(),
            content_type: content_type_for(path),
            file,
        }),
        Err(error) => FileLookup::OpenError {
            path: path.to_string(),
            error,
        },
    }
}

fn not_found_body(path: &str) -> String {
    let mut body = String::from("<html><body style='font-family: Arial; padding: 20px;'>");
    body.push_str("<h1>404 - Not Found</h1>");
    body.push_str("<p>File not found: <code>");
    push_escaped(&mut body, path);
    body.push_str("</code></p>");
    body.push_str("<p>Make sure files are on the SD card</p>");
    body.push_str("</body></html>");
    body
}

/// Escape the characters that would let a request path open markup.
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
}

fn html(status: StatusCode, body: impl Into<Body>) -> Response {
    (status, [(header::CONTENT_TYPE, "text/html")], body.into()).into_response()
}

impl IntoResponse for FileLookup {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            FileLookup::Unavailable => {
                log::debug!("  -> 503: storage not available");
                html(status, UNAVAILABLE_BODY)
            }
            FileLookup::NotFound { path } => {
                log::debug!("  -> 404: file not found: {}", path);
                html(status, not_found_body(&path))
            }
            FileLookup::OpenError { path, error } => {
                log::warn!("  -> 500: could not open {}: {}", path, error);
                html(status, OPEN_ERROR_BODY)
            }
            FileLookup::Found(served) => {
                let size = served.file.size();
                log::debug!(
                    "  -> 200: serving {} ({} bytes, {})",
                    served.path,
                    size,
                    served.content_type
                );
                let body = Body::from_stream(ReaderStream::new(served.file.into_reader()));
                (
                    status,
                    [
                        (header::CONTENT_TYPE, served.content_type.to_string()),
                        (header::CONTENT_LENGTH, size.to_string()),
                    ],
                    body,
                )
                    .into_response()
            }
        }
    }
}
