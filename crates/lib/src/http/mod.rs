//! HTTP file serving with captive-portal semantics.

mod content_type;
mod server;
mod static_files;

pub use content_type::content_type_for;
pub use server::{router, HttpState};
pub use static_files::{lookup, normalize_path, FileLookup, ServedFile};
