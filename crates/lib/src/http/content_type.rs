//! Request path → MIME type.

/// Suffix table; first match wins. Matching is case-sensitive on the full path.
const CONTENT_TYPES: &[(&str, &str)] = &[
    (".html", "text/html"),
    (".css", "text/css"),
    (".js", "application/javascript"),
    (".json", "application/json"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".gif", "image/gif"),
    (".svg", "image/svg+xml"),
    (".ico", "image/x-icon"),
];

const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// Content type for a file path. Total: unknown or missing extensions map to `text/plain`.
pub fn content_type_for(path: &str) -> &'static str {
    CONTENT_TYPES
        .iter()
        .find(|(suffix, _)| path.ends_with(suffix))
        .map(|(_, mime)| *mime)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}
