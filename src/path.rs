//! URL path normalization.
//!
//! Rule paths and request paths are compared as plain strings, so both sides
//! must go through the same canonical form first: trimmed, exactly one
//! leading `/`, no trailing `/` (except for the root path itself).
//!
//! No percent-decoding or case-folding is performed.

/// Normalize a URL path to its comparable form.
///
/// - Surrounding whitespace is trimmed.
/// - Empty input yields an empty string (callers treat that as "no path").
/// - A leading `/` is added if missing.
/// - Trailing `/` characters are stripped, unless the whole path is `/`.
///
/// The function is idempotent: `normalize(normalize(p)) == normalize(p)`.
///
/// # Example
/// ```
/// use axum_dirgate::path::normalize;
///
/// assert_eq!(normalize("foo/bar/"), "/foo/bar");
/// assert_eq!(normalize("/"), "/");
/// assert_eq!(normalize(""), "");
/// ```
pub fn normalize(path: &str) -> String {
    let p = path.trim();
    if p.is_empty() {
        return String::new();
    }
    let mut out = if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{p}")
    };
    if out != "/" {
        while out.ends_with('/') {
            out.pop();
        }
    }
    out
}

/// Extract the normalized path from a raw request URI.
///
/// Everything from the first `?` on is discarded, then the remainder is
/// passed through [`normalize`]. An empty URI yields an empty string.
///
/// # Example
/// ```
/// use axum_dirgate::path::request_path;
///
/// assert_eq!(request_path("/members/reports/?page=2"), "/members/reports");
/// assert_eq!(request_path(""), "");
/// ```
pub fn request_path(raw_uri: &str) -> String {
    if raw_uri.is_empty() {
        return String::new();
    }
    let without_query = raw_uri.split('?').next().unwrap_or("");
    normalize(without_query)
}
