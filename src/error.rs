//! Error types and denied-response handlers.
//!
//! The decision core itself is infallible — malformed input degrades to a
//! non-match or a default-allow. The one user-visible failure is the 403
//! produced here when the gate denies, always with cache-disabled headers
//! so intermediaries never serve a cached verdict.

use axum::response::{IntoResponse, Response};
use http::{header, StatusCode};
use std::fmt;

/// Apply no-cache headers to a response carrying an access verdict.
fn disable_caching(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache, no-store, must-revalidate, max-age=0"),
    );
    headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, header::HeaderValue::from_static("0"));
}

/// Error returned when the gate denies a request.
#[derive(Debug, Clone)]
pub struct AccessDenied {
    /// The normalized path that was requested.
    pub path: String,
    /// Role slugs the denied principal held.
    pub roles: Vec<String>,
    /// Optional custom message.
    pub message: Option<String>,
}

impl AccessDenied {
    /// Create a new access denied error.
    pub fn new(path: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            path: path.into(),
            roles: roles.into_iter().map(Into::into).collect(),
            message: None,
        }
    }

    /// Add a custom message to the error.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn body_text(&self) -> String {
        match &self.message {
            Some(msg) => msg.clone(),
            None => "Access forbidden".to_string(),
        }
    }
}

impl fmt::Display for AccessDenied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{msg}"),
            None => write!(f, "access forbidden for path '{}'", self.path),
        }
    }
}

impl std::error::Error for AccessDenied {}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::FORBIDDEN, self.body_text()).into_response();
        disable_caching(&mut response);
        response
    }
}

/// Error type for gate operations.
#[derive(Debug, thiserror::Error)]
pub enum DirGateError {
    /// Access was denied by a gate rule.
    #[error("access denied: {0}")]
    AccessDenied(#[from] AccessDenied),

    /// The rule provider failed to supply a rule set.
    #[error("rule provider error: {0}")]
    Provider(String),
}

impl IntoResponse for DirGateError {
    fn into_response(self) -> Response {
        match self {
            Self::AccessDenied(denied) => denied.into_response(),
            Self::Provider(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("gate error: {msg}")).into_response()
            }
        }
    }
}

/// Custom response handler for denied requests.
///
/// Implement this trait to customize the 403 the gate produces.
///
/// # Example
/// ```
/// use axum_dirgate::{DeniedHandler, AccessDenied};
/// use axum::response::{Response, IntoResponse};
/// use http::StatusCode;
///
/// struct PlainHandler;
///
/// impl DeniedHandler for PlainHandler {
///     fn handle(&self, denied: &AccessDenied) -> Response {
///         (StatusCode::FORBIDDEN, "members only").into_response()
///     }
/// }
/// ```
pub trait DeniedHandler: Send + Sync {
    /// Handle a denied request and produce the terminal response.
    fn handle(&self, denied: &AccessDenied) -> Response;
}

/// Default handler: plain-text 403 with cache-disabled headers.
#[derive(Debug, Clone, Default)]
pub struct DefaultDeniedHandler;

impl DeniedHandler for DefaultDeniedHandler {
    fn handle(&self, denied: &AccessDenied) -> Response {
        denied.clone().into_response()
    }
}

/// Handler that returns a JSON 403 response.
#[derive(Debug, Clone, Default)]
pub struct JsonDeniedHandler {
    include_details: bool,
}

impl JsonDeniedHandler {
    /// Create a new JSON denied handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Include the requested path and held roles in the response body.
    ///
    /// Exposing these to clients may be unwanted in production.
    pub fn with_details(mut self) -> Self {
        self.include_details = true;
        self
    }
}

impl DeniedHandler for JsonDeniedHandler {
    fn handle(&self, denied: &AccessDenied) -> Response {
        use axum::Json;

        let body = if self.include_details {
            serde_json::json!({
                "error": "access_denied",
                "message": denied.message.as_deref().unwrap_or("Access forbidden"),
                "path": denied.path,
                "roles": denied.roles,
            })
        } else {
            serde_json::json!({
                "error": "access_denied",
                "message": denied.message.as_deref().unwrap_or("Access forbidden"),
            })
        };

        let mut response = (StatusCode::FORBIDDEN, Json(body)).into_response();
        disable_caching(&mut response);
        response
    }
}
