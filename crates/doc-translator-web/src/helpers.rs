//! Helper types and traits for cleaner route handlers.
//!
//! Provides extension traits for converting `Option` and `Result` types
//! into HTTP-appropriate error responses, reducing boilerplate in routes.

use axum::http::StatusCode;
use doc_translator_core::{Error, ErrorKind};
use tracing::{error, warn};

/// Standard result type for route handlers.
pub type RouteResult<T> = Result<T, (StatusCode, String)>;

/// Extension trait for converting `Option<T>` to `RouteResult<T>`.
///
/// Provides convenient methods for returning 404 Not Found when
/// an expected resource (like a session) doesn't exist.
pub trait OptionExt<T> {
    /// Returns the contained value or a 404 Not Found error.
    fn or_not_found(self, msg: &str) -> RouteResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, msg: &str) -> RouteResult<T> {
        self.ok_or_else(|| (StatusCode::NOT_FOUND, msg.to_string()))
    }
}

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
///
/// Provides convenient methods for converting errors into
/// appropriate HTTP status codes.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;

    /// Converts the error to 400 Bad Request.
    fn or_bad_request(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }

    fn or_bad_request(self) -> RouteResult<T> {
        self.map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
    }
}

/// Extension trait mapping library errors to their HTTP status.
pub trait WorkflowResultExt<T> {
    fn or_status(self) -> RouteResult<T>;
}

impl<T> WorkflowResultExt<T> for doc_translator_core::Result<T> {
    fn or_status(self) -> RouteResult<T> {
        self.map_err(|e| error_response(&e))
    }
}

/// HTTP status for a library error.
pub const fn status_for(err: &Error) -> StatusCode {
    match err.kind() {
        ErrorKind::DocumentParse => StatusCode::BAD_REQUEST,
        ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::Gateway => match err {
            Error::GatewayRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::BAD_GATEWAY,
        },
        ErrorKind::InvalidState | ErrorKind::SessionBusy => StatusCode::CONFLICT,
        ErrorKind::Encode | ErrorKind::Config | ErrorKind::Io => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub fn error_response(err: &Error) -> (StatusCode, String) {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Request failed: {err}");
    } else {
        warn!("Request rejected ({status}): {err}");
    }
    (status, err.to_string())
}
