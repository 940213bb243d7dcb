//! # Error Handling
//!
//! Custom error types and their conversion to HTTP responses.
//!
//! ## The wire contract is deliberately narrow:
//! The native client inspects response *bodies*, not status codes, for
//! transcription failures - those travel as HTTP 200 with a populated `error`
//! field and never reach this module. What lands here is the plumbing-level
//! failures: a missing request field (400), an unknown route (404), or a server
//! fault (500). All of them serialize as a flat `{"error": "<message>"}` object
//! because that is the exact shape the client parses.

use actix_web::{http::header, HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Error types for the request-handling layer.
///
/// ## Error Categories:
/// - **BadRequest**: Client sent invalid or incomplete data (400)
/// - **NotFound**: Requested route doesn't exist (404)
/// - **Internal**: Server-side problems that shouldn't happen (500)
#[derive(Debug)]
pub enum AppError {
    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested route was not found
    NotFound(String),

    /// Internal server errors (I/O failures, worker pool issues, etc.)
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Converts errors into the HTTP responses the client expects.
///
/// ## JSON Response Format:
/// ```json
/// {"error": "No path provided"}
/// ```
///
/// The message goes into the body verbatim - no envelope, no timestamp. Every
/// response also carries `Access-Control-Allow-Origin: *` so browser-hosted
/// clients can read error bodies too.
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (actix_web::http::StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (actix_web::http::StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (actix_web::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        HttpResponse::build(status)
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(json!({ "error": message }))
    }
}

/// Anyhow errors surfacing in a handler are server faults by definition;
/// everything the client can cause is mapped explicitly before this point.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>` used by the handler layer.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_maps_to_400() {
        let err = AppError::BadRequest("No path provided".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = AppError::NotFound("Not found".to_string());
        let resp = err.error_response();
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_responses_carry_cors_header() {
        let err = AppError::NotFound("Not found".to_string());
        let resp = err.error_response();
        assert_eq!(
            resp.headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .map(|v| v.to_str().unwrap_or_default()),
            Some("*")
        );
    }
}
