//! Error types for the HTTP/SSE server, mapped to status codes at the boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors the server layer can produce, on top of the cell-scoped errors
/// `notebook_core::Error` already carries.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The engine reported a cell-scoped or infrastructure error.
    #[error(transparent)]
    Core(#[from] notebook_core::Error),

    /// A request body failed to parse or violated a precondition.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The referenced cell does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type for server handlers.
pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Core(notebook_core::Error::CellNotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = axum::Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
