use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unavailable(String),
}

// Implementing the Display trait allows us to convert ApiError into a string representation
impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Unavailable(msg) => write!(f, "Sensors unavailable: {}", msg),
        }
    }
}

// tells axum how to convert ApiError into an HTTP response
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!("{}", self);
        let status = match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}
