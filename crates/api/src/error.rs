//! Server and Request Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ring_buffer::RingBufferError;
use sampler::SamplerError;
use serde_json::json;
use thiserror::Error;

/// Errors that stop the server from starting or running
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Socket bind or serve failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),

    /// Rate limiter rejected its quota
    #[error("Rate limit configuration rejected: {0}")]
    RateLimit(String),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    RingBuffer(#[from] RingBufferError),
}

/// Errors that fail a single request
#[derive(Debug, Error)]
pub enum ApiError {
    /// Per-request snapshot state could not be allocated
    #[error("Snapshot buffer of {0} bytes could not be allocated")]
    ResourceExhausted(usize),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::ResourceExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_exhausted_is_503() {
        let response = ApiError::ResourceExhausted(1024).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
