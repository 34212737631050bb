use axum::{http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid scoring configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Live data source unavailable: {0}")]
    FetchUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No scoring run has been published yet")]
    NotReady,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

/// Per-record failure raised by the normalizer. The record is dropped from
/// the run; the rest of the batch is still scored.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalizationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("record is not a key/value object")]
    NotAnObject,
}
