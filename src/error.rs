//! Error types for the ticker digest service

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for aggregation operations
pub type Result<T> = std::result::Result<T, AggregatorError>;

#[derive(Error, Debug)]
pub enum AggregatorError {

    // =============================
    // Request-level Errors
    // =============================

    #[error("Missing required parameter '{0}' in the query string")]
    MissingParameter(String),

    #[error("Unauthorized: {0}")]
    AuthFailure(String),

    // =============================
    // Pipeline Errors
    // =============================

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("No market data for {ticker} on or before {date}")]
    NotFound { ticker: String, date: String },

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    #[error("Parse error: {0}")]
    ParseFailure(String),

    #[error("Persistence error: {0}")]
    PersistenceFailure(String),

    #[error("Duplicate document: {0}")]
    Duplicate(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl AggregatorError {
    /// HTTP status this error surfaces as at the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            AggregatorError::MissingParameter(_) => StatusCode::BAD_REQUEST,
            AggregatorError::AuthFailure(_) => StatusCode::UNAUTHORIZED,
            AggregatorError::UpstreamUnavailable(_) | AggregatorError::HttpError(_) => {
                StatusCode::BAD_GATEWAY
            }
            AggregatorError::NotFound { .. } => StatusCode::NOT_FOUND,
            AggregatorError::DivisionByZero(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AggregatorError::Duplicate(_) => StatusCode::CONFLICT,
            AggregatorError::ParseFailure(_)
            | AggregatorError::PersistenceFailure(_)
            | AggregatorError::Config(_)
            | AggregatorError::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure aborts the whole request instead of degrading one category
    pub fn is_request_level(&self) -> bool {
        matches!(
            self,
            AggregatorError::MissingParameter(_) | AggregatorError::AuthFailure(_)
        )
    }
}
