// Custom error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RatesError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid listing data: {0}")]
    DataIntegrity(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No rate history recorded yet")]
    Empty,

    #[error("Cannot compute change: {0}")]
    DivisionGuard(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

/// A type alias for Result that uses our custom error type
pub type Result<T> = std::result::Result<T, RatesError>;
