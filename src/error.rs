//! ShieldChat error types

use thiserror::Error;

/// ShieldChat error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scanner service unreachable or returned a malformed response
    #[error("Scanner error: {0}")]
    Scanner(String),

    /// Model provider call failed (timeout, quota, network)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Authentication failure
    #[error("Auth error: {0}")]
    Auth(String),

    /// Caller lacks permission for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request failed validation before reaching the pipeline
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conversation store error
    #[error("Store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Scanner(_) => "SCANNER_ERROR",
            Error::Provider(_) => "PROVIDER_ERROR",
            Error::Auth(_) => "AUTH_ERROR",
            Error::Forbidden(_) => "FORBIDDEN",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Store(_) => "STORE_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

/// Result type alias for ShieldChat operations
pub type Result<T> = std::result::Result<T, Error>;
