// crates/common/src/error.rs
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing or invalid credentials: {0}")]
    Credentials(String),

    #[error("Listing fetch failed: {0}")]
    Listing(String),

    #[error("Quote fetch failed: {0}")]
    Quote(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl Error {
    /// Errors that stop a run before any scoring starts
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Credentials(_) | Error::Config(_))
    }
}
