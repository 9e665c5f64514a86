//! Error types for the audio translation layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Middleware error: {0}")]
    Middleware(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, AtlError>;
