use std::io;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostboardError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Key parsing error: {0}")]
    KeyParsing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Anyhow error: {0}")]
    Anyhow(String),
}

impl From<serde_json::Error> for PostboardError {
    fn from(err: serde_json::Error) -> Self {
        PostboardError::Json(err.to_string())
    }
}

impl From<io::Error> for PostboardError {
    fn from(err: io::Error) -> Self {
        PostboardError::Io(err.to_string())
    }
}

impl From<anyhow::Error> for PostboardError {
    fn from(err: anyhow::Error) -> Self {
        PostboardError::Anyhow(err.to_string())
    }
}
