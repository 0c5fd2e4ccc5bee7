// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the reader, normalizer, catalog and retriever can surface.
/// Only the HTTP layer decides which status code each kind becomes.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Requested stats file / recording does not exist.
    #[error("file does not exist: {}", .path.display())]
    NotFound {
        path: PathBuf,
        /// Expected location of the stats file(s), e.g. `<dir>/*.csv`.
        pattern: Option<String>,
    },

    /// Malformed delimited content.
    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// A column the normalizer relies on is missing.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// Bad request parameter.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DashboardError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        DashboardError::NotFound {
            path: path.into(),
            pattern: None,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        DashboardError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
