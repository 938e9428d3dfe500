use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{service} timed out after {after:?}")]
    Timeout { service: String, after: Duration },

    #[error("{service} failed: {message}")]
    Upstream { service: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn upstream(service: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Upstream { service: service.into(), message: err.to_string() }
    }

    /// True for the recoverable category: a dependency failed or was too slow.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Upstream { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
