//! Sink error types

use thiserror::Error;

/// Sink-specific errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// ClickHouse client error
    #[error("clickhouse error: {0}")]
    ClickHouse(#[from] clickhouse::error::Error),
}

impl SinkError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
