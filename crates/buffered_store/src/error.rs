//! Buffered store error types

use std::time::Duration;

use thiserror::Error;

/// Store-specific errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Sink rejected the batch (from contract)
    #[error("sink error: {0}")]
    Sink(#[from] contracts::ContractError),

    /// Sink did not answer within the save timeout
    #[error("sink '{sink}' save timed out after {timeout:?}")]
    SaveTimeout { sink: String, timeout: Duration },

    /// `start` called on a store whose flush loop already runs
    #[error("store flush loop already started")]
    AlreadyStarted,

    /// Final flush on shutdown failed; pending records were not persisted
    #[error("final drain failed with {pending} records pending: {source}")]
    Drain {
        pending: usize,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    /// Create a save timeout error
    pub fn save_timeout(sink: impl Into<String>, timeout: Duration) -> Self {
        Self::SaveTimeout {
            sink: sink.into(),
            timeout,
        }
    }
}
