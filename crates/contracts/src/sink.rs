//! RecordSink trait - durable persistence interface used by the buffered store

use crate::{ContractError, EventRecord};

/// Batch persistence trait
///
/// A call either persists the whole batch and returns `Ok`, or returns an
/// error and nothing is considered persisted. The caller bounds each call
/// with its own deadline and drops the future once it expires.
#[trait_variant::make(RecordSink: Send)]
pub trait LocalRecordSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Persist a batch of records, preserving their order
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn save(&self, records: &[EventRecord]) -> Result<(), ContractError>;
}
