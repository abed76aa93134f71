//! LogSink - logs batch summary via tracing

use std::collections::HashSet;

use contracts::{ContractError, EventRecord, RecordSink};
use tracing::{info, instrument};

/// Sink that logs batch summaries instead of persisting them
pub struct LogSink {
    name: String,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, records: &[EventRecord]) {
        let sessions: HashSet<&str> = records.iter().map(|r| r.session.as_str()).collect();
        let first = records.first().map(|r| r.server_time.to_rfc3339());
        let last = records.last().map(|r| r.server_time.to_rfc3339());

        info!(
            sink = %self.name,
            records = records.len(),
            sessions = sessions.len(),
            first_server_time = ?first,
            last_server_time = ?last,
            "Batch received"
        );
    }
}

impl RecordSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_save",
        skip(self, records),
        fields(sink = %self.name, records = records.len())
    )]
    async fn save(&self, records: &[EventRecord]) -> Result<(), ContractError> {
        self.log_batch_summary(records);
        Ok(())
    }
}
