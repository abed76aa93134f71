//! ConfiguredSink - runtime sink selection behind a single concrete type
//!
//! The buffered store is generic over its sink; the binary picks one from
//! configuration, so the choice is folded into this enum.

use contracts::{ContractError, EventRecord, RecordSink, SinkConfig};
use tracing::instrument;

use crate::error::SinkError;
use crate::{ClickHouseSink, FileSink, LogSink};

/// Any sink the service can be configured with
pub enum ConfiguredSink {
    ClickHouse(ClickHouseSink),
    Log(LogSink),
    File(FileSink),
}

impl ConfiguredSink {
    /// Prepare the destination before the first save
    pub async fn initialize(&self) -> Result<(), SinkError> {
        match self {
            Self::ClickHouse(sink) => sink.initialize().await,
            Self::Log(_) | Self::File(_) => Ok(()),
        }
    }
}

impl RecordSink for ConfiguredSink {
    fn name(&self) -> &str {
        match self {
            Self::ClickHouse(sink) => sink.name(),
            Self::Log(sink) => sink.name(),
            Self::File(sink) => sink.name(),
        }
    }

    async fn save(&self, records: &[EventRecord]) -> Result<(), ContractError> {
        match self {
            Self::ClickHouse(sink) => sink.save(records).await,
            Self::Log(sink) => sink.save(records).await,
            Self::File(sink) => sink.save(records).await,
        }
    }
}

/// Create a sink from configuration
#[instrument(name = "sinks_create", skip(config), fields(sink_type = config.kind()))]
pub fn create_sink(config: &SinkConfig) -> Result<ConfiguredSink, SinkError> {
    let name = config.kind();
    match config {
        SinkConfig::ClickHouse(cfg) => Ok(ConfiguredSink::ClickHouse(ClickHouseSink::new(
            name,
            cfg.clone(),
        ))),
        SinkConfig::Log => Ok(ConfiguredSink::Log(LogSink::new(name))),
        SinkConfig::File(cfg) => FileSink::new(name, cfg.clone())
            .map(ConfiguredSink::File)
            .map_err(|e| SinkError::sink_creation(name, e.to_string())),
    }
}
