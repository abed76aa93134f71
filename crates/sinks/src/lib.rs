//! # Sinks
//!
//! Durable destinations for flushed event batches.
//!
//! Responsibilities:
//! - Implement `RecordSink` for ClickHouse, local JSON-lines files and logs
//! - Build the configured sink at startup
//! - Prepare the destination (table creation) before traffic arrives

pub mod clickhouse;
pub mod configured;
pub mod error;
pub mod file;
pub mod log;

pub use contracts::{EventRecord, RecordSink};
pub use self::clickhouse::{AnalyticsRow, ClickHouseSink};
pub use configured::{create_sink, ConfiguredSink};
pub use error::SinkError;
pub use file::FileSink;
pub use log::LogSink;
