//! # Buffered Store
//!
//! In-memory accumulation of event records with periodic bulk persistence.
//!
//! Responsibilities:
//! - Accept concurrent appends without ever blocking on the sink
//! - Flush the pending prefix to a `RecordSink` on a fixed interval
//! - Remove exactly the persisted prefix, retry failures on the next tick
//! - Drain everything still pending on shutdown

pub mod error;
pub mod metrics;
pub mod store;

pub use contracts::{EventRecord, RecordSink};
pub use error::StoreError;
pub use metrics::{StoreMetrics, StoreMetricsSnapshot};
pub use store::{BufferedStore, StoreConfig};
