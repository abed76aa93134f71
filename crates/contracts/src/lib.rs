//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data flow
//! - HTTP boundary builds [`EventRecord`]s and appends them to the buffered store
//! - The store hands ordered batches to a [`RecordSink`]

mod error;
mod record;
mod service;
mod sink;

pub use error::*;
pub use record::{client_time, EventRecord, CLIENT_TIME_FORMAT};
pub use service::*;
pub use sink::{LocalRecordSink, RecordSink};
