//! # Ingestion
//!
//! HTTP boundary of the analytics pipeline.
//!
//! Responsibilities:
//! - Route `/`, `/ping`, `/submit` and `/health`
//! - Decode the `/submit` body as a stream of JSON events
//! - Check required fields, enrich with client address and receipt time
//! - Append accepted records to the buffered store
//! - Per-request access log with request ids
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::IngestServer;
//!
//! let store = BufferedStore::new(sink, StoreConfig::from(&blueprint.store));
//! store.start()?;
//!
//! let server = IngestServer::new(blueprint.server.clone(), Arc::clone(&store));
//! server.run(cancel.clone()).await?;
//! store.stop().await?;
//! ```

mod decode;
mod error;
mod event;
mod handlers;
mod middleware;
mod server;

// Re-exports
pub use decode::{decode_events, DecodedBatch};
pub use error::{IngestError, Result};
pub use event::{RawEvent, REQUIRED_FIELDS};
pub use middleware::{client_address, ClientAddr, LoggerOptions, RequestId, REQUEST_ID_HEADER};
pub use server::{build_router, IngestServer};
