//! HTTP route handlers
//!
//! # Endpoints
//!
//! - `GET /` - greeting with the resolved client address
//! - `GET /ping` - server time
//! - `POST /submit` - stream of JSON events
//! - `GET /health` - liveness plus pending record count

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use buffered_store::BufferedStore;
use bytes::Bytes;
use chrono::Utc;
use contracts::RecordSink;
use serde_json::json;
use tracing::warn;

use crate::decode::decode_events;
use crate::middleware::ClientAddr;

/// GET /
pub async fn index(Extension(ClientAddr(client)): Extension<ClientAddr>) -> String {
    format!("Hi, {client}")
}

/// GET /ping
pub async fn ping() -> String {
    format!("Server time: {}", Utc::now().to_rfc3339())
}

/// POST /submit - decode, validate, enrich and buffer events
pub async fn submit<S>(
    State(store): State<Arc<BufferedStore<S>>>,
    Extension(ClientAddr(client)): Extension<ClientAddr>,
    body: Bytes,
) -> Response
where
    S: RecordSink + Sync + 'static,
{
    let server_time = Utc::now();
    let batch = decode_events(&body, &client, server_time);

    observability::record_events_rejected("decode", batch.malformed);
    observability::record_events_rejected("required", batch.incomplete);

    let entries_count = batch.records.len();
    if let Err(e) = store.append(batch.records) {
        warn!(entries_count, error = %e, "Failed to save in memory storage");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
    }

    observability::record_events_received(entries_count);
    StatusCode::CREATED.into_response()
}

/// GET /health
pub async fn health<S>(State(store): State<Arc<BufferedStore<S>>>) -> Json<serde_json::Value>
where
    S: RecordSink + Sync + 'static,
{
    Json(json!({
        "status": "ok",
        "pending": store.pending_len(),
    }))
}
