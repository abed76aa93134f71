//! Body decoding for `/submit`
//!
//! The body is a stream of JSON values. Each value is decoded on its own so
//! one malformed event does not discard its neighbours; a syntax error ends
//! the stream because the decoder cannot resynchronise after it.

use chrono::{DateTime, Utc};
use contracts::EventRecord;
use serde_json::Value;
use tracing::{error, info};

use crate::event::RawEvent;

/// Result of decoding one request body
#[derive(Debug, Default)]
pub struct DecodedBatch {
    /// Valid, enriched records in body order
    pub records: Vec<EventRecord>,
    /// Values that were not a valid event shape
    pub malformed: usize,
    /// Events missing required fields
    pub incomplete: usize,
    /// Decoding stopped early on a JSON syntax error
    pub truncated: bool,
}

/// Decode, validate and enrich every event in `body`
pub fn decode_events(body: &[u8], ip: &str, server_time: DateTime<Utc>) -> DecodedBatch {
    let mut batch = DecodedBatch::default();

    for value in serde_json::Deserializer::from_slice(body).into_iter::<Value>() {
        let value = match value {
            Ok(value) => value,
            Err(e) => {
                error!(error = %e, "Can't decode part of the data");
                batch.malformed += 1;
                batch.truncated = true;
                break;
            }
        };

        let raw = match serde_json::from_value::<RawEvent>(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "Can't decode part of the data");
                batch.malformed += 1;
                continue;
            }
        };

        match raw.into_record(ip, server_time) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                info!(error = %e, "Required check failed");
                batch.incomplete += 1;
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(session: &str, sequence: i64) -> String {
        format!(
            r#"{{"client_time":"2020-12-01 23:59:00","device_id":"D1","device_os":"iOS 13.5.1","session":"{session}","sequence":{sequence},"event":"app_start","param_int":0,"param_str":"some text"}}"#
        )
    }

    #[test]
    fn test_concatenated_stream_keeps_order() {
        let body = format!("{}\n{} {}", event("a", 1), event("a", 2), event("b", 3));
        let batch = decode_events(body.as_bytes(), "10.0.0.7", Utc::now());

        let sequences: Vec<i64> = batch.records.iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(batch.records.iter().all(|r| r.ip == "10.0.0.7"));
        assert_eq!(batch.malformed + batch.incomplete, 0);
    }

    #[test]
    fn test_single_receipt_time_per_body() {
        let now = Utc::now();
        let body = format!("{}{}", event("a", 1), event("a", 2));
        let batch = decode_events(body.as_bytes(), "ip", now);
        assert!(batch.records.iter().all(|r| r.server_time == now));
    }

    #[test]
    fn test_incomplete_event_skipped() {
        let body = format!(r#"{} {{"event":"app_start"}} {}"#, event("a", 1), event("a", 2));
        let batch = decode_events(body.as_bytes(), "ip", Utc::now());

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.incomplete, 1);
        assert!(!batch.truncated);
    }

    #[test]
    fn test_wrong_type_skipped() {
        let body = format!(r#"{} {{"sequence":"one"}} [1,2] {}"#, event("a", 1), event("a", 2));
        let batch = decode_events(body.as_bytes(), "ip", Utc::now());

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.malformed, 2);
    }

    #[test]
    fn test_syntax_error_stops_decoding() {
        let body = format!(r#"{} {{"event": }} {}"#, event("a", 1), event("a", 2));
        let batch = decode_events(body.as_bytes(), "ip", Utc::now());

        assert_eq!(batch.records.len(), 1);
        assert!(batch.truncated);
    }

    #[test]
    fn test_empty_body() {
        let batch = decode_events(b"", "ip", Utc::now());
        assert!(batch.records.is_empty());
        assert!(!batch.truncated);

        let batch = decode_events(b"  \n ", "ip", Utc::now());
        assert!(batch.records.is_empty());
    }
}
