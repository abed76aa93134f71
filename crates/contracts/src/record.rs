//! EventRecord - the unit of data flowing from ingestion to sinks
//!
//! A record is built once by the HTTP boundary (decoded, validated, enriched)
//! and then only moved or cloned; nothing downstream mutates it.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire format of `client_time` (`YYYY-MM-DD HH:MM:SS`, no zone)
pub const CLIENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Validated and enriched analytics event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Time reported by the client device
    #[serde(with = "client_time")]
    pub client_time: NaiveDateTime,

    /// Device identifier
    pub device_id: String,

    /// Device operating system
    pub device_os: String,

    /// Session identifier
    pub session: String,

    /// Client-side sequence number within the session
    pub sequence: i64,

    /// Event name
    pub event: String,

    /// Generic integer parameter
    pub param_int: i64,

    /// Generic string parameter
    pub param_str: String,

    /// Source address of the submitting client
    pub ip: String,

    /// Time the server received the request
    pub server_time: DateTime<Utc>,
}

/// Serde adapter for [`CLIENT_TIME_FORMAT`] timestamps.
///
/// Surrounding quotes are part of the JSON string, so `"2023-01-02 10:00:00"`
/// decodes as expected while RFC 3339 input is rejected.
pub mod client_time {
    use super::CLIENT_TIME_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(CLIENT_TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    /// Parse a client timestamp string
    pub fn parse(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
        NaiveDateTime::parse_from_str(raw.trim(), CLIENT_TIME_FORMAT)
    }

    /// Optional variant used by partially-populated wire payloads
    pub mod option {
        use super::parse;
        use chrono::NaiveDateTime;
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<NaiveDateTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(v) => super::serialize(v, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| parse(&raw).map_err(de::Error::custom))
                .transpose()
        }
    }
}
