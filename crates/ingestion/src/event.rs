//! RawEvent - wire shape of a submitted analytics event
//!
//! Every field is optional on the wire; the required set is declared with
//! `validator` attributes and checked before a record is built.

use chrono::{DateTime, NaiveDateTime, Utc};
use contracts::{client_time, ContractError, EventRecord};
use serde::Deserialize;
use validator::Validate;

/// Required client fields, in declaration order
pub const REQUIRED_FIELDS: [&str; 8] = [
    "client_time",
    "device_id",
    "device_os",
    "session",
    "sequence",
    "event",
    "param_int",
    "param_str",
];

/// One JSON object from a `/submit` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Validate)]
pub struct RawEvent {
    #[serde(default, with = "client_time::option")]
    #[validate(required)]
    pub client_time: Option<NaiveDateTime>,

    #[validate(required)]
    pub device_id: Option<String>,

    #[validate(required)]
    pub device_os: Option<String>,

    #[validate(required)]
    pub session: Option<String>,

    #[validate(required)]
    pub sequence: Option<i64>,

    #[validate(required)]
    pub event: Option<String>,

    #[validate(required)]
    pub param_int: Option<i64>,

    #[validate(required)]
    pub param_str: Option<String>,
}

impl RawEvent {
    /// Check that every required field is present
    ///
    /// # Errors
    /// `ContractError::MissingFields` naming all absent fields
    pub fn check_required_fields(&self) -> Result<(), ContractError> {
        let Err(errors) = self.validate() else {
            return Ok(());
        };

        let reported = errors.field_errors();
        let fields = REQUIRED_FIELDS
            .iter()
            .filter(|field| reported.contains_key(**field))
            .map(|field| field.to_string())
            .collect();

        Err(ContractError::MissingFields { fields })
    }

    /// Enrich with the client address and receipt time
    ///
    /// # Errors
    /// `ContractError::MissingFields` if a required field is absent
    pub fn into_record(
        self,
        ip: impl Into<String>,
        server_time: DateTime<Utc>,
    ) -> Result<EventRecord, ContractError> {
        self.check_required_fields()?;

        let RawEvent {
            client_time: Some(client_time),
            device_id: Some(device_id),
            device_os: Some(device_os),
            session: Some(session),
            sequence: Some(sequence),
            event: Some(event),
            param_int: Some(param_int),
            param_str: Some(param_str),
        } = self
        else {
            return Err(ContractError::Other("required field check out of sync".into()));
        };

        Ok(EventRecord {
            client_time,
            device_id,
            device_os,
            session,
            sequence,
            event,
            param_int,
            param_str,
            ip: ip.into(),
            server_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn complete() -> RawEvent {
        serde_json::from_str(
            r#"{
                "client_time": "2020-12-01 23:59:00",
                "device_id": "0287D9AA-4ADF-4B37-A60F-3E9E645C821E",
                "device_os": "iOS 13.5.1",
                "session": "ybuRi8mAUypxjbxQ",
                "sequence": 1,
                "event": "app_start",
                "param_int": 0,
                "param_str": "some text"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_complete_event_passes() {
        assert!(complete().check_required_fields().is_ok());
    }

    #[test]
    fn test_missing_fields_in_declaration_order() {
        let mut raw = complete();
        raw.param_str = None;
        raw.device_os = None;
        raw.client_time = None;

        match raw.check_required_fields() {
            Err(ContractError::MissingFields { fields }) => {
                assert_eq!(fields, vec!["client_time", "device_os", "param_str"]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_values_count_as_present() {
        let mut raw = complete();
        raw.param_int = Some(0);
        raw.param_str = Some(String::new());
        assert!(raw.check_required_fields().is_ok());
    }

    #[test]
    fn test_into_record_enriches() {
        let now = Utc.with_ymd_and_hms(2020, 12, 2, 0, 0, 5).unwrap();
        let record = complete().into_record("10.0.0.7", now).unwrap();

        assert_eq!(record.ip, "10.0.0.7");
        assert_eq!(record.server_time, now);
        assert_eq!(record.session, "ybuRi8mAUypxjbxQ");
        assert_eq!(record.client_time.to_string(), "2020-12-01 23:59:00");
    }

    #[test]
    fn test_into_record_rejects_missing() {
        let raw = RawEvent {
            event: Some("app_start".into()),
            ..Default::default()
        };
        assert!(matches!(
            raw.into_record("10.0.0.7", Utc::now()),
            Err(ContractError::MissingFields { .. })
        ));
    }

    #[test]
    fn test_explicit_null_is_missing() {
        let raw: RawEvent = serde_json::from_str(r#"{"client_time": null, "sequence": null}"#).unwrap();
        match raw.check_required_fields() {
            Err(ContractError::MissingFields { fields }) => assert_eq!(fields.len(), 8),
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_client_time_is_a_decode_error() {
        let result = serde_json::from_str::<RawEvent>(r#"{"client_time": "2020-12-01T23:59:00Z"}"#);
        assert!(result.is_err());
    }
}
