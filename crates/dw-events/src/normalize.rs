use crate::cdevent::{EventKind, TypeName};
use crate::envelope::{Envelope, RequestHeaders};
use crate::schema::validate_strict;
use crate::types::NormalizedEvent;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("invalid payload: {message}")]
    InvalidPayload { message: String },
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },
    #[error("unsupported event type: {event_type}")]
    UnsupportedType { event_type: String },
}

impl NormalizeError {
    pub fn payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }
}

/// Parses either envelope, applies the type allow-list, then strict schema
/// checks for lifecycle types. The body must already be authenticated.
pub fn normalize(headers: &RequestHeaders, body: &[u8]) -> Result<NormalizedEvent, NormalizeError> {
    let (event, raw) = Envelope::parse(headers, body)?.into_event();

    let event_type = event.context.event_type.trim().to_string();
    let Some(kind) = EventKind::classify(&event_type) else {
        return Err(NormalizeError::UnsupportedType { event_type });
    };
    // The id is the idempotency key for every family.
    if event.context.id.trim().is_empty() {
        return Err(NormalizeError::payload("context.id is required"));
    }
    if kind.is_strict() {
        validate_strict(kind, &event)?;
    }

    let subject_type = event
        .subject
        .subject_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| TypeName::parse(&event_type).map(|name| name.subject))
        .unwrap_or("unknown")
        .to_string();

    Ok(NormalizedEvent {
        event_id: event.context.id,
        event_type,
        source: event.context.source,
        timestamp: event.context.timestamp,
        subject_id: event.subject.id,
        subject_type,
        subject_source: non_blank(event.subject.source),
        chain_id: non_blank(event.context.chain_id),
        raw_payload: raw,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn body(value: &Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    fn service_event(event_type: &str) -> Value {
        json!({
            "context": {
                "id": "evt-10",
                "source": "ci/orders",
                "type": event_type,
                "timestamp": "2026-03-01T12:00:00+02:00",
                "specversion": "0.5.0",
                "chainId": "  chain-7 "
            },
            "subject": {
                "id": "apps/orders",
                "source": " ",
                "content": { "environment": { "id": "staging" }, "artifactId": "pkg:generic/orders@v1" }
            }
        })
    }

    #[test]
    fn test_normalize_derives_fields() {
        let event = normalize(
            &RequestHeaders::new(),
            &body(&service_event("dev.cdevents.service.deployed.0.3.0")),
        )
        .unwrap();
        assert_eq!(event.event_id, "evt-10");
        assert_eq!(event.subject_type, "service");
        assert_eq!(event.chain_id.as_deref(), Some("chain-7"));
        assert_eq!(event.subject_source, None);
        assert_eq!(event.timestamp.to_rfc3339(), "2026-03-01T10:00:00+00:00");

        let record = event.into_record(3);
        assert_eq!(record.tenant_id, 3);
        assert_eq!(record.event_ts_ms, 1_772_359_200_000);
        assert_eq!(record.content_str(&["environment", "id"]), Some("staging"));
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let err = normalize(
            &RequestHeaders::new(),
            &body(&service_event("dev.cdevents.unknown.thing.0.1.0")),
        )
        .unwrap_err();
        assert_eq!(
            err,
            NormalizeError::UnsupportedType {
                event_type: "dev.cdevents.unknown.thing.0.1.0".to_string()
            }
        );
    }

    #[test]
    fn test_allow_list_runs_before_schema() {
        let mut value = service_event("dev.cdevents.unknown.thing.0.1.0");
        value["context"]["specversion"] = Value::Null;
        let err = normalize(&RequestHeaders::new(), &body(&value)).unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedType { .. }));
    }

    #[test]
    fn test_prefix_family_is_lenient() {
        let value = json!({
            "context": {
                "id": "evt-11",
                "source": "scm",
                "type": "dev.cdevents.change.merged.0.3.0",
                "timestamp": "2026-03-01T09:00:00Z",
                "chainId": "chain-7"
            },
            "subject": { "id": "change-1", "content": {} }
        });
        let event = normalize(&RequestHeaders::new(), &body(&value)).unwrap();
        assert_eq!(event.subject_type, "change");
    }

    #[test]
    fn test_blank_event_id_is_invalid_payload() {
        let mut lenient = json!({
            "context": {
                "id": "   ",
                "source": "scm",
                "type": "dev.cdevents.change.merged.0.3.0",
                "timestamp": "2026-03-01T09:00:00Z"
            },
            "subject": { "id": "change-1", "content": {} }
        });
        let err = normalize(&RequestHeaders::new(), &body(&lenient)).unwrap_err();
        assert_eq!(err, NormalizeError::payload("context.id is required"));

        lenient["context"]["id"] = json!("");
        let err = normalize(&RequestHeaders::new(), &body(&lenient)).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidPayload { .. }));

        let mut strict = service_event("dev.cdevents.service.deployed.0.3.0");
        strict["context"]["id"] = json!(" ");
        let err = normalize(&RequestHeaders::new(), &body(&strict)).unwrap_err();
        assert_eq!(err, NormalizeError::payload("context.id is required"));
    }

    #[test]
    fn test_bad_timestamp_is_invalid_payload() {
        let mut value = service_event("dev.cdevents.service.deployed.0.3.0");
        value["context"]["timestamp"] = json!("yesterday");
        let err = normalize(&RequestHeaders::new(), &body(&value)).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidPayload { .. }));
    }

    #[test]
    fn test_lifecycle_schema_failure() {
        let mut value = service_event("dev.cdevents.service.upgraded.0.3.0");
        value["subject"]["content"]["artifactId"] = json!("");
        let err = normalize(&RequestHeaders::new(), &body(&value)).unwrap_err();
        assert!(matches!(err, NormalizeError::InvalidSchema { .. }));
    }
}
