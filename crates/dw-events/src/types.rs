use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// A delivery event that passed envelope parsing, the type allow-list and
/// (for lifecycle types) strict schema validation. Not yet bound to a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub event_id: String,
    pub event_type: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub subject_id: String,
    pub subject_type: String,
    pub subject_source: Option<String>,
    pub chain_id: Option<String>,
    pub raw_payload: Value,
}

impl NormalizedEvent {
    pub fn into_record(self, tenant_id: i64) -> EventRecord {
        EventRecord {
            tenant_id,
            event_id: self.event_id,
            event_type: self.event_type,
            source: self.source,
            event_ts_ms: self.timestamp.timestamp_millis(),
            timestamp: self.timestamp,
            subject_id: self.subject_id,
            subject_type: self.subject_type,
            subject_source: self.subject_source,
            chain_id: self.chain_id,
            raw_payload: self.raw_payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventRecord {
    pub tenant_id: i64,
    pub event_id: String,
    pub event_type: String,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub event_ts_ms: i64,
    pub subject_id: String,
    pub subject_type: String,
    pub subject_source: Option<String>,
    pub chain_id: Option<String>,
    pub raw_payload: Value,
}

impl EventRecord {
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Returns the value at `path` inside `subject.content`, trimmed, when it
    /// is a non-empty string.
    pub fn content_str(&self, path: &[&str]) -> Option<&str> {
        let mut cursor = self.raw_payload.get("subject")?.get("content")?;
        for key in path {
            cursor = cursor.get(*key)?;
        }
        cursor
            .as_str()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// An event row as persisted in the append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredEvent {
    pub seq: i64,
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: EventRecord,
}
