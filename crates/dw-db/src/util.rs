use chrono::{DateTime, SecondsFormat, Utc};
use dw_core::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub fn to_rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn from_rfc3339(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt {
            message: format!("invalid timestamp: {value}"),
        })
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Corrupt {
        message: format!("json encode failed: {err}"),
    })
}

pub fn decode_json<T: DeserializeOwned>(value: &str) -> Result<T, StoreError> {
    serde_json::from_str(value).map_err(|err| StoreError::Corrupt {
        message: format!("json decode failed: {err}"),
    })
}

pub fn tenant_id(value: i64) -> Result<dw_core::types::TenantId, StoreError> {
    dw_core::types::TenantId::new(value).map_err(|err| StoreError::Corrupt {
        message: err.to_string(),
    })
}

