use crate::cdevent::CdEvent;
use crate::normalize::NormalizeError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Request headers with case-insensitive lookup, detached from any HTTP crate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    inner: BTreeMap<String, String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.inner.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RequestHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name.as_ref(), value);
        }
        headers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudEventMode {
    Structured,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudEventAttributes {
    pub specversion: String,
    pub id: String,
    pub source: String,
    pub event_type: String,
}

/// The two accepted wire shapes, resolved by trial parse.
#[derive(Debug, Clone)]
pub enum Envelope {
    Native {
        event: CdEvent,
        raw: Value,
    },
    CloudEvent {
        mode: CloudEventMode,
        attributes: CloudEventAttributes,
        event: CdEvent,
        raw: Value,
    },
}

#[derive(Deserialize)]
struct StructuredCloudEvent {
    specversion: String,
    id: String,
    source: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    data_base64: Option<String>,
}

impl Envelope {
    pub fn parse(headers: &RequestHeaders, body: &[u8]) -> Result<Self, NormalizeError> {
        let document: Option<Value> = serde_json::from_slice(body).ok();

        if let Some((event, raw)) = document.as_ref().and_then(parse_native) {
            return Ok(Self::Native { event, raw });
        }

        if let Some(structured) = document.and_then(structured_envelope) {
            let attributes = CloudEventAttributes {
                specversion: structured.specversion,
                id: structured.id,
                source: structured.source,
                event_type: structured.event_type,
            };
            let data = structured_data(structured.data, structured.data_base64)?;
            let (event, raw) = parse_data(&data)?;
            return Ok(Self::CloudEvent {
                mode: CloudEventMode::Structured,
                attributes,
                event,
                raw,
            });
        }

        if let Some(attributes) = binary_attributes(headers) {
            let (event, raw) = parse_data(body)?;
            return Ok(Self::CloudEvent {
                mode: CloudEventMode::Binary,
                attributes,
                event,
                raw,
            });
        }

        Err(NormalizeError::payload(
            "body is neither a CDEvent nor a CloudEvent",
        ))
    }

    pub fn into_event(self) -> (CdEvent, Value) {
        match self {
            Self::Native { event, raw } | Self::CloudEvent { event, raw, .. } => (event, raw),
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::Native { .. } => "native",
            Self::CloudEvent {
                mode: CloudEventMode::Structured,
                ..
            } => "cloudevent-structured",
            Self::CloudEvent {
                mode: CloudEventMode::Binary,
                ..
            } => "cloudevent-binary",
        }
    }
}

fn parse_native(value: &Value) -> Option<(CdEvent, Value)> {
    let object = value.as_object()?;
    if !object.get("context").is_some_and(Value::is_object)
        || !object.get("subject").is_some_and(Value::is_object)
    {
        return None;
    }
    let event = serde_json::from_value::<CdEvent>(value.clone()).ok()?;
    Some((event, value.clone()))
}

fn structured_envelope(value: Value) -> Option<StructuredCloudEvent> {
    if !value.get("specversion").is_some_and(Value::is_string) {
        return None;
    }
    serde_json::from_value(value).ok()
}

fn structured_data(
    data: Option<Value>,
    data_base64: Option<String>,
) -> Result<Vec<u8>, NormalizeError> {
    match (data, data_base64) {
        (Some(Value::String(text)), _) => Ok(text.into_bytes()),
        (Some(Value::Null) | None, Some(encoded)) => STANDARD
            .decode(encoded.trim())
            .map_err(|err| NormalizeError::payload(format!("data_base64: {err}"))),
        (Some(Value::Null) | None, None) => Ok(Vec::new()),
        (Some(value), _) => serde_json::to_vec(&value)
            .map_err(|err| NormalizeError::payload(err.to_string())),
    }
}

fn binary_attributes(headers: &RequestHeaders) -> Option<CloudEventAttributes> {
    let attribute = |name: &str| {
        headers
            .get(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    Some(CloudEventAttributes {
        specversion: attribute("ce-specversion")?,
        id: attribute("ce-id")?,
        source: attribute("ce-source")?,
        event_type: attribute("ce-type")?,
    })
}

fn parse_data(data: &[u8]) -> Result<(CdEvent, Value), NormalizeError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(NormalizeError::payload("cloudevent data is empty"));
    }
    let value: Value = serde_json::from_slice(data)
        .map_err(|err| NormalizeError::payload(format!("cloudevent data is not json: {err}")))?;
    parse_native(&value)
        .ok_or_else(|| NormalizeError::payload("cloudevent data is not a CDEvent"))
}
