use crate::cdevent::{CdEvent, EnvironmentLifecycle, EventKind, ServiceLifecycle};
use crate::normalize::NormalizeError;
use serde_json::Value;

/// Structural checks applied to lifecycle event types only.
pub fn validate_strict(kind: EventKind, event: &CdEvent) -> Result<(), NormalizeError> {
    require_text("context.id", Some(&event.context.id))?;
    require_text("context.source", Some(&event.context.source))?;
    require_text("context.specversion", event.context.specversion.as_deref())?;
    require_text("subject.id", Some(&event.subject.id))?;

    if let Some(subject_type) = event.subject.subject_type.as_deref() {
        let expected = kind.subject_name();
        if !expected.is_empty() && subject_type.trim() != expected {
            return Err(NormalizeError::schema(format!(
                "subject.type must be {expected}, got {subject_type}"
            )));
        }
    }

    match kind {
        EventKind::Service(lifecycle) => validate_service(lifecycle, &event.subject.content),
        EventKind::Environment(lifecycle) => {
            validate_environment(lifecycle, &event.subject.content)
        }
        EventKind::Family(_) => Ok(()),
    }
}

fn validate_service(lifecycle: ServiceLifecycle, content: &Value) -> Result<(), NormalizeError> {
    if !content.is_object() {
        return Err(NormalizeError::schema("subject.content must be an object"));
    }
    let environment = content.get("environment");
    if !environment.is_some_and(Value::is_object) {
        return Err(NormalizeError::schema(
            "subject.content.environment must be an object",
        ));
    }
    require_text(
        "subject.content.environment.id",
        environment.and_then(|env| env.get("id")).and_then(Value::as_str),
    )?;
    if lifecycle.requires_artifact() {
        require_text(
            "subject.content.artifactId",
            content.get("artifactId").and_then(Value::as_str),
        )?;
    }
    Ok(())
}

fn validate_environment(
    _lifecycle: EnvironmentLifecycle,
    content: &Value,
) -> Result<(), NormalizeError> {
    match content {
        Value::Null => Ok(()),
        Value::Object(map) => {
            for key in ["name", "url"] {
                if let Some(value) = map.get(key) {
                    if !value.is_string() {
                        return Err(NormalizeError::schema(format!(
                            "subject.content.{key} must be a string"
                        )));
                    }
                }
            }
            Ok(())
        }
        _ => Err(NormalizeError::schema("subject.content must be an object")),
    }
}

fn require_text(field: &str, value: Option<&str>) -> Result<(), NormalizeError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(()),
        _ => Err(NormalizeError::schema(format!("{field} is required"))),
    }
}
