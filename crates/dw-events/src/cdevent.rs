use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

pub const TYPE_PREFIX: &str = "dev.cdevents.";
pub const LIFECYCLE_VERSION: &str = "0.3.0";

/// Native CDEvents envelope. Only the fields the ingestion path reads are
/// modelled; the full document is kept separately as the raw payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CdEvent {
    pub context: Context,
    pub subject: Subject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub id: String,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub specversion: Option<String>,
    #[serde(default)]
    pub chain_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub subject_type: Option<String>,
    #[serde(default)]
    pub content: Value,
}

/// `dev.cdevents.<subject>.<predicate>.<version>` split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeName<'a> {
    pub subject: &'a str,
    pub predicate: &'a str,
    pub version: &'a str,
}

impl<'a> TypeName<'a> {
    pub fn parse(event_type: &'a str) -> Option<Self> {
        let rest = event_type.trim().strip_prefix(TYPE_PREFIX)?;
        let (subject, rest) = rest.split_once('.')?;
        let (predicate, version) = rest.split_once('.')?;
        if subject.is_empty() || predicate.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self {
            subject,
            predicate,
            version,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceLifecycle {
    Deployed,
    Upgraded,
    RolledBack,
    Removed,
    Published,
}

impl ServiceLifecycle {
    pub fn from_predicate(predicate: &str) -> Option<Self> {
        match predicate {
            "deployed" => Some(Self::Deployed),
            "upgraded" => Some(Self::Upgraded),
            "rolledback" => Some(Self::RolledBack),
            "removed" => Some(Self::Removed),
            "published" => Some(Self::Published),
            _ => None,
        }
    }

    /// Matches `dev.cdevents.service.<predicate>.*` regardless of version.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        let name = TypeName::parse(event_type)?;
        if name.subject != "service" {
            return None;
        }
        Self::from_predicate(name.predicate)
    }

    pub fn requires_artifact(self) -> bool {
        matches!(self, Self::Deployed | Self::Upgraded | Self::RolledBack)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentLifecycle {
    Created,
    Modified,
    Deleted,
}

impl EnvironmentLifecycle {
    pub fn from_predicate(predicate: &str) -> Option<Self> {
        match predicate {
            "created" => Some(Self::Created),
            "modified" => Some(Self::Modified),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    Pipeline,
    Change,
    Artifact,
    Incident,
}

impl EventFamily {
    pub const ALL: [EventFamily; 4] = [
        EventFamily::Pipeline,
        EventFamily::Change,
        EventFamily::Artifact,
        EventFamily::Incident,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Pipeline => "dev.cdevents.pipeline.",
            Self::Change => "dev.cdevents.change.",
            Self::Artifact => "dev.cdevents.artifact.",
            Self::Incident => "dev.cdevents.incident.",
        }
    }

    pub fn of(event_type: &str) -> Option<Self> {
        let event_type = event_type.trim();
        Self::ALL
            .into_iter()
            .find(|family| event_type.starts_with(family.prefix()))
    }
}

/// Where an accepted event type sits in the allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Service(ServiceLifecycle),
    Environment(EnvironmentLifecycle),
    Family(EventFamily),
}

impl EventKind {
    /// Returns `None` for types outside the allow-list.
    pub fn classify(event_type: &str) -> Option<Self> {
        let event_type = event_type.trim();
        if event_type.is_empty() {
            return None;
        }
        if let Some(kind) = Self::lifecycle(event_type) {
            return Some(kind);
        }
        EventFamily::of(event_type).map(Self::Family)
    }

    fn lifecycle(event_type: &str) -> Option<Self> {
        let name = TypeName::parse(event_type)?;
        if name.version != LIFECYCLE_VERSION {
            return None;
        }
        match name.subject {
            "service" => ServiceLifecycle::from_predicate(name.predicate).map(Self::Service),
            "environment" => {
                EnvironmentLifecycle::from_predicate(name.predicate).map(Self::Environment)
            }
            _ => None,
        }
    }

    /// Lifecycle types get strict structural validation; prefix families are
    /// accepted on type match alone.
    pub fn is_strict(self) -> bool {
        !matches!(self, Self::Family(_))
    }

    pub fn subject_name(self) -> &'static str {
        match self {
            Self::Service(_) => "service",
            Self::Environment(_) => "environment",
            Self::Family(_) => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_parse() {
        let name = TypeName::parse("dev.cdevents.service.deployed.0.3.0").unwrap();
        assert_eq!(name.subject, "service");
        assert_eq!(name.predicate, "deployed");
        assert_eq!(name.version, "0.3.0");

        let name = TypeName::parse("dev.cdevents.pipeline.run.started.0.3.0").unwrap();
        assert_eq!(name.subject, "pipeline");

        assert!(TypeName::parse("dev.cdevents.service").is_none());
        assert!(TypeName::parse("io.example.service.deployed.0.3.0").is_none());
    }

    #[test]
    fn test_classify_lifecycle_types() {
        assert_eq!(
            EventKind::classify("dev.cdevents.service.rolledback.0.3.0"),
            Some(EventKind::Service(ServiceLifecycle::RolledBack))
        );
        assert_eq!(
            EventKind::classify(" dev.cdevents.environment.created.0.3.0 "),
            Some(EventKind::Environment(EnvironmentLifecycle::Created))
        );
    }

    #[test]
    fn test_classify_rejects_unlisted_versions_and_subjects() {
        assert_eq!(EventKind::classify("dev.cdevents.service.deployed.0.1.0"), None);
        assert_eq!(EventKind::classify("dev.cdevents.unknown.thing.0.1.0"), None);
        assert_eq!(EventKind::classify("dev.cdevents.testcaserun.started.0.2.0"), None);
        assert_eq!(EventKind::classify(""), None);
    }

    #[test]
    fn test_classify_prefix_families() {
        assert_eq!(
            EventKind::classify("dev.cdevents.change.merged.0.3.0"),
            Some(EventKind::Family(EventFamily::Change))
        );
        assert_eq!(
            EventKind::classify("dev.cdevents.incident.detected.0.2.0"),
            Some(EventKind::Family(EventFamily::Incident))
        );
        assert!(!EventKind::Family(EventFamily::Pipeline).is_strict());
        assert!(EventKind::Service(ServiceLifecycle::Removed).is_strict());
    }

    #[test]
    fn test_service_lifecycle_ignores_version() {
        assert_eq!(
            ServiceLifecycle::from_event_type("dev.cdevents.service.upgraded.0.2.0"),
            Some(ServiceLifecycle::Upgraded)
        );
        assert_eq!(
            ServiceLifecycle::from_event_type("dev.cdevents.environment.deleted.0.3.0"),
            None
        );
    }
}
