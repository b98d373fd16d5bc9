use crate::types::ids::TenantId;
use dw_events::cdevent::ServiceLifecycle;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStatus {
    Synced,
    Warning,
    OutOfSync,
    Unknown,
}

impl ServiceStatus {
    pub fn from_lifecycle(lifecycle: Option<ServiceLifecycle>) -> Self {
        match lifecycle {
            Some(
                ServiceLifecycle::Deployed
                | ServiceLifecycle::Upgraded
                | ServiceLifecycle::Published,
            ) => Self::Synced,
            Some(ServiceLifecycle::RolledBack) => Self::Warning,
            Some(ServiceLifecycle::Removed) => Self::OutOfSync,
            None => Self::Unknown,
        }
    }

    pub fn is_failing(self) -> bool {
        matches!(self, Self::Warning | Self::OutOfSync)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Warning => "warning",
            Self::OutOfSync => "out-of-sync",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "synced" => Some(Self::Synced),
            "warning" => Some(Self::Warning),
            "out-of-sync" => Some(Self::OutOfSync),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Which 30-day counter an event bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success,
    Failure,
    Rollback,
}

impl DeliveryOutcome {
    pub fn from_lifecycle(lifecycle: ServiceLifecycle) -> Self {
        match lifecycle {
            ServiceLifecycle::Deployed
            | ServiceLifecycle::Upgraded
            | ServiceLifecycle::Published => Self::Success,
            ServiceLifecycle::Removed => Self::Failure,
            ServiceLifecycle::RolledBack => Self::Rollback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Success,
    RolledBack,
}

impl DeploymentStatus {
    /// `None` for lifecycle events that are not deployments.
    pub fn from_lifecycle(lifecycle: ServiceLifecycle) -> Option<Self> {
        match lifecycle {
            ServiceLifecycle::Deployed
            | ServiceLifecycle::Upgraded
            | ServiceLifecycle::Published => Some(Self::Success),
            ServiceLifecycle::RolledBack => Some(Self::RolledBack),
            ServiceLifecycle::Removed => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "rolled_back" => Some(Self::RolledBack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceEnvState {
    pub tenant_id: TenantId,
    pub service_name: String,
    pub environment: String,
    pub latest_event_seq: i64,
    pub latest_event_type: String,
    pub latest_event_ts_ms: i64,
    pub latest_status: ServiceStatus,
    pub latest_artifact_id: String,
    pub failure_streak: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceCurrentState {
    pub tenant_id: TenantId,
    pub service_name: String,
    pub latest_event_seq: i64,
    pub latest_event_type: String,
    pub latest_event_ts_ms: i64,
    pub latest_status: ServiceStatus,
    pub latest_artifact_id: String,
    pub latest_environment: String,
    pub drift_count: i64,
    pub failing_environments: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeploymentRecord {
    pub tenant_id: TenantId,
    pub service_name: String,
    pub environment: String,
    pub event_seq: i64,
    pub event_id: String,
    pub event_type: String,
    pub artifact_id: String,
    pub status: DeploymentStatus,
    pub event_ts_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct DeliveryStats {
    pub days: u32,
    pub success_count: i64,
    pub failure_count: i64,
    pub rollback_count: i64,
}

impl DeliveryStats {
    pub fn total(&self) -> i64 {
        self.success_count + self.failure_count + self.rollback_count
    }

    /// Share of failed or rolled back deliveries, in percent.
    #[allow(clippy::cast_precision_loss)]
    pub fn change_failure_rate(&self) -> f64 {
        let total = self.total();
        if total <= 0 {
            return 0.0;
        }
        (self.failure_count + self.rollback_count) as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChangeLink {
    pub tenant_id: TenantId,
    pub service_name: String,
    pub event_seq: i64,
    pub event_ts_ms: i64,
    pub chain_id: String,
    pub environment: String,
    pub artifact_id: String,
    pub pipeline_run_id: String,
    pub run_url: String,
    pub actor_name: String,
    pub status: ServiceStatus,
}

/// First change timestamp and incident count observed for one chain id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChainMarker {
    pub tenant_id: TenantId,
    pub chain_id: String,
    pub first_change_ts_ms: Option<i64>,
    pub incident_count: i64,
}

/// A service change link whose chain has seen at least one incident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IncidentLink {
    pub tenant_id: TenantId,
    pub service_name: String,
    pub event_seq: i64,
    pub event_ts_ms: i64,
    pub chain_id: String,
    pub environment: String,
    pub artifact_id: String,
    pub status: ServiceStatus,
    pub incident_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct RebuildStats {
    pub events_replayed: i64,
    pub current_state_rows: i64,
    pub env_state_rows: i64,
    pub daily_stats_rows: i64,
    pub deployment_rows: i64,
    pub change_link_rows: i64,
    pub chain_marker_rows: i64,
}
