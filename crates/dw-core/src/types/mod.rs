pub mod ids;
pub mod projection;
pub mod report;
pub mod tenant;

pub use ids::{IdError, TenantId};
pub use projection::{
    ChainMarker, ChangeLink, DeliveryOutcome, DeliveryStats, DeploymentRecord, DeploymentStatus,
    IncidentLink, RebuildStats, ServiceCurrentState, ServiceEnvState, ServiceStatus,
};
pub use report::{ChangeFailureRate, LeadTimeReport, LeadTimeSample, LeadTimeSummary};
pub use tenant::{NewTenant, Tenant};
