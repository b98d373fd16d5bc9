use crate::error::StoreError;
use crate::types::{
    ChainMarker, ChangeLink, DeliveryOutcome, DeliveryStats, DeploymentRecord, IncidentLink,
    LeadTimeSample,
    RebuildStats, ServiceCurrentState, ServiceEnvState, ServiceStatus, TenantId,
};
use chrono::NaiveDate;

pub trait ProjectionRepository {
    fn env_state(
        &self,
        tenant_id: TenantId,
        service: &str,
        environment: &str,
    ) -> Result<Option<ServiceEnvState>, StoreError>;
    fn env_states(
        &self,
        tenant_id: TenantId,
        service: &str,
    ) -> Result<Vec<ServiceEnvState>, StoreError>;
    fn upsert_env_state(&self, state: &ServiceEnvState) -> Result<(), StoreError>;

    /// Logs the status one event implies for a service environment.
    fn record_env_status(
        &self,
        tenant_id: TenantId,
        service: &str,
        environment: &str,
        event_seq: i64,
        event_ts_ms: i64,
        status: ServiceStatus,
    ) -> Result<(), StoreError>;
    /// Failing statuses ordered by `(ts, seq)` after the latest synced one.
    /// Unknown statuses neither count nor reset.
    fn failure_streak(
        &self,
        tenant_id: TenantId,
        service: &str,
        environment: &str,
    ) -> Result<i64, StoreError>;

    fn current_state(
        &self,
        tenant_id: TenantId,
        service: &str,
    ) -> Result<Option<ServiceCurrentState>, StoreError>;
    fn upsert_current_state(&self, state: &ServiceCurrentState) -> Result<(), StoreError>;

    fn increment_daily_stats(
        &self,
        tenant_id: TenantId,
        service: &str,
        day: NaiveDate,
        outcome: DeliveryOutcome,
    ) -> Result<(), StoreError>;
    /// Sums day buckets on or after `since`.
    fn delivery_stats_since(
        &self,
        tenant_id: TenantId,
        service: &str,
        since: NaiveDate,
    ) -> Result<DeliveryStats, StoreError>;

    fn insert_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError>;
    fn deployment_history(
        &self,
        tenant_id: TenantId,
        service: &str,
        limit: u32,
    ) -> Result<Vec<DeploymentRecord>, StoreError>;

    fn upsert_change_link(&self, link: &ChangeLink) -> Result<(), StoreError>;
    fn change_links(
        &self,
        tenant_id: TenantId,
        service: &str,
        limit: u32,
    ) -> Result<Vec<ChangeLink>, StoreError>;

    /// Keeps the earliest change timestamp seen for the chain.
    fn record_chain_change(
        &self,
        tenant_id: TenantId,
        chain_id: &str,
        ts_ms: i64,
    ) -> Result<(), StoreError>;
    fn record_chain_incident(
        &self,
        tenant_id: TenantId,
        chain_id: &str,
    ) -> Result<(), StoreError>;
    fn chain_marker(
        &self,
        tenant_id: TenantId,
        chain_id: &str,
    ) -> Result<Option<ChainMarker>, StoreError>;
    /// Newest first.
    fn incident_links(
        &self,
        tenant_id: TenantId,
        service: &str,
        limit: u32,
    ) -> Result<Vec<IncidentLink>, StoreError>;

    /// Change-to-deploy durations for synced change links deployed at or
    /// after `since_ms`.
    fn lead_time_samples(
        &self,
        tenant_id: TenantId,
        since_ms: i64,
    ) -> Result<Vec<LeadTimeSample>, StoreError>;

    /// Deletes every projection row of one tenant, or of all tenants.
    fn clear(&self, tenant_id: Option<TenantId>) -> Result<(), StoreError>;
    fn row_counts(&self, tenant_id: Option<TenantId>) -> Result<RebuildStats, StoreError>;
}
