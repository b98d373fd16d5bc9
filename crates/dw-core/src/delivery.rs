use crate::error::{DeliveryError, StoreError, TenantError};
use crate::events::EventRepository;
use crate::projection;
use crate::projections::ProjectionRepository;
use crate::store::Store;
use crate::tenants::TenantRepository;
use crate::types::{
    ChangeFailureRate, ChangeLink, DeliveryStats, DeploymentRecord, IncidentLink, LeadTimeReport,
    NewTenant, RebuildStats, ServiceCurrentState, ServiceEnvState, Tenant, TenantId,
};
use chrono::{DateTime, Duration, Utc};
use dw_events::bus::EventBus;
use dw_events::types::{EventRecord, StoredEvent};
use tracing::{debug, info};

pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
pub const MAX_HISTORY_LIMIT: u32 = 500;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;
pub const MAX_WINDOW_DAYS: u32 = 365;

pub fn clamp_limit(limit: Option<u32>) -> u32 {
    limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

pub fn clamp_days(days: Option<u32>) -> u32 {
    match days {
        None | Some(0) => DEFAULT_WINDOW_DAYS,
        Some(days) => days.min(MAX_WINDOW_DAYS),
    }
}

/// Entry point over one store handle: appends with projection upkeep, tenant
/// bookkeeping and the projection read side.
pub struct Delivery<S: Store> {
    store: S,
    event_bus: EventBus,
}

impl<S: Store> Delivery<S> {
    pub fn new(store: S, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    pub fn tenants(&self) -> TenantsApi<'_, S> {
        TenantsApi { core: self }
    }

    pub fn events(&self) -> EventsApi<'_, S> {
        EventsApi { core: self }
    }

    pub fn projections(&self) -> ProjectionsApi<'_, S> {
        ProjectionsApi { core: self }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn publish(&self, events: Vec<StoredEvent>) {
        for event in events {
            let _ = self.event_bus.publish(event);
        }
    }
}

pub struct TenantsApi<'a, S: Store> {
    core: &'a Delivery<S>,
}

impl<S: Store> TenantsApi<'_, S> {
    pub fn create(&self, input: &NewTenant) -> Result<Tenant, DeliveryError> {
        let tenant = self.core.store.tenants().create(input)?;
        info!(tenant_id = %tenant.id, name = %tenant.name, "tenant created");
        Ok(tenant)
    }

    pub fn get(&self, id: TenantId) -> Result<Tenant, DeliveryError> {
        self.core
            .store
            .tenants()
            .get(id)?
            .ok_or(DeliveryError::Tenant(TenantError::NotFound))
    }

    pub fn list(&self) -> Result<Vec<Tenant>, DeliveryError> {
        Ok(self.core.store.tenants().list()?)
    }

    pub fn set_enabled(&self, id: TenantId, enabled: bool) -> Result<Tenant, DeliveryError> {
        Ok(self.core.store.tenants().set_enabled(id, enabled)?)
    }

    pub fn delete(&self, id: TenantId) -> Result<(), DeliveryError> {
        self.core
            .store
            .with_tx(|store| store.tenants().delete(id))?;
        info!(tenant_id = %id, "tenant deleted");
        Ok(())
    }
}

pub struct EventsApi<'a, S: Store> {
    core: &'a Delivery<S>,
}

impl<S: Store> EventsApi<'_, S> {
    /// Appends one event. Duplicates return `Ok(None)` and touch nothing.
    pub fn append(&self, record: &EventRecord) -> Result<Option<StoredEvent>, StoreError> {
        let mut appended = self.append_batch(std::slice::from_ref(record))?;
        Ok(appended.pop())
    }

    /// Appends a batch in one transaction, running the projection maintainer
    /// for every newly inserted row. Returns only the rows that were new.
    pub fn append_batch(&self, records: &[EventRecord]) -> Result<Vec<StoredEvent>, StoreError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let appended = self.core.store.with_tx(|store| {
            let mut appended = Vec::with_capacity(records.len());
            for record in records {
                let Some(stored) = store.events().append(record)? else {
                    debug!(
                        tenant_id = record.tenant_id,
                        event_id = %record.event_id,
                        "duplicate event ignored"
                    );
                    continue;
                };
                projection::apply(store, &stored)?;
                appended.push(stored);
            }
            Ok::<_, StoreError>(appended)
        })?;
        self.core.publish(appended.clone());
        Ok(appended)
    }

    pub fn list(
        &self,
        tenant_id: TenantId,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<StoredEvent>, DeliveryError> {
        Ok(self.core.store.events().list(tenant_id, after, limit)?)
    }

    pub fn count(&self, tenant_id: TenantId) -> Result<i64, DeliveryError> {
        Ok(self.core.store.events().count(tenant_id)?)
    }
}

pub struct ProjectionsApi<'a, S: Store> {
    core: &'a Delivery<S>,
}

impl<S: Store> ProjectionsApi<'_, S> {
    /// Point lookup for one `(service, environment)`, carrying the service's
    /// drift count alongside.
    pub fn env_state(
        &self,
        tenant_id: TenantId,
        service: &str,
        environment: &str,
    ) -> Result<Option<(ServiceEnvState, i64)>, DeliveryError> {
        let projections = self.core.store.projections();
        let Some(state) = projections.env_state(tenant_id, service, environment)? else {
            return Ok(None);
        };
        let drift = projections
            .current_state(tenant_id, service)?
            .map_or(0, |current| current.drift_count);
        Ok(Some((state, drift)))
    }

    pub fn environments(
        &self,
        tenant_id: TenantId,
        service: &str,
    ) -> Result<Vec<ServiceEnvState>, DeliveryError> {
        Ok(self.core.store.projections().env_states(tenant_id, service)?)
    }

    pub fn current_state(
        &self,
        tenant_id: TenantId,
        service: &str,
    ) -> Result<Option<ServiceCurrentState>, DeliveryError> {
        Ok(self
            .core
            .store
            .projections()
            .current_state(tenant_id, service)?)
    }

    pub fn deployment_history(
        &self,
        tenant_id: TenantId,
        service: &str,
        limit: Option<u32>,
    ) -> Result<Vec<DeploymentRecord>, DeliveryError> {
        Ok(self.core.store.projections().deployment_history(
            tenant_id,
            service,
            clamp_limit(limit),
        )?)
    }

    pub fn delivery_stats(
        &self,
        tenant_id: TenantId,
        service: &str,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<DeliveryStats, DeliveryError> {
        let days = clamp_days(days);
        let since = (now - Duration::days(i64::from(days))).date_naive();
        let mut stats = self
            .core
            .store
            .projections()
            .delivery_stats_since(tenant_id, service, since)?;
        stats.days = days;
        Ok(stats)
    }

    pub fn delivery_stats_30d(
        &self,
        tenant_id: TenantId,
        service: &str,
    ) -> Result<DeliveryStats, DeliveryError> {
        self.delivery_stats(tenant_id, service, Some(DEFAULT_WINDOW_DAYS), Utc::now())
    }

    pub fn change_failure_rate(
        &self,
        tenant_id: TenantId,
        service: &str,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<ChangeFailureRate, DeliveryError> {
        let stats = self.delivery_stats(tenant_id, service, days, now)?;
        Ok(ChangeFailureRate {
            service: service.to_string(),
            days: stats.days,
            total: stats.total(),
            failure_count: stats.failure_count,
            rollback_count: stats.rollback_count,
            rate_percent: stats.change_failure_rate(),
        })
    }

    pub fn change_links(
        &self,
        tenant_id: TenantId,
        service: &str,
        limit: Option<u32>,
    ) -> Result<Vec<ChangeLink>, DeliveryError> {
        Ok(self
            .core
            .store
            .projections()
            .change_links(tenant_id, service, clamp_limit(limit))?)
    }

    /// Change links of `service` whose chain has reported incidents.
    pub fn incident_links(
        &self,
        tenant_id: TenantId,
        service: &str,
        limit: Option<u32>,
    ) -> Result<Vec<IncidentLink>, DeliveryError> {
        Ok(self
            .core
            .store
            .projections()
            .incident_links(tenant_id, service, clamp_limit(limit))?)
    }

    pub fn lead_time_report(
        &self,
        tenant_id: TenantId,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<LeadTimeReport, DeliveryError> {
        let days = clamp_days(days);
        let since_ms = (now - Duration::days(i64::from(days))).timestamp_millis();
        let samples = self
            .core
            .store
            .projections()
            .lead_time_samples(tenant_id, since_ms)?;
        Ok(LeadTimeReport::from_samples(days, &samples))
    }

    /// Empties the projections of one tenant (or all tenants) and replays the
    /// log in `(event_ts_ms, seq)` order through the same maintainer.
    pub fn rebuild(&self, tenant_id: Option<TenantId>) -> Result<RebuildStats, DeliveryError> {
        let stats = self.core.store.with_tx(|store| {
            store.projections().clear(tenant_id)?;
            let events = store.events().replay_order(tenant_id)?;
            for event in &events {
                projection::apply(store, event)?;
            }
            let mut stats = store.projections().row_counts(tenant_id)?;
            stats.events_replayed = i64::try_from(events.len()).unwrap_or(i64::MAX);
            Ok::<_, StoreError>(stats)
        })?;
        info!(
            tenant_id = ?tenant_id.map(TenantId::get),
            events = stats.events_replayed,
            current_state_rows = stats.current_state_rows,
            env_state_rows = stats.env_state_rows,
            "projections rebuilt"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_HISTORY_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_HISTORY_LIMIT);
    }

    #[test]
    fn test_clamp_days() {
        assert_eq!(clamp_days(None), 30);
        assert_eq!(clamp_days(Some(0)), 30);
        assert_eq!(clamp_days(Some(7)), 7);
        assert_eq!(clamp_days(Some(1000)), 365);
    }
}
