use crate::error::StoreError;
use crate::projections::ProjectionRepository;
use crate::store::Store;
use crate::types::{
    ChangeLink, DeliveryOutcome, DeploymentRecord, DeploymentStatus, ServiceCurrentState,
    ServiceEnvState, ServiceStatus, TenantId,
};
use dw_events::cdevent::{EventFamily, ServiceLifecycle};
use dw_events::types::{EventRecord, StoredEvent};
use std::collections::HashSet;

pub const UNKNOWN_ENVIRONMENT: &str = "unknown";

/// Values a service event contributes to the projections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceFacts {
    pub service_name: String,
    pub environment: String,
    pub artifact_id: String,
    pub pipeline_run_id: String,
    pub run_url: String,
    pub actor_name: String,
    pub lifecycle: Option<ServiceLifecycle>,
    pub status: ServiceStatus,
}

impl ServiceFacts {
    /// `None` for non-service events and subjects without a usable name.
    pub fn derive(record: &EventRecord) -> Option<Self> {
        if !record.subject_type.trim().eq_ignore_ascii_case("service") {
            return None;
        }
        let service_name = service_name_from_subject_id(&record.subject_id);
        if service_name.is_empty() {
            return None;
        }
        let lifecycle = ServiceLifecycle::from_event_type(&record.event_type);
        let text = |path: &[&str]| record.content_str(path).unwrap_or_default().to_string();
        Some(Self {
            service_name,
            environment: record
                .content_str(&["environment", "id"])
                .unwrap_or(UNKNOWN_ENVIRONMENT)
                .to_string(),
            artifact_id: text(&["artifactId"]),
            pipeline_run_id: text(&["pipeline", "runId"]),
            run_url: text(&["pipeline", "url"]),
            actor_name: text(&["actor", "name"]),
            lifecycle,
            status: ServiceStatus::from_lifecycle(lifecycle),
        })
    }
}

/// `apps/orders` -> `orders`. A trailing slash keeps the whole id.
pub fn service_name_from_subject_id(subject_id: &str) -> String {
    let subject_id = subject_id.trim();
    match subject_id.rfind('/') {
        Some(idx) if idx + 1 < subject_id.len() => subject_id[idx + 1..].trim().to_string(),
        _ => subject_id.to_string(),
    }
}

/// Applies one newly appended event to every projection it touches. Must run
/// in the same transaction as the append.
pub fn apply<S: Store>(store: &S, event: &StoredEvent) -> Result<(), StoreError> {
    let record = &event.record;
    let tenant_id = TenantId::new(record.tenant_id).map_err(|err| StoreError::Corrupt {
        message: err.to_string(),
    })?;
    let projections = store.projections();

    if let Some(chain_id) = record.chain_id.as_deref() {
        match EventFamily::of(&record.event_type) {
            Some(EventFamily::Change) => {
                projections.record_chain_change(tenant_id, chain_id, record.event_ts_ms)?;
            }
            Some(EventFamily::Incident) => {
                projections.record_chain_incident(tenant_id, chain_id)?;
            }
            _ => {}
        }
    }

    let Some(facts) = ServiceFacts::derive(record) else {
        return Ok(());
    };

    if update_env_state(&projections, tenant_id, event, &facts)? {
        refresh_current_state(&projections, tenant_id, &facts.service_name)?;
    }

    if let Some(lifecycle) = facts.lifecycle {
        projections.increment_daily_stats(
            tenant_id,
            &facts.service_name,
            record.timestamp.date_naive(),
            DeliveryOutcome::from_lifecycle(lifecycle),
        )?;
        if let Some(status) = DeploymentStatus::from_lifecycle(lifecycle) {
            projections.insert_deployment(&DeploymentRecord {
                tenant_id,
                service_name: facts.service_name.clone(),
                environment: facts.environment.clone(),
                event_seq: event.seq,
                event_id: record.event_id.clone(),
                event_type: record.event_type.clone(),
                artifact_id: facts.artifact_id.clone(),
                status,
                event_ts_ms: record.event_ts_ms,
            })?;
        }
    }

    if let Some(chain_id) = record.chain_id.as_deref() {
        projections.upsert_change_link(&ChangeLink {
            tenant_id,
            service_name: facts.service_name.clone(),
            event_seq: event.seq,
            event_ts_ms: record.event_ts_ms,
            chain_id: chain_id.to_string(),
            environment: facts.environment.clone(),
            artifact_id: facts.artifact_id.clone(),
            pipeline_run_id: facts.pipeline_run_id.clone(),
            run_url: facts.run_url.clone(),
            actor_name: facts.actor_name.clone(),
            status: facts.status,
        })?;
    }

    Ok(())
}

/// Last write wins by event time; on equal timestamps the later append wins.
/// The failure streak is recomputed from the status log so arrival order does
/// not matter. Returns whether the latest event of the row changed.
fn update_env_state<P: ProjectionRepository>(
    projections: &P,
    tenant_id: TenantId,
    event: &StoredEvent,
    facts: &ServiceFacts,
) -> Result<bool, StoreError> {
    let record = &event.record;
    projections.record_env_status(
        tenant_id,
        &facts.service_name,
        &facts.environment,
        event.seq,
        record.event_ts_ms,
        facts.status,
    )?;
    let failure_streak =
        projections.failure_streak(tenant_id, &facts.service_name, &facts.environment)?;

    let previous = projections.env_state(tenant_id, &facts.service_name, &facts.environment)?;
    if let Some(previous) = previous {
        if (record.event_ts_ms, event.seq) < (previous.latest_event_ts_ms, previous.latest_event_seq)
        {
            if previous.failure_streak != failure_streak {
                projections.upsert_env_state(&ServiceEnvState {
                    failure_streak,
                    ..previous
                })?;
            }
            return Ok(false);
        }
    }

    projections.upsert_env_state(&ServiceEnvState {
        tenant_id,
        service_name: facts.service_name.clone(),
        environment: facts.environment.clone(),
        latest_event_seq: event.seq,
        latest_event_type: record.event_type.clone(),
        latest_event_ts_ms: record.event_ts_ms,
        latest_status: facts.status,
        latest_artifact_id: facts.artifact_id.clone(),
        failure_streak,
    })?;
    Ok(true)
}

fn refresh_current_state<P: ProjectionRepository>(
    projections: &P,
    tenant_id: TenantId,
    service_name: &str,
) -> Result<(), StoreError> {
    let states = projections.env_states(tenant_id, service_name)?;
    let Some(latest) = states
        .iter()
        .max_by_key(|state| (state.latest_event_ts_ms, state.latest_event_seq))
    else {
        return Ok(());
    };

    let artifacts: HashSet<&str> = states
        .iter()
        .map(|state| state.latest_artifact_id.as_str())
        .filter(|artifact| !artifact.is_empty())
        .collect();
    let failing = states
        .iter()
        .filter(|state| state.latest_status.is_failing())
        .count();

    projections.upsert_current_state(&ServiceCurrentState {
        tenant_id,
        service_name: service_name.to_string(),
        latest_event_seq: latest.latest_event_seq,
        latest_event_type: latest.latest_event_type.clone(),
        latest_event_ts_ms: latest.latest_event_ts_ms,
        latest_status: latest.latest_status,
        latest_artifact_id: latest.latest_artifact_id.clone(),
        latest_environment: latest.environment.clone(),
        drift_count: i64::try_from(artifacts.len()).unwrap_or(i64::MAX),
        failing_environments: i64::try_from(failing).unwrap_or(i64::MAX),
    })
}
