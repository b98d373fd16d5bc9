use crate::store::{DbStore, DbStoreFactory};
use chrono::{DateTime, Duration, TimeZone, Utc};
use dw_core::auth::sign;
use dw_core::batcher::{BatchSink, IngestBatcher, StoreSink};
use dw_core::config::BatchConfig;
use dw_core::error::IngestError;
use dw_core::ingest::{IngestCommand, IngestGate};
use dw_core::store::{Store, StoreFactory};
use dw_core::tenants::TenantRepository;
use dw_core::types::{DeploymentStatus, NewTenant, ServiceStatus, Tenant, TenantId};
use dw_core::{Delivery, TenantError};
use dw_events::bus::EventBus;
use dw_events::envelope::RequestHeaders;
use dw_events::normalize;
use dw_events::types::EventRecord;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap()
}

struct ServiceEvent<'a> {
    id: &'a str,
    predicate: &'a str,
    service: &'a str,
    environment: &'a str,
    artifact: &'a str,
    minutes: i64,
    chain: Option<&'a str>,
}

impl<'a> ServiceEvent<'a> {
    fn new(id: &'a str, predicate: &'a str, minutes: i64) -> Self {
        Self {
            id,
            predicate,
            service: "orders",
            environment: "staging",
            artifact: "pkg:generic/orders@v1",
            minutes,
            chain: None,
        }
    }

    fn env(mut self, environment: &'a str) -> Self {
        self.environment = environment;
        self
    }

    fn artifact(mut self, artifact: &'a str) -> Self {
        self.artifact = artifact;
        self
    }

    fn chain(mut self, chain: &'a str) -> Self {
        self.chain = Some(chain);
        self
    }

    fn payload(&self) -> Value {
        let timestamp = base_time() + Duration::minutes(self.minutes);
        let mut context = json!({
            "id": self.id,
            "source": "ci/pipeline",
            "type": format!("dev.cdevents.service.{}.0.3.0", self.predicate),
            "timestamp": timestamp.to_rfc3339(),
            "specversion": "0.5.0",
        });
        if let Some(chain) = self.chain {
            context["chainId"] = json!(chain);
        }
        json!({
            "context": context,
            "subject": {
                "id": format!("apps/{}", self.service),
                "type": "service",
                "content": {
                    "environment": { "id": self.environment },
                    "artifactId": self.artifact,
                    "pipeline": { "runId": "run-1", "url": "https://ci.example/run-1" },
                    "actor": { "name": "dana" }
                }
            }
        })
    }

    fn body(&self) -> Vec<u8> {
        serde_json::to_vec(&self.payload()).unwrap()
    }

    fn record(&self, tenant: TenantId) -> EventRecord {
        normalize(&RequestHeaders::new(), &self.body())
            .unwrap()
            .into_record(tenant.get())
    }
}

fn change_event(id: &str, chain: &str, minutes: i64) -> Vec<u8> {
    let timestamp = base_time() + Duration::minutes(minutes);
    serde_json::to_vec(&json!({
        "context": {
            "id": id,
            "source": "git",
            "type": "dev.cdevents.change.merged.0.2.0",
            "timestamp": timestamp.to_rfc3339(),
            "chainId": chain,
        },
        "subject": { "id": "repo/orders/pr/7", "content": {} }
    }))
    .unwrap()
}

fn incident_event(id: &str, chain: &str, minutes: i64) -> Vec<u8> {
    let timestamp = base_time() + Duration::minutes(minutes);
    serde_json::to_vec(&json!({
        "context": {
            "id": id,
            "source": "pager",
            "type": "dev.cdevents.incident.detected.0.2.0",
            "timestamp": timestamp.to_rfc3339(),
            "chainId": chain,
        },
        "subject": { "id": "inc-1", "content": {} }
    }))
    .unwrap()
}

struct Harness {
    _dir: TempDir,
    factory: DbStoreFactory,
    bus: EventBus,
    tenant: Tenant,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let factory = DbStoreFactory::new(dir.path().join("dw.db")).unwrap();
        let bus = EventBus::new(64);
        let tenant = Delivery::new(factory.open().unwrap(), bus.clone())
            .tenants()
            .create(&NewTenant {
                name: "acme".to_string(),
                auth_token: "tok".to_string(),
                webhook_secret: "s".to_string(),
                enabled: true,
            })
            .unwrap();
        Self {
            _dir: dir,
            factory,
            bus,
            tenant,
        }
    }

    fn delivery(&self) -> Delivery<DbStore> {
        Delivery::new(self.factory.open().unwrap(), self.bus.clone())
    }

    fn gate(&self, batch: BatchConfig) -> IngestGate<DbStoreFactory> {
        IngestGate::new(self.factory.clone(), self.bus.clone(), batch, 1 << 20)
    }

    fn append(&self, event: &ServiceEvent<'_>) {
        self.delivery()
            .events()
            .append(&event.record(self.tenant.id))
            .unwrap();
    }

    fn command(&self, body: Vec<u8>, secret: &str) -> IngestCommand {
        IngestCommand {
            authorization: Some(format!("Bearer {}", self.tenant.auth_token)),
            signature: Some(sign(secret, &body)),
            headers: RequestHeaders::new(),
            body,
        }
    }
}

#[test]
fn test_lifecycle_updates_env_and_current_state() {
    let h = Harness::new();
    h.append(&ServiceEvent::new("evt-1", "deployed", 0));
    h.append(&ServiceEvent::new("evt-2", "rolledback", 5).artifact("pkg:generic/orders@v0"));

    let delivery = h.delivery();
    let (state, drift) = delivery
        .projections()
        .env_state(h.tenant.id, "orders", "staging")
        .unwrap()
        .unwrap();
    assert_eq!(state.latest_status, ServiceStatus::Warning);
    assert_eq!(state.latest_artifact_id, "pkg:generic/orders@v0");
    assert_eq!(state.failure_streak, 1);
    assert_eq!(drift, 1);

    let current = delivery
        .projections()
        .current_state(h.tenant.id, "orders")
        .unwrap()
        .unwrap();
    assert_eq!(current.latest_environment, "staging");
    assert_eq!(current.failing_environments, 1);

    let stats = delivery
        .projections()
        .delivery_stats(h.tenant.id, "orders", Some(30), base_time())
        .unwrap();
    assert_eq!((stats.success_count, stats.rollback_count), (1, 1));
    assert!((stats.change_failure_rate() - 50.0).abs() < f64::EPSILON);
}

#[test]
fn test_older_event_does_not_overwrite_state() {
    let h = Harness::new();
    h.append(&ServiceEvent::new("evt-new", "deployed", 10).artifact("pkg:generic/orders@v2"));
    h.append(&ServiceEvent::new("evt-old", "rolledback", 0).artifact("pkg:generic/orders@v1"));

    let delivery = h.delivery();
    let (state, _) = delivery
        .projections()
        .env_state(h.tenant.id, "orders", "staging")
        .unwrap()
        .unwrap();
    assert_eq!(state.latest_status, ServiceStatus::Synced);
    assert_eq!(state.latest_artifact_id, "pkg:generic/orders@v2");

    // Stats and history still count the late arrival.
    let stats = delivery
        .projections()
        .delivery_stats(h.tenant.id, "orders", None, base_time())
        .unwrap();
    assert_eq!(stats.total(), 2);
    let history = delivery
        .projections()
        .deployment_history(h.tenant.id, "orders", None)
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].event_id, "evt-new");
}

#[test]
fn test_equal_timestamps_prefer_later_append() {
    let h = Harness::new();
    h.append(&ServiceEvent::new("evt-a", "deployed", 0).artifact("pkg:generic/orders@a"));
    h.append(&ServiceEvent::new("evt-b", "deployed", 0).artifact("pkg:generic/orders@b"));

    let (state, _) = h
        .delivery()
        .projections()
        .env_state(h.tenant.id, "orders", "staging")
        .unwrap()
        .unwrap();
    assert_eq!(state.latest_artifact_id, "pkg:generic/orders@b");
}

#[test]
fn test_drift_across_environments() {
    let h = Harness::new();
    h.append(&ServiceEvent::new("evt-1", "deployed", 0).env("staging").artifact("v2"));
    h.append(&ServiceEvent::new("evt-2", "deployed", 1).env("prod").artifact("v1"));
    h.append(&ServiceEvent::new("evt-3", "removed", 2).env("qa").artifact(""));

    let delivery = h.delivery();
    let current = delivery
        .projections()
        .current_state(h.tenant.id, "orders")
        .unwrap()
        .unwrap();
    assert_eq!(current.drift_count, 2);
    assert_eq!(current.latest_environment, "qa");
    assert_eq!(current.latest_status, ServiceStatus::OutOfSync);

    let environments = delivery
        .projections()
        .environments(h.tenant.id, "orders")
        .unwrap();
    let names: Vec<&str> = environments.iter().map(|s| s.environment.as_str()).collect();
    assert_eq!(names, vec!["prod", "qa", "staging"]);

    // Removal is counted as a failure but is not a deployment.
    let history = delivery
        .projections()
        .deployment_history(h.tenant.id, "orders", Some(10))
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|d| d.status == DeploymentStatus::Success));
}

#[test]
fn test_failure_streak_resets_on_success() {
    let h = Harness::new();
    h.append(&ServiceEvent::new("evt-1", "rolledback", 0));
    h.append(&ServiceEvent::new("evt-2", "removed", 1));
    let (state, _) = h
        .delivery()
        .projections()
        .env_state(h.tenant.id, "orders", "staging")
        .unwrap()
        .unwrap();
    assert_eq!(state.failure_streak, 2);

    h.append(&ServiceEvent::new("evt-3", "upgraded", 2));
    let (state, _) = h
        .delivery()
        .projections()
        .env_state(h.tenant.id, "orders", "staging")
        .unwrap()
        .unwrap();
    assert_eq!(state.failure_streak, 0);
}

#[test]
fn test_duplicate_append_touches_nothing() {
    let h = Harness::new();
    let event = ServiceEvent::new("evt-1", "deployed", 0);
    let delivery = h.delivery();
    let first = delivery.events().append(&event.record(h.tenant.id)).unwrap();
    let second = delivery.events().append(&event.record(h.tenant.id)).unwrap();
    assert!(first.is_some());
    assert!(second.is_none());

    assert_eq!(delivery.events().count(h.tenant.id).unwrap(), 1);
    let stats = delivery
        .projections()
        .delivery_stats(h.tenant.id, "orders", None, base_time())
        .unwrap();
    assert_eq!(stats.success_count, 1);
}

#[test]
fn test_batch_rolls_back_as_a_unit() {
    let h = Harness::new();
    let good = ServiceEvent::new("evt-1", "deployed", 0).record(h.tenant.id);
    let mut orphan = ServiceEvent::new("evt-2", "deployed", 1).record(h.tenant.id);
    orphan.tenant_id = 999;

    let delivery = h.delivery();
    assert!(delivery.events().append_batch(&[good, orphan]).is_err());
    assert_eq!(delivery.events().count(h.tenant.id).unwrap(), 0);
    assert!(
        delivery
            .projections()
            .current_state(h.tenant.id, "orders")
            .unwrap()
            .is_none()
    );
}

#[test]
fn test_rebuild_matches_incremental_state() {
    let h = Harness::new();
    let delivery = h.delivery();
    delivery
        .events()
        .append(
            &normalize(&RequestHeaders::new(), &change_event("chg-1", "chain-1", -30))
                .unwrap()
                .into_record(h.tenant.id.get()),
        )
        .unwrap();
    h.append(&ServiceEvent::new("evt-1", "deployed", 0).chain("chain-1"));
    h.append(&ServiceEvent::new("evt-2", "deployed", 3).env("prod").artifact("v9"));
    h.append(&ServiceEvent::new("evt-3", "rolledback", 6).env("prod").chain("chain-1"));

    let projections = delivery.projections();
    let before = (
        projections.environments(h.tenant.id, "orders").unwrap(),
        projections.current_state(h.tenant.id, "orders").unwrap(),
        projections
            .deployment_history(h.tenant.id, "orders", None)
            .unwrap(),
        projections.change_links(h.tenant.id, "orders", None).unwrap(),
        projections
            .delivery_stats(h.tenant.id, "orders", None, base_time())
            .unwrap(),
    );

    let stats = projections.rebuild(Some(h.tenant.id)).unwrap();
    assert_eq!(stats.events_replayed, 4);
    assert_eq!(stats.env_state_rows, 2);
    assert_eq!(stats.current_state_rows, 1);
    assert_eq!(stats.deployment_rows, 3);
    assert_eq!(stats.change_link_rows, 2);
    assert_eq!(stats.chain_marker_rows, 1);

    let after = (
        projections.environments(h.tenant.id, "orders").unwrap(),
        projections.current_state(h.tenant.id, "orders").unwrap(),
        projections
            .deployment_history(h.tenant.id, "orders", None)
            .unwrap(),
        projections.change_links(h.tenant.id, "orders", None).unwrap(),
        projections
            .delivery_stats(h.tenant.id, "orders", None, base_time())
            .unwrap(),
    );
    assert_eq!(before, after);
}

#[test]
fn test_late_failure_streak_matches_rebuild() {
    let h = Harness::new();
    h.append(&ServiceEvent::new("evt-1", "rolledback", 10).env("prod"));
    h.append(&ServiceEvent::new("evt-2", "rolledback", 5).env("prod"));

    let streak = |h: &Harness| {
        let (state, _) = h
            .delivery()
            .projections()
            .env_state(h.tenant.id, "orders", "prod")
            .unwrap()
            .unwrap();
        (state.latest_event_ts_ms, state.failure_streak)
    };
    let latest_ms = (base_time() + Duration::minutes(10)).timestamp_millis();
    assert_eq!(streak(&h), (latest_ms, 2));

    h.delivery().projections().rebuild(Some(h.tenant.id)).unwrap();
    assert_eq!(streak(&h), (latest_ms, 2));

    // A sync older than both failures leaves the streak alone; one between
    // them cuts it to the later failure.
    h.append(&ServiceEvent::new("evt-3", "deployed", 1).env("prod"));
    assert_eq!(streak(&h), (latest_ms, 2));
    h.append(&ServiceEvent::new("evt-4", "deployed", 7).env("prod"));
    assert_eq!(streak(&h), (latest_ms, 1));

    h.delivery().projections().rebuild(Some(h.tenant.id)).unwrap();
    assert_eq!(streak(&h), (latest_ms, 1));
}

#[test]
fn test_incident_links_follow_chain_incidents() {
    let h = Harness::new();
    let delivery = h.delivery();
    h.append(&ServiceEvent::new("evt-1", "deployed", 0).env("prod").chain("chain-1"));
    h.append(&ServiceEvent::new("evt-2", "deployed", 5).env("prod").chain("chain-2"));
    let projections = delivery.projections();
    assert!(
        projections
            .incident_links(h.tenant.id, "orders", None)
            .unwrap()
            .is_empty()
    );

    for (id, minutes) in [("inc-a", 20), ("inc-b", 25)] {
        delivery
            .events()
            .append(
                &normalize(&RequestHeaders::new(), &incident_event(id, "chain-1", minutes))
                    .unwrap()
                    .into_record(h.tenant.id.get()),
            )
            .unwrap();
    }

    let links = projections
        .incident_links(h.tenant.id, "orders", None)
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].chain_id, "chain-1");
    assert_eq!(links[0].environment, "prod");
    assert_eq!(links[0].incident_count, 2);

    projections.rebuild(Some(h.tenant.id)).unwrap();
    assert_eq!(
        projections
            .incident_links(h.tenant.id, "orders", None)
            .unwrap(),
        links
    );
}

#[test]
fn test_lead_time_report_from_chain() {
    let h = Harness::new();
    let delivery = h.delivery();
    delivery
        .events()
        .append(
            &normalize(&RequestHeaders::new(), &change_event("chg-1", "chain-1", -60))
                .unwrap()
                .into_record(h.tenant.id.get()),
        )
        .unwrap();
    h.append(&ServiceEvent::new("evt-1", "deployed", 0).chain("chain-1"));
    h.append(&ServiceEvent::new("evt-2", "deployed", 30).env("prod").chain("chain-1"));

    let report = delivery
        .projections()
        .lead_time_report(h.tenant.id, Some(7), base_time() + Duration::hours(1))
        .unwrap();
    assert_eq!(report.days, 7);
    assert_eq!(report.overall.samples, 2);
    assert_eq!(report.overall.p50_seconds, 3600);
    assert_eq!(report.overall.p95_seconds, 5400);
    assert_eq!(report.by_service.len(), 1);
    assert_eq!(report.by_day.len(), 1);
    assert_eq!(report.by_day[0].day, "2026-03-01");
}

#[test]
fn test_tenant_isolation_and_cascade_delete() {
    let h = Harness::new();
    let delivery = h.delivery();
    let other = delivery
        .tenants()
        .create(&NewTenant {
            name: "globex".to_string(),
            auth_token: "tok-2".to_string(),
            webhook_secret: "s2".to_string(),
            enabled: true,
        })
        .unwrap();

    let event = ServiceEvent::new("evt-1", "deployed", 0);
    delivery.events().append(&event.record(h.tenant.id)).unwrap();
    delivery.events().append(&event.record(other.id)).unwrap();

    assert!(
        delivery
            .projections()
            .current_state(other.id, "orders")
            .unwrap()
            .is_some()
    );
    delivery.tenants().delete(other.id).unwrap();
    assert_eq!(delivery.events().count(other.id).unwrap(), 0);
    assert!(
        delivery
            .projections()
            .current_state(other.id, "orders")
            .unwrap()
            .is_none()
    );
    assert_eq!(delivery.events().count(h.tenant.id).unwrap(), 1);
    assert!(matches!(
        delivery.tenants().get(other.id),
        Err(dw_core::DeliveryError::Tenant(TenantError::NotFound))
    ));
}

#[tokio::test]
async fn test_gate_accepts_signed_event() {
    let h = Harness::new();
    let gate = h.gate(BatchConfig::new(true, 10, 5));
    let mut live = h.bus.subscribe();

    let body = ServiceEvent::new("evt-1", "deployed", 0).body();
    let receipt = gate.ingest(h.command(body, "s")).await.unwrap();
    assert_eq!(receipt.tenant_id, h.tenant.id.get());
    assert_eq!(receipt.event_id, "evt-1");
    assert_eq!(receipt.event_type, "dev.cdevents.service.deployed.0.3.0");

    let published = live.recv().await.unwrap();
    assert_eq!(published.record.event_id, "evt-1");

    let (state, _) = h
        .delivery()
        .projections()
        .env_state(h.tenant.id, "orders", "staging")
        .unwrap()
        .unwrap();
    assert_eq!(state.latest_status, ServiceStatus::Synced);
    assert_eq!(state.latest_artifact_id, "pkg:generic/orders@v1");
    assert_eq!(state.latest_event_ts_ms, base_time().timestamp_millis());
}

#[tokio::test]
async fn test_gate_rejections_leave_no_rows() {
    let h = Harness::new();
    let gate = h.gate(BatchConfig::new(false, 1, 1));
    let body = ServiceEvent::new("evt-1", "deployed", 0).body();

    let err = gate.ingest(h.command(body.clone(), "wrong")).await.unwrap_err();
    assert_eq!(err, IngestError::InvalidSignature);

    let mut unsigned = h.command(body.clone(), "s");
    unsigned.signature = None;
    assert_eq!(gate.ingest(unsigned).await.unwrap_err(), IngestError::InvalidSignature);

    let mut anonymous = h.command(body.clone(), "s");
    anonymous.authorization = None;
    assert_eq!(gate.ingest(anonymous).await.unwrap_err(), IngestError::MissingAuth);

    let mut stranger = h.command(body, "s");
    stranger.authorization = Some("Bearer nope".to_string());
    assert_eq!(gate.ingest(stranger).await.unwrap_err(), IngestError::InvalidAuth);

    let unknown = serde_json::to_vec(&json!({
        "context": {
            "id": "evt-x",
            "source": "ci",
            "type": "dev.cdevents.unknown.thing.0.1.0",
            "timestamp": "2026-03-01T10:00:00Z"
        },
        "subject": { "id": "x", "content": {} }
    }))
    .unwrap();
    let err = gate.ingest(h.command(unknown, "s")).await.unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedType { .. }));

    assert_eq!(h.delivery().events().count(h.tenant.id).unwrap(), 0);
    assert!(
        h.delivery()
            .projections()
            .current_state(h.tenant.id, "orders")
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_gate_duplicate_delivery_counts_once() {
    let h = Harness::new();
    let gate = h.gate(BatchConfig::new(true, 100, 5));
    let body = ServiceEvent::new("evt-1", "rolledback", 0).body();

    gate.ingest(h.command(body.clone(), "s")).await.unwrap();
    gate.ingest(h.command(body, "s")).await.unwrap();

    let delivery = h.delivery();
    assert_eq!(delivery.events().count(h.tenant.id).unwrap(), 1);
    let stats = delivery
        .projections()
        .delivery_stats(h.tenant.id, "orders", None, base_time())
        .unwrap();
    assert_eq!(stats.rollback_count, 1);
}

#[tokio::test]
async fn test_gate_for_tenant_requires_enabled_tenant() {
    let h = Harness::new();
    let gate = h.gate(BatchConfig::new(false, 1, 1));
    let body = ServiceEvent::new("evt-1", "deployed", 0).body();
    let headers = RequestHeaders::new();

    let receipt = gate
        .ingest_for_tenant(h.tenant.id.get(), &headers, &body)
        .await
        .unwrap();
    assert_eq!(receipt.event_id, "evt-1");

    assert_eq!(
        gate.ingest_for_tenant(0, &headers, &body).await.unwrap_err(),
        IngestError::InvalidAuth
    );
    assert_eq!(
        gate.ingest_for_tenant(77, &headers, &body).await.unwrap_err(),
        IngestError::InvalidAuth
    );

    h.delivery()
        .tenants()
        .set_enabled(h.tenant.id, false)
        .unwrap();
    assert_eq!(
        gate.ingest_for_tenant(h.tenant.id.get(), &headers, &body)
            .await
            .unwrap_err(),
        IngestError::InvalidAuth
    );
    let err = gate.ingest(h.command(body, "s")).await.unwrap_err();
    assert_eq!(err, IngestError::InvalidAuth);
}

#[tokio::test]
async fn test_gate_rejects_oversized_body() {
    let h = Harness::new();
    let gate = IngestGate::new(
        h.factory.clone(),
        h.bus.clone(),
        BatchConfig::new(false, 1, 1),
        64,
    );
    let body = ServiceEvent::new("evt-1", "deployed", 0).body();
    assert!(body.len() > 64);
    let err = gate.ingest(h.command(body, "s")).await.unwrap_err();
    assert!(matches!(err, IngestError::InvalidPayload { .. }));
}

#[tokio::test]
async fn test_store_sink_writes_batch_atomically() {
    let h = Harness::new();
    let sink: Arc<dyn BatchSink> = Arc::new(StoreSink::new(h.factory.clone(), h.bus.clone()));
    let batcher = IngestBatcher::start(sink, BatchConfig::new(true, 3, 5000));

    let records: Vec<EventRecord> = ["evt-1", "evt-2", "evt-1"]
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            ServiceEvent::new(id, "deployed", i64::try_from(idx).unwrap()).record(h.tenant.id)
        })
        .collect();
    let (a, b, c) = tokio::join!(
        batcher.submit(records[0].clone()),
        batcher.submit(records[1].clone()),
        batcher.submit(records[2].clone())
    );
    // The in-batch duplicate is not a failure.
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(h.delivery().events().count(h.tenant.id).unwrap(), 2);
    assert_eq!(batcher.stats().flush_batches, 1);
}

#[test]
fn test_store_with_tx_rolls_back_on_error() {
    let h = Harness::new();
    let store = h.factory.open().unwrap();
    let result: Result<(), TenantError> = store.with_tx(|store| {
        store.tenants().create(&NewTenant {
            name: "temp".to_string(),
            auth_token: "tok-temp".to_string(),
            webhook_secret: "x".to_string(),
            enabled: true,
        })?;
        Err(TenantError::InvalidInput {
            message: "abort".to_string(),
        })
    });
    assert!(result.is_err());
    assert!(store.tenants().get_by_auth_token("tok-temp").unwrap().is_none());
}
