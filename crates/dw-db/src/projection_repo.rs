use chrono::{DateTime, NaiveDate};
use dw_core::error::StoreError;
use dw_core::projections::ProjectionRepository;
use dw_core::types::{
    ChainMarker, ChangeLink, DeliveryOutcome, DeliveryStats, DeploymentRecord, DeploymentStatus,
    IncidentLink, LeadTimeSample, RebuildStats, ServiceCurrentState, ServiceEnvState, ServiceStatus, TenantId,
};
use rusqlite::{Connection, params};

use crate::util::tenant_id;

const DAY_FORMAT: &str = "%Y-%m-%d";

const PROJECTION_TABLES: [&str; 7] = [
    "service_env_state",
    "service_env_status_log",
    "service_current_state",
    "service_delivery_stats_daily",
    "service_deployments",
    "service_change_links",
    "chain_markers",
];

const ENV_STATE_COLUMNS: &str = "tenant_id, service_name, environment, latest_event_seq, \
     latest_event_type, latest_event_ts_ms, latest_status, latest_artifact_id, failure_streak";

const CURRENT_STATE_COLUMNS: &str = "tenant_id, service_name, latest_event_seq, \
     latest_event_type, latest_event_ts_ms, latest_status, latest_artifact_id, \
     latest_environment, drift_count, failing_environments";

const CHANGE_LINK_COLUMNS: &str = "tenant_id, service_name, event_seq, event_ts_ms, chain_id, \
     environment, artifact_id, pipeline_run_id, run_url, actor_name, status";

pub struct ProjectionRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> ProjectionRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn collect<T>(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
        map: fn(&rusqlite::Row<'_>) -> Result<T, StoreError>,
    ) -> Result<Vec<T>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(StoreError::storage)?;
        let mut rows = stmt.query(params).map_err(StoreError::storage)?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().map_err(StoreError::storage)? {
            items.push(map(row)?);
        }
        Ok(items)
    }

    fn count(&self, table: &str, tenant: Option<TenantId>) -> Result<i64, StoreError> {
        let result = match tenant {
            Some(tenant) => self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE tenant_id = ?1"),
                [tenant.get()],
                |row| row.get(0),
            ),
            None => self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get(0)
                }),
        };
        result.map_err(StoreError::storage)
    }
}

impl ProjectionRepository for ProjectionRepo<'_> {
    fn env_state(
        &self,
        tenant: TenantId,
        service: &str,
        environment: &str,
    ) -> Result<Option<ServiceEnvState>, StoreError> {
        let mut states = self.collect(
            &format!(
                "SELECT {ENV_STATE_COLUMNS} FROM service_env_state WHERE tenant_id = ?1 AND service_name = ?2 AND environment = ?3"
            ),
            params![tenant.get(), service, environment],
            map_env_state_row,
        )?;
        Ok(states.pop())
    }

    fn env_states(
        &self,
        tenant: TenantId,
        service: &str,
    ) -> Result<Vec<ServiceEnvState>, StoreError> {
        self.collect(
            &format!(
                "SELECT {ENV_STATE_COLUMNS} FROM service_env_state WHERE tenant_id = ?1 AND service_name = ?2 ORDER BY environment ASC"
            ),
            params![tenant.get(), service],
            map_env_state_row,
        )
    }

    fn upsert_env_state(&self, state: &ServiceEnvState) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO service_env_state (tenant_id, service_name, environment, latest_event_seq, latest_event_type, latest_event_ts_ms, latest_status, latest_artifact_id, failure_streak) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT (tenant_id, service_name, environment) DO UPDATE SET \
                 latest_event_seq = excluded.latest_event_seq, \
                 latest_event_type = excluded.latest_event_type, \
                 latest_event_ts_ms = excluded.latest_event_ts_ms, \
                 latest_status = excluded.latest_status, \
                 latest_artifact_id = excluded.latest_artifact_id, \
                 failure_streak = excluded.failure_streak",
                params![
                    state.tenant_id.get(),
                    state.service_name,
                    state.environment,
                    state.latest_event_seq,
                    state.latest_event_type,
                    state.latest_event_ts_ms,
                    state.latest_status.as_str(),
                    state.latest_artifact_id,
                    state.failure_streak,
                ],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn record_env_status(
        &self,
        tenant: TenantId,
        service: &str,
        environment: &str,
        event_seq: i64,
        event_ts_ms: i64,
        status: ServiceStatus,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO service_env_status_log (tenant_id, event_seq, service_name, environment, event_ts_ms, status) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT (tenant_id, event_seq) DO NOTHING",
                params![
                    tenant.get(),
                    event_seq,
                    service,
                    environment,
                    event_ts_ms,
                    status.as_str()
                ],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn failure_streak(
        &self,
        tenant: TenantId,
        service: &str,
        environment: &str,
    ) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM service_env_status_log s \
                 WHERE s.tenant_id = ?1 AND s.service_name = ?2 AND s.environment = ?3 \
                 AND s.status IN ('warning', 'out-of-sync') \
                 AND NOT EXISTS (SELECT 1 FROM service_env_status_log r \
                 WHERE r.tenant_id = s.tenant_id AND r.service_name = s.service_name \
                 AND r.environment = s.environment AND r.status = 'synced' \
                 AND (r.event_ts_ms, r.event_seq) > (s.event_ts_ms, s.event_seq))",
                params![tenant.get(), service, environment],
                |row| row.get(0),
            )
            .map_err(StoreError::storage)
    }

    fn current_state(
        &self,
        tenant: TenantId,
        service: &str,
    ) -> Result<Option<ServiceCurrentState>, StoreError> {
        let mut states = self.collect(
            &format!(
                "SELECT {CURRENT_STATE_COLUMNS} FROM service_current_state WHERE tenant_id = ?1 AND service_name = ?2"
            ),
            params![tenant.get(), service],
            map_current_state_row,
        )?;
        Ok(states.pop())
    }

    fn upsert_current_state(&self, state: &ServiceCurrentState) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO service_current_state (tenant_id, service_name, latest_event_seq, latest_event_type, latest_event_ts_ms, latest_status, latest_artifact_id, latest_environment, drift_count, failing_environments) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT (tenant_id, service_name) DO UPDATE SET \
                 latest_event_seq = excluded.latest_event_seq, \
                 latest_event_type = excluded.latest_event_type, \
                 latest_event_ts_ms = excluded.latest_event_ts_ms, \
                 latest_status = excluded.latest_status, \
                 latest_artifact_id = excluded.latest_artifact_id, \
                 latest_environment = excluded.latest_environment, \
                 drift_count = excluded.drift_count, \
                 failing_environments = excluded.failing_environments",
                params![
                    state.tenant_id.get(),
                    state.service_name,
                    state.latest_event_seq,
                    state.latest_event_type,
                    state.latest_event_ts_ms,
                    state.latest_status.as_str(),
                    state.latest_artifact_id,
                    state.latest_environment,
                    state.drift_count,
                    state.failing_environments,
                ],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn increment_daily_stats(
        &self,
        tenant: TenantId,
        service: &str,
        day: NaiveDate,
        outcome: DeliveryOutcome,
    ) -> Result<(), StoreError> {
        let (success, failure, rollback) = match outcome {
            DeliveryOutcome::Success => (1, 0, 0),
            DeliveryOutcome::Failure => (0, 1, 0),
            DeliveryOutcome::Rollback => (0, 0, 1),
        };
        self.conn
            .execute(
                "INSERT INTO service_delivery_stats_daily (tenant_id, service_name, day_utc, success_count, failure_count, rollback_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT (tenant_id, service_name, day_utc) DO UPDATE SET \
                 success_count = success_count + excluded.success_count, \
                 failure_count = failure_count + excluded.failure_count, \
                 rollback_count = rollback_count + excluded.rollback_count",
                params![
                    tenant.get(),
                    service,
                    day.format(DAY_FORMAT).to_string(),
                    success,
                    failure,
                    rollback
                ],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn delivery_stats_since(
        &self,
        tenant: TenantId,
        service: &str,
        since: NaiveDate,
    ) -> Result<DeliveryStats, StoreError> {
        self.conn
            .query_row(
                "SELECT COALESCE(SUM(success_count), 0), COALESCE(SUM(failure_count), 0), COALESCE(SUM(rollback_count), 0) \
                 FROM service_delivery_stats_daily WHERE tenant_id = ?1 AND service_name = ?2 AND day_utc >= ?3",
                params![tenant.get(), service, since.format(DAY_FORMAT).to_string()],
                |row| {
                    Ok(DeliveryStats {
                        days: 0,
                        success_count: row.get(0)?,
                        failure_count: row.get(1)?,
                        rollback_count: row.get(2)?,
                    })
                },
            )
            .map_err(StoreError::storage)
    }

    fn insert_deployment(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO service_deployments (tenant_id, event_seq, service_name, environment, event_id, event_type, artifact_id, status, event_ts_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT (tenant_id, event_seq) DO NOTHING",
                params![
                    record.tenant_id.get(),
                    record.event_seq,
                    record.service_name,
                    record.environment,
                    record.event_id,
                    record.event_type,
                    record.artifact_id,
                    record.status.as_str(),
                    record.event_ts_ms,
                ],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn deployment_history(
        &self,
        tenant: TenantId,
        service: &str,
        limit: u32,
    ) -> Result<Vec<DeploymentRecord>, StoreError> {
        self.collect(
            "SELECT tenant_id, service_name, environment, event_seq, event_id, event_type, artifact_id, status, event_ts_ms \
             FROM service_deployments WHERE tenant_id = ?1 AND service_name = ?2 \
             ORDER BY event_ts_ms DESC, event_seq DESC LIMIT ?3",
            params![tenant.get(), service, limit],
            map_deployment_row,
        )
    }

    fn upsert_change_link(&self, link: &ChangeLink) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO service_change_links (tenant_id, event_seq, service_name, chain_id, environment, artifact_id, pipeline_run_id, run_url, actor_name, status, event_ts_ms) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                 ON CONFLICT (tenant_id, event_seq) DO UPDATE SET \
                 service_name = excluded.service_name, \
                 chain_id = excluded.chain_id, \
                 environment = excluded.environment, \
                 artifact_id = excluded.artifact_id, \
                 pipeline_run_id = excluded.pipeline_run_id, \
                 run_url = excluded.run_url, \
                 actor_name = excluded.actor_name, \
                 status = excluded.status, \
                 event_ts_ms = excluded.event_ts_ms",
                params![
                    link.tenant_id.get(),
                    link.event_seq,
                    link.service_name,
                    link.chain_id,
                    link.environment,
                    link.artifact_id,
                    link.pipeline_run_id,
                    link.run_url,
                    link.actor_name,
                    link.status.as_str(),
                    link.event_ts_ms,
                ],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn change_links(
        &self,
        tenant: TenantId,
        service: &str,
        limit: u32,
    ) -> Result<Vec<ChangeLink>, StoreError> {
        self.collect(
            &format!(
                "SELECT {CHANGE_LINK_COLUMNS} FROM service_change_links WHERE tenant_id = ?1 AND service_name = ?2 \
                 ORDER BY event_ts_ms DESC, event_seq DESC LIMIT ?3"
            ),
            params![tenant.get(), service, limit],
            map_change_link_row,
        )
    }

    fn record_chain_change(
        &self,
        tenant: TenantId,
        chain_id: &str,
        ts_ms: i64,
    ) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO chain_markers (tenant_id, chain_id, first_change_ts_ms, incident_count) VALUES (?1, ?2, ?3, 0) \
                 ON CONFLICT (tenant_id, chain_id) DO UPDATE SET first_change_ts_ms = \
                 CASE WHEN first_change_ts_ms IS NULL OR excluded.first_change_ts_ms < first_change_ts_ms \
                 THEN excluded.first_change_ts_ms ELSE first_change_ts_ms END",
                params![tenant.get(), chain_id, ts_ms],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn record_chain_incident(&self, tenant: TenantId, chain_id: &str) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO chain_markers (tenant_id, chain_id, first_change_ts_ms, incident_count) VALUES (?1, ?2, NULL, 1) \
                 ON CONFLICT (tenant_id, chain_id) DO UPDATE SET incident_count = incident_count + 1",
                params![tenant.get(), chain_id],
            )
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn chain_marker(
        &self,
        tenant: TenantId,
        chain_id: &str,
    ) -> Result<Option<ChainMarker>, StoreError> {
        let mut markers = self.collect(
            "SELECT tenant_id, chain_id, first_change_ts_ms, incident_count FROM chain_markers \
             WHERE tenant_id = ?1 AND chain_id = ?2",
            params![tenant.get(), chain_id],
            |row| {
                let raw_tenant: i64 = row.get(0).map_err(StoreError::storage)?;
                Ok(ChainMarker {
                    tenant_id: tenant_id(raw_tenant)?,
                    chain_id: row.get(1).map_err(StoreError::storage)?,
                    first_change_ts_ms: row.get(2).map_err(StoreError::storage)?,
                    incident_count: row.get(3).map_err(StoreError::storage)?,
                })
            },
        )?;
        Ok(markers.pop())
    }

    fn incident_links(
        &self,
        tenant: TenantId,
        service: &str,
        limit: u32,
    ) -> Result<Vec<IncidentLink>, StoreError> {
        self.collect(
            "SELECT l.tenant_id, l.service_name, l.event_seq, l.event_ts_ms, l.chain_id, \
             l.environment, l.artifact_id, l.status, m.incident_count \
             FROM service_change_links l \
             JOIN chain_markers m ON m.tenant_id = l.tenant_id AND m.chain_id = l.chain_id \
             WHERE l.tenant_id = ?1 AND l.service_name = ?2 AND m.incident_count > 0 \
             ORDER BY l.event_ts_ms DESC, l.event_seq DESC LIMIT ?3",
            params![tenant.get(), service, limit],
            |row| {
                let raw_tenant: i64 = row.get(0).map_err(StoreError::storage)?;
                let status: String = row.get(7).map_err(StoreError::storage)?;
                Ok(IncidentLink {
                    tenant_id: tenant_id(raw_tenant)?,
                    service_name: row.get(1).map_err(StoreError::storage)?,
                    event_seq: row.get(2).map_err(StoreError::storage)?,
                    event_ts_ms: row.get(3).map_err(StoreError::storage)?,
                    chain_id: row.get(4).map_err(StoreError::storage)?,
                    environment: row.get(5).map_err(StoreError::storage)?,
                    artifact_id: row.get(6).map_err(StoreError::storage)?,
                    status: parse_status(&status)?,
                    incident_count: row.get(8).map_err(StoreError::storage)?,
                })
            },
        )
    }

    fn lead_time_samples(
        &self,
        tenant: TenantId,
        since_ms: i64,
    ) -> Result<Vec<LeadTimeSample>, StoreError> {
        self.collect(
            "SELECT l.service_name, l.event_ts_ms, m.first_change_ts_ms \
             FROM service_change_links l \
             JOIN chain_markers m ON m.tenant_id = l.tenant_id AND m.chain_id = l.chain_id \
             WHERE l.tenant_id = ?1 AND l.status = 'synced' AND l.event_ts_ms >= ?2 \
             AND m.first_change_ts_ms IS NOT NULL AND m.first_change_ts_ms <= l.event_ts_ms \
             ORDER BY l.event_ts_ms ASC, l.event_seq ASC",
            params![tenant.get(), since_ms],
            |row| {
                let service_name: String = row.get(0).map_err(StoreError::storage)?;
                let deployed_ms: i64 = row.get(1).map_err(StoreError::storage)?;
                let first_change_ms: i64 = row.get(2).map_err(StoreError::storage)?;
                let day = DateTime::from_timestamp_millis(deployed_ms).ok_or_else(|| {
                    StoreError::Corrupt {
                        message: format!("timestamp out of range: {deployed_ms}"),
                    }
                })?;
                Ok(LeadTimeSample {
                    service_name,
                    day_utc: day.date_naive().format(DAY_FORMAT).to_string(),
                    lead_seconds: (deployed_ms - first_change_ms) / 1000,
                })
            },
        )
    }

    fn clear(&self, tenant: Option<TenantId>) -> Result<(), StoreError> {
        for table in PROJECTION_TABLES {
            let result = match tenant {
                Some(tenant) => self.conn.execute(
                    &format!("DELETE FROM {table} WHERE tenant_id = ?1"),
                    [tenant.get()],
                ),
                None => self.conn.execute(&format!("DELETE FROM {table}"), []),
            };
            result.map_err(StoreError::storage)?;
        }
        Ok(())
    }

    fn row_counts(&self, tenant: Option<TenantId>) -> Result<RebuildStats, StoreError> {
        Ok(RebuildStats {
            events_replayed: 0,
            env_state_rows: self.count("service_env_state", tenant)?,
            current_state_rows: self.count("service_current_state", tenant)?,
            daily_stats_rows: self.count("service_delivery_stats_daily", tenant)?,
            deployment_rows: self.count("service_deployments", tenant)?,
            change_link_rows: self.count("service_change_links", tenant)?,
            chain_marker_rows: self.count("chain_markers", tenant)?,
        })
    }
}

fn parse_status(value: &str) -> Result<ServiceStatus, StoreError> {
    ServiceStatus::parse(value).ok_or_else(|| StoreError::Corrupt {
        message: format!("invalid service status: {value}"),
    })
}

fn map_env_state_row(row: &rusqlite::Row<'_>) -> Result<ServiceEnvState, StoreError> {
    let raw_tenant: i64 = row.get(0).map_err(StoreError::storage)?;
    let status: String = row.get(6).map_err(StoreError::storage)?;
    Ok(ServiceEnvState {
        tenant_id: tenant_id(raw_tenant)?,
        service_name: row.get(1).map_err(StoreError::storage)?,
        environment: row.get(2).map_err(StoreError::storage)?,
        latest_event_seq: row.get(3).map_err(StoreError::storage)?,
        latest_event_type: row.get(4).map_err(StoreError::storage)?,
        latest_event_ts_ms: row.get(5).map_err(StoreError::storage)?,
        latest_status: parse_status(&status)?,
        latest_artifact_id: row.get(7).map_err(StoreError::storage)?,
        failure_streak: row.get(8).map_err(StoreError::storage)?,
    })
}

fn map_current_state_row(row: &rusqlite::Row<'_>) -> Result<ServiceCurrentState, StoreError> {
    let raw_tenant: i64 = row.get(0).map_err(StoreError::storage)?;
    let status: String = row.get(5).map_err(StoreError::storage)?;
    Ok(ServiceCurrentState {
        tenant_id: tenant_id(raw_tenant)?,
        service_name: row.get(1).map_err(StoreError::storage)?,
        latest_event_seq: row.get(2).map_err(StoreError::storage)?,
        latest_event_type: row.get(3).map_err(StoreError::storage)?,
        latest_event_ts_ms: row.get(4).map_err(StoreError::storage)?,
        latest_status: parse_status(&status)?,
        latest_artifact_id: row.get(6).map_err(StoreError::storage)?,
        latest_environment: row.get(7).map_err(StoreError::storage)?,
        drift_count: row.get(8).map_err(StoreError::storage)?,
        failing_environments: row.get(9).map_err(StoreError::storage)?,
    })
}

fn map_deployment_row(row: &rusqlite::Row<'_>) -> Result<DeploymentRecord, StoreError> {
    let raw_tenant: i64 = row.get(0).map_err(StoreError::storage)?;
    let status: String = row.get(7).map_err(StoreError::storage)?;
    Ok(DeploymentRecord {
        tenant_id: tenant_id(raw_tenant)?,
        service_name: row.get(1).map_err(StoreError::storage)?,
        environment: row.get(2).map_err(StoreError::storage)?,
        event_seq: row.get(3).map_err(StoreError::storage)?,
        event_id: row.get(4).map_err(StoreError::storage)?,
        event_type: row.get(5).map_err(StoreError::storage)?,
        artifact_id: row.get(6).map_err(StoreError::storage)?,
        status: DeploymentStatus::parse(&status).ok_or_else(|| StoreError::Corrupt {
            message: format!("invalid deployment status: {status}"),
        })?,
        event_ts_ms: row.get(8).map_err(StoreError::storage)?,
    })
}

fn map_change_link_row(row: &rusqlite::Row<'_>) -> Result<ChangeLink, StoreError> {
    let raw_tenant: i64 = row.get(0).map_err(StoreError::storage)?;
    let status: String = row.get(10).map_err(StoreError::storage)?;
    Ok(ChangeLink {
        tenant_id: tenant_id(raw_tenant)?,
        service_name: row.get(1).map_err(StoreError::storage)?,
        event_seq: row.get(2).map_err(StoreError::storage)?,
        event_ts_ms: row.get(3).map_err(StoreError::storage)?,
        chain_id: row.get(4).map_err(StoreError::storage)?,
        environment: row.get(5).map_err(StoreError::storage)?,
        artifact_id: row.get(6).map_err(StoreError::storage)?,
        pipeline_run_id: row.get(7).map_err(StoreError::storage)?,
        run_url: row.get(8).map_err(StoreError::storage)?,
        actor_name: row.get(9).map_err(StoreError::storage)?,
        status: parse_status(&status)?,
    })
}
