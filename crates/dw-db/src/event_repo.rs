use crate::util::{decode_json, encode_json, from_rfc3339, to_rfc3339};
use chrono::{SubsecRound, Utc};
use dw_core::error::StoreError;
use dw_core::events::EventRepository;
use dw_core::types::TenantId;
use dw_events::types::{EventRecord, StoredEvent};
use rusqlite::{Connection, params};

const EVENT_COLUMNS: &str = "seq, received_at, tenant_id, event_id, event_type, source, \
     event_timestamp, event_ts_ms, subject_id, subject_type, subject_source, chain_id, raw_json";

pub struct EventRepo<'a> {
    pub conn: &'a Connection,
}

impl<'a> EventRepo<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl EventRepository for EventRepo<'_> {
    fn append(&self, record: &EventRecord) -> Result<Option<StoredEvent>, StoreError> {
        let received_at = Utc::now().trunc_subsecs(3);
        let sql = "INSERT INTO events (tenant_id, event_id, event_type, source, event_timestamp, event_ts_ms, subject_id, subject_type, subject_source, chain_id, raw_json, received_at) \
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
                   ON CONFLICT (tenant_id, event_id) DO NOTHING RETURNING seq";
        let mut stmt = self.conn.prepare(sql).map_err(StoreError::storage)?;
        let mut rows = stmt
            .query(params![
                record.tenant_id,
                record.event_id,
                record.event_type,
                record.source,
                record.timestamp_rfc3339(),
                record.event_ts_ms,
                record.subject_id,
                record.subject_type,
                record.subject_source,
                record.chain_id,
                encode_json(&record.raw_payload)?,
                to_rfc3339(&received_at),
            ])
            .map_err(StoreError::storage)?;
        let Some(row) = rows.next().map_err(StoreError::storage)? else {
            return Ok(None);
        };
        let seq: i64 = row.get(0).map_err(StoreError::storage)?;
        Ok(Some(StoredEvent {
            seq,
            received_at,
            record: record.clone(),
        }))
    }

    fn list(
        &self,
        tenant_id: TenantId,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = ?1 AND seq > ?2 ORDER BY seq ASC LIMIT ?3"
        );
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, i64::from);
        query_events(
            self.conn,
            &sql,
            params![tenant_id.get(), after.unwrap_or(0), limit],
        )
    }

    fn count(&self, tenant_id: TenantId) -> Result<i64, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM events WHERE tenant_id = ?1",
                [tenant_id.get()],
                |row| row.get(0),
            )
            .map_err(StoreError::storage)
    }

    fn replay_order(&self, tenant_id: Option<TenantId>) -> Result<Vec<StoredEvent>, StoreError> {
        match tenant_id {
            Some(tenant_id) => query_events(
                self.conn,
                &format!(
                    "SELECT {EVENT_COLUMNS} FROM events WHERE tenant_id = ?1 ORDER BY event_ts_ms ASC, seq ASC"
                ),
                params![tenant_id.get()],
            ),
            None => query_events(
                self.conn,
                &format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY event_ts_ms ASC, seq ASC"),
                params![],
            ),
        }
    }
}

fn query_events(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<StoredEvent>, StoreError> {
    let mut stmt = conn.prepare(sql).map_err(StoreError::storage)?;
    let mut rows = stmt.query(params).map_err(StoreError::storage)?;
    let mut events = Vec::new();
    while let Some(row) = rows.next().map_err(StoreError::storage)? {
        events.push(map_event_row(row)?);
    }
    Ok(events)
}

fn map_event_row(row: &rusqlite::Row<'_>) -> Result<StoredEvent, StoreError> {
    let seq: i64 = row.get(0).map_err(StoreError::storage)?;
    let received_at: String = row.get(1).map_err(StoreError::storage)?;
    let timestamp: String = row.get(6).map_err(StoreError::storage)?;
    let raw_json: String = row.get(12).map_err(StoreError::storage)?;

    Ok(StoredEvent {
        seq,
        received_at: from_rfc3339(&received_at)?,
        record: EventRecord {
            tenant_id: row.get(2).map_err(StoreError::storage)?,
            event_id: row.get(3).map_err(StoreError::storage)?,
            event_type: row.get(4).map_err(StoreError::storage)?,
            source: row.get(5).map_err(StoreError::storage)?,
            timestamp: from_rfc3339(&timestamp)?,
            event_ts_ms: row.get(7).map_err(StoreError::storage)?,
            subject_id: row.get(8).map_err(StoreError::storage)?,
            subject_type: row.get(9).map_err(StoreError::storage)?,
            subject_source: row.get(10).map_err(StoreError::storage)?,
            chain_id: row.get(11).map_err(StoreError::storage)?,
            raw_payload: decode_json(&raw_json)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::with_test_db;
    use crate::tenant_repo::TenantRepo;
    use chrono::TimeZone;
    use dw_core::tenants::TenantRepository;
    use dw_core::types::NewTenant;
    use serde_json::json;

    fn seed_tenants(conn: &Connection) {
        let repo = TenantRepo::new(conn);
        for name in ["acme", "globex"] {
            repo.create(&NewTenant {
                name: name.to_string(),
                auth_token: format!("tok-{name}"),
                webhook_secret: "secret".to_string(),
                enabled: true,
            })
            .unwrap();
        }
    }

    fn record(tenant_id: i64, event_id: &str, minute: u32) -> EventRecord {
        let timestamp = Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap();
        EventRecord {
            tenant_id,
            event_id: event_id.to_string(),
            event_type: "dev.cdevents.service.deployed.0.3.0".to_string(),
            source: "ci".to_string(),
            timestamp,
            event_ts_ms: timestamp.timestamp_millis(),
            subject_id: "orders".to_string(),
            subject_type: "service".to_string(),
            subject_source: None,
            chain_id: Some("chain-1".to_string()),
            raw_payload: json!({ "context": { "id": event_id } }),
        }
    }

    #[test]
    fn test_append_is_idempotent_per_tenant() {
        let conn = with_test_db().unwrap();
        seed_tenants(&conn);
        let repo = EventRepo::new(&conn);

        let first = repo.append(&record(1, "evt-1", 0)).unwrap().unwrap();
        assert!(repo.append(&record(1, "evt-1", 5)).unwrap().is_none());
        // Same event id under another tenant is a different event.
        let other = repo.append(&record(2, "evt-1", 0)).unwrap().unwrap();
        assert!(other.seq > first.seq);

        let acme = TenantId::new(1).unwrap();
        assert_eq!(repo.count(acme).unwrap(), 1);
        let stored = repo.list(acme, None, None).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record, record(1, "evt-1", 0));
    }

    #[test]
    fn test_list_after_and_limit() {
        let conn = with_test_db().unwrap();
        seed_tenants(&conn);
        let repo = EventRepo::new(&conn);
        for idx in 0..5 {
            repo.append(&record(1, &format!("evt-{idx}"), idx)).unwrap();
        }
        let acme = TenantId::new(1).unwrap();
        let page = repo.list(acme, Some(2), Some(2)).unwrap();
        let seqs: Vec<i64> = page.iter().map(|event| event.seq).collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn test_replay_order_uses_event_time() {
        let conn = with_test_db().unwrap();
        seed_tenants(&conn);
        let repo = EventRepo::new(&conn);
        repo.append(&record(1, "late", 30)).unwrap();
        repo.append(&record(1, "early", 10)).unwrap();
        repo.append(&record(2, "other", 20)).unwrap();

        let acme = TenantId::new(1).unwrap();
        let ids: Vec<String> = repo
            .replay_order(Some(acme))
            .unwrap()
            .into_iter()
            .map(|event| event.record.event_id)
            .collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(repo.replay_order(None).unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_tenant_rejected_by_foreign_key() {
        let conn = with_test_db().unwrap();
        let repo = EventRepo::new(&conn);
        let err = repo.append(&record(9, "evt-1", 0)).unwrap_err();
        assert!(matches!(err, StoreError::Storage { .. }));
    }
}
