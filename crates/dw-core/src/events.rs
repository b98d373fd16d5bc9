use crate::error::StoreError;
use crate::types::TenantId;
use dw_events::types::{EventRecord, StoredEvent};

pub trait EventRepository {
    /// Inserts the event unless `(tenant_id, event_id)` already exists.
    /// Returns `None` for a duplicate.
    fn append(&self, record: &EventRecord) -> Result<Option<StoredEvent>, StoreError>;
    fn list(
        &self,
        tenant_id: TenantId,
        after: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<StoredEvent>, StoreError>;
    fn count(&self, tenant_id: TenantId) -> Result<i64, StoreError>;
    /// All events of one tenant (or every tenant) ordered by
    /// `(event_ts_ms, seq)`.
    fn replay_order(&self, tenant_id: Option<TenantId>) -> Result<Vec<StoredEvent>, StoreError>;
}
