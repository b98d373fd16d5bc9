use crate::auth;
use crate::batcher::{BatchSink, BatcherStats, IngestBatcher, StoreSink};
use crate::config::BatchConfig;
use crate::error::IngestError;
use crate::store::{Store, StoreFactory};
use crate::tenants::TenantRepository;
use crate::types::TenantId;
use dw_events::bus::EventBus;
use dw_events::envelope::RequestHeaders;
use dw_events::normalize;
use dw_events::types::EventRecord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::ToSchema;

/// One self-service webhook delivery as seen by the transport.
#[derive(Debug, Clone, Default)]
pub struct IngestCommand {
    pub authorization: Option<String>,
    pub signature: Option<String>,
    pub headers: RequestHeaders,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngestReceipt {
    pub tenant_id: i64,
    pub event_id: String,
    pub event_type: String,
}

impl From<&EventRecord> for IngestReceipt {
    fn from(record: &EventRecord) -> Self {
        Self {
            tenant_id: record.tenant_id,
            event_id: record.event_id.clone(),
            event_type: record.event_type.clone(),
        }
    }
}

pub struct IngestGate<F: StoreFactory> {
    factory: F,
    sink: Arc<dyn BatchSink>,
    batcher: Option<IngestBatcher>,
    max_body_bytes: usize,
}

impl<F: StoreFactory> IngestGate<F> {
    /// Builds a gate writing to the store. With batching enabled this spawns
    /// the batch consumer, so it must run inside a tokio runtime.
    pub fn new(factory: F, event_bus: EventBus, batch: BatchConfig, max_body_bytes: usize) -> Self {
        let sink: Arc<dyn BatchSink> = Arc::new(StoreSink::new(factory.clone(), event_bus));
        let batcher = batch
            .enabled
            .then(|| IngestBatcher::start(Arc::clone(&sink), batch));
        Self::with_sink(factory, sink, batcher, max_body_bytes)
    }

    pub fn with_sink(
        factory: F,
        sink: Arc<dyn BatchSink>,
        batcher: Option<IngestBatcher>,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            factory,
            sink,
            batcher,
            max_body_bytes,
        }
    }

    pub fn batcher_stats(&self) -> Option<BatcherStats> {
        self.batcher.as_ref().map(IngestBatcher::stats)
    }

    /// Authenticates, verifies, normalizes and appends one delivery.
    pub async fn ingest(&self, command: IngestCommand) -> Result<IngestReceipt, IngestError> {
        let record = self.admit(&command).inspect_err(|err| {
            if !matches!(err, IngestError::InvalidSignature) {
                debug!(code = err.kind().code(), error = %err, "webhook rejected");
            }
        })?;
        self.append(record).await
    }

    /// Relay path: the tenant was resolved upstream, so bearer and signature
    /// checks are skipped.
    pub async fn ingest_for_tenant(
        &self,
        tenant_id: i64,
        headers: &RequestHeaders,
        body: &[u8],
    ) -> Result<IngestReceipt, IngestError> {
        let record = self
            .admit_for_tenant(tenant_id, headers, body)
            .inspect_err(|err| {
                debug!(tenant_id, code = err.kind().code(), error = %err, "relay event rejected");
            })?;
        self.append(record).await
    }

    fn admit(&self, command: &IngestCommand) -> Result<EventRecord, IngestError> {
        let store = self.factory.open()?;
        let tenant = auth::authenticate(&store, command.authorization.as_deref())?;
        self.check_size(&command.body)?;
        if !auth::verify_signature(
            &command.body,
            &tenant.webhook_secret,
            command.signature.as_deref(),
        ) {
            warn!(tenant_id = %tenant.id, "webhook signature mismatch");
            return Err(IngestError::InvalidSignature);
        }
        let event = normalize(&command.headers, &command.body)?;
        Ok(event.into_record(tenant.id.get()))
    }

    fn admit_for_tenant(
        &self,
        tenant_id: i64,
        headers: &RequestHeaders,
        body: &[u8],
    ) -> Result<EventRecord, IngestError> {
        let tenant_id = TenantId::new(tenant_id).map_err(|_| IngestError::InvalidAuth)?;
        let store = self.factory.open()?;
        match store.tenants().get(tenant_id)? {
            Some(tenant) if tenant.enabled => {}
            _ => return Err(IngestError::InvalidAuth),
        }
        self.check_size(body)?;
        let event = normalize(headers, body)?;
        Ok(event.into_record(tenant_id.get()))
    }

    fn check_size(&self, body: &[u8]) -> Result<(), IngestError> {
        if body.len() > self.max_body_bytes {
            return Err(IngestError::InvalidPayload {
                message: format!("body exceeds {} bytes", self.max_body_bytes),
            });
        }
        Ok(())
    }

    async fn append(&self, record: EventRecord) -> Result<IngestReceipt, IngestError> {
        let receipt = IngestReceipt::from(&record);
        match &self.batcher {
            Some(batcher) => batcher.submit(record).await?,
            None => {
                let sink = Arc::clone(&self.sink);
                tokio::task::spawn_blocking(move || sink.write_batch(std::slice::from_ref(&record)))
                    .await
                    .map_err(|err| IngestError::Internal {
                        message: format!("event writer failed: {err}"),
                    })??;
            }
        }
        debug!(
            tenant_id = receipt.tenant_id,
            event_id = %receipt.event_id,
            event_type = %receipt.event_type,
            "event accepted"
        );
        Ok(receipt)
    }
}
