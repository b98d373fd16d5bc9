pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod sse;

use axum::Router;
use axum::http::{HeaderMap, header};
use dw_core::auth;
use dw_core::config::Config;
use dw_core::error::{DeliveryError, StoreError};
use dw_core::ingest::IngestGate;
use dw_core::store::StoreFactory;
use dw_core::types::Tenant;
use dw_core::{BatchConfig, Delivery};
use dw_db::{DbStore, DbStoreFactory};
use dw_events::bus::EventBus;
use dw_events::envelope::RequestHeaders;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TENANT_HEADER: &str = "x-tenant-id";
const EVENT_BUS_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub factory: DbStoreFactory,
    pub event_bus: EventBus,
    pub gate: Arc<IngestGate<DbStoreFactory>>,
    pub ingestor_token: Option<Arc<str>>,
    pub max_body_bytes: usize,
}

impl AppState {
    /// Wires the ingestion gate (and its batch consumer) for `factory`. Must
    /// be called inside a tokio runtime when batching is enabled.
    pub fn new(factory: DbStoreFactory, config: &Config) -> Self {
        Self::with_batch(factory, config, config.batch())
    }

    pub fn with_batch(factory: DbStoreFactory, config: &Config, batch: BatchConfig) -> Self {
        let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
        let max_body_bytes = config.max_body_bytes();
        let gate = IngestGate::new(factory.clone(), event_bus.clone(), batch, max_body_bytes);
        Self {
            factory,
            event_bus,
            gate: Arc::new(gate),
            ingestor_token: config.ingestor_token.as_deref().map(Arc::from),
            max_body_bytes,
        }
    }
}

pub fn build_delivery(state: &AppState) -> Result<Delivery<DbStore>, StoreError> {
    let store = state.factory.open()?;
    Ok(Delivery::new(store, state.event_bus.clone()))
}

/// Opens a store and resolves the bearer token to an enabled tenant.
pub fn authorize(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(Delivery<DbStore>, Tenant), DeliveryError> {
    let delivery = build_delivery(state)?;
    let authorization = header_str(headers, header::AUTHORIZATION.as_str());
    let tenant = auth::authenticate(delivery.store(), authorization)?;
    Ok((delivery, tenant))
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

pub fn request_headers(headers: &HeaderMap) -> RequestHeaders {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
        .collect()
}

pub fn app(state: AppState) -> Router {
    routes::router(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}
