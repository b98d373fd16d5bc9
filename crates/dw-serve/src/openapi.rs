use utoipa::OpenApi;

use crate::routes::error::ErrorEnvelope;
use crate::routes::events::EventsQuery;
use crate::routes::metrics::LeadTimeQuery;
use crate::routes::services::{DaysQuery, EnvStateView, LimitQuery};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use dw_core::ingest::IngestReceipt;
use dw_core::types::report::{LeadTimeByDay, LeadTimeByService};
use dw_core::types::{
    ChangeFailureRate, ChangeLink, DeliveryStats, DeploymentRecord, DeploymentStatus, IncidentLink,
    LeadTimeReport, LeadTimeSummary, ServiceCurrentState, ServiceEnvState, ServiceStatus, TenantId,
};
use dw_events::types::{EventRecord, StoredEvent};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::webhooks::receive_cdevent,
        crate::routes::webhooks::receive_relay,
        crate::routes::services::current_state,
        crate::routes::services::environments,
        crate::routes::services::env_state,
        crate::routes::services::history,
        crate::routes::services::stats,
        crate::routes::services::changes,
        crate::routes::services::incidents,
        crate::routes::services::change_failure_rate,
        crate::routes::metrics::lead_time,
        crate::routes::events::list_events,
        crate::routes::events::subscribe,
    ),
    components(schemas(
        ErrorEnvelope,
        IngestReceipt,
        TenantId,
        ServiceStatus,
        DeploymentStatus,
        ServiceEnvState,
        EnvStateView,
        ServiceCurrentState,
        DeploymentRecord,
        DeliveryStats,
        ChangeLink,
        IncidentLink,
        ChangeFailureRate,
        LeadTimeReport,
        LeadTimeSummary,
        LeadTimeByService,
        LeadTimeByDay,
        EventRecord,
        StoredEvent,
        EventsQuery,
        LimitQuery,
        DaysQuery,
        LeadTimeQuery,
    )),
    info(title = "deliverywatch", description = "Delivery event ingestion and projections")
)]
pub struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
