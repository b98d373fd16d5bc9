use crate::middleware::request_id::RequestId;
use crate::routes::error::{ErrorEnvelope, respond};
use crate::{AppState, authorize};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use chrono::Utc;
use dw_core::types::LeadTimeReport;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct LeadTimeQuery {
    days: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics/lead-time", get(lead_time))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/metrics/lead-time",
    params(LeadTimeQuery),
    responses(
        (status = 200, body = LeadTimeReport),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn lead_time(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<LeadTimeQuery>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .projections()
            .lead_time_report(tenant.id, query.days, Utc::now())
    });
    respond(result, request_id)
}
