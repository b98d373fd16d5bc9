use crate::middleware::request_id::RequestId;
use crate::routes::error::{ErrorEnvelope, respond};
use crate::{AppState, authorize};
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use chrono::Utc;
use dw_core::error::DeliveryError;
use dw_core::types::{
    ChangeFailureRate, ChangeLink, DeliveryStats, DeploymentRecord, IncidentLink,
    ServiceCurrentState, ServiceEnvState,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct LimitQuery {
    limit: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct DaysQuery {
    days: Option<u32>,
}

/// Environment state plus the service-wide drift count.
#[derive(Debug, Serialize, ToSchema)]
pub struct EnvStateView {
    #[serde(flatten)]
    pub state: ServiceEnvState,
    pub drift_count: i64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/services/{service}/state", get(current_state))
        .route("/services/{service}/environments", get(environments))
        .route("/services/{service}/environments/{env}", get(env_state))
        .route("/services/{service}/history", get(history))
        .route("/services/{service}/stats", get(stats))
        .route("/services/{service}/changes", get(changes))
        .route("/services/{service}/incidents", get(incidents))
        .route(
            "/services/{service}/change-failure-rate",
            get(change_failure_rate),
        )
        .with_state(state)
}

fn not_found(what: String) -> DeliveryError {
    DeliveryError::NotFound { what }
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/state",
    params(("service" = String, Path, description = "Service name")),
    responses(
        (status = 200, body = ServiceCurrentState),
        (status = 401, body = ErrorEnvelope),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn current_state(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(service): Path<String>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .projections()
            .current_state(tenant.id, &service)?
            .ok_or_else(|| not_found(format!("service {service}")))
    });
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/environments",
    params(("service" = String, Path, description = "Service name")),
    responses(
        (status = 200, body = Vec<ServiceEnvState>),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn environments(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(service): Path<String>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers)
        .and_then(|(delivery, tenant)| delivery.projections().environments(tenant.id, &service));
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/environments/{env}",
    params(
        ("service" = String, Path, description = "Service name"),
        ("env" = String, Path, description = "Environment id")
    ),
    responses(
        (status = 200, body = EnvStateView),
        (status = 401, body = ErrorEnvelope),
        (status = 404, body = ErrorEnvelope)
    )
)]
pub(crate) async fn env_state(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path((service, env)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        let (state, drift_count) = delivery
            .projections()
            .env_state(tenant.id, &service, &env)?
            .ok_or_else(|| not_found(format!("service {service} in {env}")))?;
        Ok(EnvStateView { state, drift_count })
    });
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/history",
    params(("service" = String, Path, description = "Service name"), LimitQuery),
    responses(
        (status = 200, body = Vec<DeploymentRecord>),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn history(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(service): Path<String>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .projections()
            .deployment_history(tenant.id, &service, query.limit)
    });
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/stats",
    params(("service" = String, Path, description = "Service name"), DaysQuery),
    responses(
        (status = 200, body = DeliveryStats),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn stats(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(service): Path<String>,
    Query(query): Query<DaysQuery>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .projections()
            .delivery_stats(tenant.id, &service, query.days, Utc::now())
    });
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/changes",
    params(("service" = String, Path, description = "Service name"), LimitQuery),
    responses(
        (status = 200, body = Vec<ChangeLink>),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn changes(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(service): Path<String>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .projections()
            .change_links(tenant.id, &service, query.limit)
    });
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/incidents",
    params(("service" = String, Path, description = "Service name"), LimitQuery),
    responses(
        (status = 200, body = Vec<IncidentLink>),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn incidents(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(service): Path<String>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .projections()
            .incident_links(tenant.id, &service, query.limit)
    });
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/services/{service}/change-failure-rate",
    params(("service" = String, Path, description = "Service name"), DaysQuery),
    responses(
        (status = 200, body = ChangeFailureRate),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn change_failure_rate(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Path(service): Path<String>,
    Query(query): Query<DaysQuery>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .projections()
            .change_failure_rate(tenant.id, &service, query.days, Utc::now())
    });
    respond(result, request_id)
}
