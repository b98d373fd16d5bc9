use crate::middleware::request_id::RequestId;
use crate::routes::error::{ErrorEnvelope, map_error, respond};
use crate::{AppState, authorize};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Router};
use dw_events::types::StoredEvent;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct EventsQuery {
    after: Option<i64>,
    limit: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/subscribe", get(subscribe))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/events",
    params(EventsQuery),
    responses(
        (status = 200, body = Vec<StoredEvent>),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn list_events(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Response {
    let result = authorize(&state, &headers).and_then(|(delivery, tenant)| {
        delivery
            .events()
            .list(tenant.id, query.after, query.limit)
    });
    respond(result, request_id)
}

#[utoipa::path(
    get,
    path = "/api/events/subscribe",
    params(EventsQuery),
    responses(
        (status = 200, description = "Server-sent stream of the tenant's events"),
        (status = 401, body = ErrorEnvelope)
    )
)]
pub(crate) async fn subscribe(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Response {
    match crate::sse::subscribe(&state, &headers, query.after) {
        Ok(response) => response,
        Err(err) => map_error(&err, Some(request_id)),
    }
}
