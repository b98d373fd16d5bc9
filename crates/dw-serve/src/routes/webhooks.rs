use crate::middleware::request_id::RequestId;
use crate::routes::error::{ErrorEnvelope, map_error};
use crate::{AppState, SIGNATURE_HEADER, TENANT_HEADER, header_str, request_headers};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use dw_core::auth;
use dw_core::error::{DeliveryError, IngestError};
use dw_core::ingest::{IngestCommand, IngestReceipt};
use dw_core::types::TenantId;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/cdevents", post(receive_cdevent))
        .route("/webhooks/relay", post(receive_relay))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/webhooks/cdevents",
    request_body(content = String, content_type = "application/json"),
    params(
        ("Authorization" = String, Header, description = "Bearer token of the tenant"),
        ("X-Webhook-Signature" = String, Header, description = "Hex HMAC-SHA256 of the raw body")
    ),
    responses(
        (status = 202, body = IngestReceipt),
        (status = 400, body = ErrorEnvelope),
        (status = 401, body = ErrorEnvelope),
        (status = 422, body = ErrorEnvelope),
        (status = 503, body = ErrorEnvelope)
    )
)]
pub(crate) async fn receive_cdevent(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let command = IngestCommand {
        authorization: header_str(&headers, header::AUTHORIZATION.as_str()).map(str::to_string),
        signature: header_str(&headers, SIGNATURE_HEADER).map(str::to_string),
        headers: request_headers(&headers),
        body: body.to_vec(),
    };
    match state.gate.ingest(command).await {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => map_error(&err.into(), Some(request_id)),
    }
}

#[utoipa::path(
    post,
    path = "/api/webhooks/relay",
    request_body(content = String, content_type = "application/json"),
    params(
        ("Authorization" = String, Header, description = "Bearer ingestor token"),
        ("X-Tenant-Id" = i64, Header, description = "Tenant the event belongs to")
    ),
    responses(
        (status = 202, body = IngestReceipt),
        (status = 400, body = ErrorEnvelope),
        (status = 401, body = ErrorEnvelope),
        (status = 503, body = ErrorEnvelope)
    )
)]
pub(crate) async fn receive_relay(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let tenant_id = match relay_tenant(&state, &headers) {
        Ok(tenant_id) => tenant_id,
        Err(err) => return map_error(&err, Some(request_id)),
    };
    match state
        .gate
        .ingest_for_tenant(tenant_id.get(), &request_headers(&headers), &body)
        .await
    {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => map_error(&err.into(), Some(request_id)),
    }
}

fn relay_tenant(state: &AppState, headers: &HeaderMap) -> Result<TenantId, DeliveryError> {
    let Some(expected) = state.ingestor_token.as_deref() else {
        return Err(DeliveryError::Unavailable {
            message: "relay ingestion is not configured".to_string(),
        });
    };
    let supplied = auth::bearer_token(header_str(headers, header::AUTHORIZATION.as_str()))?;
    if !auth::constant_time_eq(expected, supplied) {
        return Err(IngestError::InvalidAuth.into());
    }
    header_str(headers, TENANT_HEADER)
        .unwrap_or_default()
        .parse::<TenantId>()
        .map_err(|err| DeliveryError::InvalidInput {
            message: err.to_string(),
        })
}
