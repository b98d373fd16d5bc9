use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use dw_core::error::{DeliveryError, IngestError, IngestErrorKind, TenantError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorEnvelope {
    pub code: &'static str,
    pub message: String,
    pub request_id: Option<String>,
}

pub fn map_error(err: &DeliveryError, request_id: Option<String>) -> Response {
    let (status, code, message) = match err {
        DeliveryError::Ingest(ingest) => map_ingest_error(ingest),
        DeliveryError::Tenant(tenant) => map_tenant_error(tenant),
        DeliveryError::Store(_) | DeliveryError::Internal { .. } => internal(err),
        DeliveryError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        DeliveryError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        DeliveryError::Unavailable { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            "unavailable",
            err.to_string(),
        ),
    };

    let mut response = (
        status,
        Json(ErrorEnvelope {
            code,
            message,
            request_id,
        }),
    )
        .into_response();
    if matches!(err, DeliveryError::Ingest(ingest) if ingest.is_retryable()) {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    }
    response
}

pub fn respond<T: Serialize>(result: Result<T, DeliveryError>, request_id: String) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(err) => map_error(&err, Some(request_id)),
    }
}

fn map_ingest_error(err: &IngestError) -> (StatusCode, &'static str, String) {
    let kind = err.kind();
    let status = match kind {
        IngestErrorKind::MissingAuth
        | IngestErrorKind::InvalidAuth
        | IngestErrorKind::InvalidSignature => StatusCode::UNAUTHORIZED,
        IngestErrorKind::InvalidPayload | IngestErrorKind::InvalidSchema => {
            StatusCode::BAD_REQUEST
        }
        IngestErrorKind::UnsupportedType => StatusCode::UNPROCESSABLE_ENTITY,
        IngestErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
        IngestErrorKind::Internal => return internal(err),
    };
    (status, kind.code(), err.to_string())
}

fn map_tenant_error(err: &TenantError) -> (StatusCode, &'static str, String) {
    match err {
        TenantError::NotFound => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        TenantError::TokenConflict => (StatusCode::CONFLICT, "conflict", err.to_string()),
        TenantError::InvalidInput { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_input", err.to_string())
        }
        TenantError::Store(_) => internal(err),
    }
}

// Storage details stay in the log, not the response.
fn internal(err: &dyn std::error::Error) -> (StatusCode, &'static str, String) {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "internal error".to_string(),
    )
}
