pub mod error;
pub mod events;
pub mod metrics;
pub mod services;
pub mod webhooks;

use crate::middleware::request_id::request_id_middleware;
use crate::{AppState, openapi};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    let api = Router::new()
        .merge(webhooks::router(state.clone()))
        .merge(services::router(state.clone()))
        .merge(metrics::router(state.clone()))
        .merge(events::router(state))
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .route_layer(middleware::from_fn(request_id_middleware));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
}
