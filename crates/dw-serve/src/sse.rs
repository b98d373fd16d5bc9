use crate::{AppState, authorize};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use dw_core::error::DeliveryError;
use dw_events::types::StoredEvent;
use futures::stream::{self, StreamExt};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;

/// Streams the tenant's stored events after `after`, then live appends.
/// The live receiver is taken before history is read so nothing committed in
/// between is missed; overlap is dropped by sequence number.
pub fn subscribe(
    state: &AppState,
    headers: &HeaderMap,
    after: Option<i64>,
) -> Result<Response, DeliveryError> {
    let (delivery, tenant) = authorize(state, headers)?;
    let receiver = state.event_bus.subscribe();
    let history = delivery.events().list(tenant.id, after, None)?;
    let last_seq = history
        .last()
        .map_or(after.unwrap_or(0), |event| event.seq);
    let tenant_id = tenant.id.get();

    let history_stream = stream::iter(history.into_iter().map(to_event));
    let live_stream = BroadcastStream::new(receiver).filter_map(move |item| async move {
        match item {
            Ok(event) if event.record.tenant_id == tenant_id && event.seq > last_seq => {
                Some(to_event(event))
            }
            _ => None,
        }
    });

    Ok(Sse::new(history_stream.chain(live_stream))
        .keep_alive(KeepAlive::default())
        .into_response())
}

fn to_event(event: StoredEvent) -> Result<Event, Infallible> {
    let json = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default()
        .event("event")
        .id(event.seq.to_string())
        .data(json))
}
