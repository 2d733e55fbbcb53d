// crates/runforge-server/src/sse.rs
// ============================================================================
// Module: Runforge SSE Stream
// Description: Builds the replay-then-live event stream for
//              `GET /runs/{id}/events/stream`.
// Purpose: Give the route handler one `Stream<Item = sse::Event>` that
//          unregisters its listener on drop (pipe closure).
// Dependencies: runforge-registry::{RunRegistry, ListenerId}, tokio-stream
// ============================================================================

//! ## Overview
//! Per spec.md §4.7: the server sends `event: status\ndata: <json>\n\n`
//! frames, replaying stored history first and then live events; a 30 s
//! keep-alive comment holds idle connections open. Client pipe closure
//! unregisters the listener and terminates the loop — here, that's `Drop`
//! on [`EventListenerStream`] rather than an explicit check, since axum
//! stops polling a response stream once the client disconnects.

use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use runforge_core::Event;
use runforge_core::RunId;
use runforge_registry::ListenerId;
use runforge_registry::RunRegistry;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tokio_stream::StreamExt;

/// Wraps a live listener channel, unregistering it from the registry when
/// the stream (and therefore the SSE response body) is dropped.
pub struct EventListenerStream {
    inner: UnboundedReceiverStream<Event>,
    registry: std::sync::Arc<RunRegistry>,
    run_id: RunId,
    listener_id: ListenerId,
}

impl Stream for EventListenerStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl Drop for EventListenerStream {
    fn drop(&mut self) {
        self.registry.unregister_listener(&self.run_id, self.listener_id);
    }
}

/// Builds the replay-then-live stream of [`Event`]s for `run_id`: every
/// currently-stored event, then every event appended after this call
/// registers its listener.
///
/// # Errors
/// Returns [`runforge_core::CoreError::NotFound`] if `run_id` is unknown.
pub fn event_stream(
    registry: std::sync::Arc<RunRegistry>,
    run_id: RunId,
) -> Result<impl Stream<Item = Event>, runforge_core::CoreError> {
    let history = registry.get_run_events(&run_id)?;
    let (listener_id, receiver) = registry.register_listener(run_id.clone());
    let live = EventListenerStream {
        inner: UnboundedReceiverStream::new(receiver),
        registry,
        run_id,
        listener_id,
    };
    Ok(tokio_stream::iter(history).chain(live))
}

/// Renders one domain [`Event`] as an SSE frame per spec.md §4.7: the SSE
/// event name is always `"status"`; the JSON payload carries the domain
/// event's own `event` field and the rest of its data.
#[must_use]
pub fn to_sse_event(event: &Event) -> axum::response::sse::Event {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    axum::response::sse::Event::default().event("status").data(data)
}
