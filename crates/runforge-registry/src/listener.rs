// crates/runforge-registry/src/listener.rs
// ============================================================================
// Module: Runforge Listener Fan-out
// Description: Per-run subscriber set used to drive the SSE boundary.
// Purpose: Decouple event persistence from delivery so one slow SSE
//          consumer cannot stall the registry.
// Dependencies: runforge-core::{Event, ids::RunId}, tokio::sync::mpsc
// ============================================================================

//! ## Overview
//! Per spec.md §9's design note, listeners are not direct callbacks invoked
//! on the appending thread; each subscriber gets its own unbounded channel,
//! and notification is "send into every channel for this run id, dropping
//! ones whose receiver has gone away". The SSE handler owns draining its
//! channel; a slow or stalled client only backs up its own queue.

use std::collections::HashMap;
use std::sync::Mutex;

use runforge_core::Event;
use runforge_core::RunId;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;

/// Opaque handle identifying one registered listener within a run's subscriber set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Per-run listener fan-out, guarded by a single lock.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: Mutex<u64>,
    subscribers: Mutex<HashMap<RunId, Vec<(ListenerId, UnboundedSender<Event>)>>>,
}

impl ListenerRegistry {
    /// Creates an empty listener registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new listener for `run_id`, returning its handle and the
    /// receiving end of its event channel.
    pub fn register(&self, run_id: RunId) -> (ListenerId, UnboundedReceiver<Event>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let id = {
            let mut next_id = self.next_id.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let id = ListenerId(*next_id);
            *next_id += 1;
            id
        };
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        subscribers.entry(run_id).or_default().push((id, tx));
        (id, rx)
    }

    /// Removes a previously registered listener.
    pub fn unregister(&self, run_id: &RunId, id: ListenerId) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entries) = subscribers.get_mut(run_id) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                subscribers.remove(run_id);
            }
        }
    }

    /// Sends `event` to every listener registered for its run id.
    /// Listeners whose receiver has already been dropped are pruned;
    /// delivery failures are otherwise swallowed (best-effort per spec).
    pub fn notify(&self, event: &Event) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(entries) = subscribers.get_mut(&event.run_id) {
            entries.retain(|(_, tx)| tx.send(event.clone()).is_ok());
            if entries.is_empty() {
                subscribers.remove(&event.run_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ListenerRegistry;
    use runforge_core::Event;
    use runforge_core::RunId;

    #[test]
    fn notify_delivers_to_registered_listener() {
        let registry = ListenerRegistry::new();
        let run_id = RunId::from_raw("RUN-1");
        let (_id, mut rx) = registry.register(run_id.clone());
        registry.notify(&Event::new("run.created", run_id));
        let received = rx.try_recv().expect("event should be queued");
        assert_eq!(received.event, "run.created");
    }

    #[test]
    fn unregister_stops_delivery() {
        let registry = ListenerRegistry::new();
        let run_id = RunId::from_raw("RUN-1");
        let (id, mut rx) = registry.register(run_id.clone());
        registry.unregister(&run_id, id);
        registry.notify(&Event::new("run.created", run_id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_is_pruned_on_next_notify() {
        let registry = ListenerRegistry::new();
        let run_id = RunId::from_raw("RUN-1");
        let (_id, rx) = registry.register(run_id.clone());
        drop(rx);
        registry.notify(&Event::new("run.created", run_id.clone()));
        let (_id2, mut rx2) = registry.register(run_id.clone());
        registry.notify(&Event::new("run.status", run_id));
        let received = rx2.try_recv().expect("second listener should still work");
        assert_eq!(received.event, "run.status");
    }
}
