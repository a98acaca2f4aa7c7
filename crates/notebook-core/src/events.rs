//! The event bus: a bounded broadcast channel fanning typed run/notebook
//! events out to every subscriber.
//!
//! Implemented over `tokio::sync::broadcast`. A dropped message
//! surfaces to the next successfully delivered event via
//! `broadcast::error::RecvError::Lagged(n)`; callers (the SSE handler) are
//! expected to catch that and synthesize a `TransportError` notice before
//! resuming normal delivery.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::cell::{CellId, CellStatus, Notebook};

/// Bounded FIFO depth per subscriber.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A typed event published by the scheduler or by a mutating REST handler.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A whole-notebook snapshot, published after non-run mutations and
    /// immediately on subscribe.
    NotebookState { notebook: Notebook },
    RunStarted { run_id: u64, trigger: CellId },
    CellStatus { run_id: u64, cell_id: CellId, status: CellStatus },
    CellOutput { run_id: u64, cell_id: CellId, outputs: Vec<String> },
    CellError { run_id: u64, cell_id: CellId, error: String },
    RunFinished { run_id: u64, trigger: CellId },
    /// Best-effort notice that a subscriber's queue dropped messages.
    TransportError { message: String },
}

impl Event {
    /// The SSE `id:` field, when this event carries a `run_id`.
    pub fn run_id(&self) -> Option<u64> {
        match self {
            Event::RunStarted { run_id, .. }
            | Event::CellStatus { run_id, .. }
            | Event::CellOutput { run_id, .. }
            | Event::CellError { run_id, .. }
            | Event::RunFinished { run_id, .. } => Some(*run_id),
            Event::NotebookState { .. } | Event::TransportError { .. } => None,
        }
    }

    /// The SSE event-name field.
    pub fn name(&self) -> &'static str {
        match self {
            Event::NotebookState { .. } => "notebook_state",
            Event::RunStarted { .. } => "run_started",
            Event::CellStatus { .. } => "cell_status",
            Event::CellOutput { .. } => "cell_output",
            Event::CellError { .. } => "cell_error",
            Event::RunFinished { .. } => "run_finished",
            Event::TransportError { .. } => "transport_error",
        }
    }
}

/// Convenience constructor for a `notebook_state` event from a cell list + settings.
pub fn notebook_state_event(notebook: Notebook) -> Event {
    Event::NotebookState { notebook }
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Fans an event out to every current subscriber. A publish with no
    /// subscribers is not an error — the scheduler runs whether or not
    /// anyone is watching.
    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::NotebookSettings;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(Event::RunStarted { run_id: 1, trigger: CellId(1) });
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::RunFinished { run_id: 1, trigger: CellId(1) });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "run_finished");
        assert_eq!(event.run_id(), Some(1));
    }

    #[test]
    fn notebook_state_carries_no_run_id() {
        let notebook = Notebook { settings: NotebookSettings::default(), cells: Vec::new() };
        let event = notebook_state_event(notebook);
        assert_eq!(event.run_id(), None);
    }
}
