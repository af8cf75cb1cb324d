//! Refresh event system.
//!
//! The orchestrator publishes a [`RefreshEvent`] every time it renders,
//! switches mode, or throws away a stale run. Front ends subscribe through
//! [`EventDispatcher::subscribe`] or the orchestrator handle.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::pipeline::DashboardSnapshot;

/// How refreshes are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Fixed-interval timer.
    Polling,
    /// Change notifications from the store.
    Push,
}

impl std::fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshMode::Polling => write!(f, "polling"),
            RefreshMode::Push => write!(f, "push"),
        }
    }
}

/// What started a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// First run after start.
    Startup,
    /// Polling timer tick.
    Timer,
    /// Store change notification.
    Change,
    /// Device, date range or point count changed.
    FilterChanged,
    /// Explicit refresh request.
    Manual,
}

/// Events emitted by the refresh orchestrator.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum RefreshEvent {
    /// A run completed and its views are current.
    Rendered {
        seq: u64,
        trigger: Trigger,
        mode: RefreshMode,
        snapshot: Box<DashboardSnapshot>,
    },
    /// The refresh mode changed.
    ModeChanged {
        mode: RefreshMode,
        reason: Option<String>,
    },
    /// A run finished after a newer one had already been applied.
    RunDiscarded { seq: u64, applied: u64 },
}

/// Sender for refresh events.
pub type EventSender = broadcast::Sender<RefreshEvent>;

/// Receiver for refresh events.
pub type EventReceiver = broadcast::Receiver<RefreshEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Fan-out of refresh events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = event_channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: RefreshEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}
