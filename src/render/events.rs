//! Typed notifications from rendered markers.
//!
//! Backed by a tokio broadcast channel: publishing never blocks, every
//! subscriber sees every event, and dropping a receiver unsubscribes it.
use serde::Serialize;
use tokio::sync::broadcast;

use crate::dom::NodeId;
use crate::models::Issue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayEventKind {
    Hover,
    Leave,
    Click,
    SuggestionApplied,
    IssueIgnored,
}

impl OverlayEventKind {
    pub fn topic(&self) -> &'static str {
        match self {
            OverlayEventKind::Hover => "issue/hover",
            OverlayEventKind::Leave => "issue/leave",
            OverlayEventKind::Click => "issue/click",
            OverlayEventKind::SuggestionApplied => "suggestion/apply",
            OverlayEventKind::IssueIgnored => "issue/ignore",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayEvent {
    pub kind: OverlayEventKind,
    pub issue: Issue,
    /// Marker the event came from. Detached for apply/ignore, since the
    /// marker is gone by the time subscribers see it.
    pub element: NodeId,
    /// Replacement text, for `SuggestionApplied`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OverlayEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of subscribers that received the event; 0 is not an error.
    pub fn publish(&self, event: OverlayEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OverlayEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
