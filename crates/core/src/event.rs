//! Domain event system: decoupled observation of the agent loop.
//!
//! The loop publishes events as it works; the CLI and tests subscribe
//! without the loop knowing about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A user query entered the loop
    QueryReceived {
        session_id: String,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// The model produced a completion
    ResponseGenerated {
        session_id: String,
        model: String,
        iteration: u32,
        tokens_used: u32,
        timestamp: DateTime<Utc>,
    },

    /// A tool was invoked
    ToolExecuted {
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The context summary was replaced
    SummaryUpdated {
        session_id: String,
        summary_chars: usize,
        timestamp: DateTime<Utc>,
    },

    /// The iteration ceiling ended a query
    DepthLimitReached {
        session_id: String,
        iterations: u32,
        timestamp: DateTime<Utc>,
    },

    /// An error aborted a query
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
