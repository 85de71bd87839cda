//! Event types for conversation observers
//!
//! Events are fire-and-forget notifications about state changes. The
//! controller invokes the callback synchronously after releasing its state
//! lock, so a callback may freely read the controller or call `cancel()`.

use std::sync::Arc;

use streamchat_common::ResponseInputItem;

/// Final state of a single send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The response was consumed to the end.
    Completed {
        /// Number of agent items appended to the conversation.
        appended: usize,
    },
    /// The send was cancelled; no error item was recorded.
    Cancelled,
    /// The send failed; an error item carrying `message` was appended.
    Failed {
        /// Human-readable failure description.
        message: String,
    },
}

/// Notifications emitted by the controller.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// A send began; the user item is about to be appended.
    StreamStarted,

    /// An item was appended to the conversation.
    ItemAppended(ResponseInputItem),

    /// A send ended.
    StreamFinished(SendOutcome),
}

/// Callback receiving controller events
pub type EventCallback = Arc<dyn Fn(&ChatEvent) + Send + Sync>;
