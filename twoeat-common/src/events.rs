//! Event types for the 2Eat recommendation client
//!
//! Provides the RecsEvent enum and the EventBus that front-ends subscribe to
//! instead of polling controller snapshots.

use crate::models::FeedbackAction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle phase of a recommendation feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeedPhase {
    /// No session has been requested yet
    Idle,
    /// Session creation in flight
    Starting,
    /// Session live; swipes and top-ups allowed
    Active,
    /// Automatic restart after a stale session or empty page
    Recovering,
    /// Session finalized with a winner
    Completed,
    /// Unrecoverable error; caller may restart
    Failed,
}

impl FeedPhase {
    /// Terminal phases end the current session attempt
    pub fn is_terminal(&self) -> bool {
        matches!(self, FeedPhase::Completed | FeedPhase::Failed)
    }
}

/// Why an automatic recovery was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryReason {
    /// Service rejected the session id (HTTP 400/409)
    StaleSession,
    /// Service returned a page with zero candidates
    EmptyPage,
}

/// Recommendation client events
///
/// Broadcast via EventBus; all variants carry the time they were raised.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecsEvent {
    /// Feed phase changed
    PhaseChanged {
        old_phase: FeedPhase,
        new_phase: FeedPhase,
        timestamp: DateTime<Utc>,
    },

    /// A new session replaced all session-scoped state
    SessionStarted {
        session_id: String,
        boot_key: String,
        timestamp: DateTime<Utc>,
    },

    /// Candidates appended to the prefetch queue
    QueueToppedUp {
        session_id: String,
        added: usize,
        queue_len: usize,
        timestamp: DateTime<Utc>,
    },

    /// Swipe reported (or attempted) for a candidate
    FeedbackSubmitted {
        session_id: String,
        candidate_id: String,
        action: FeedbackAction,
        /// False when the network call failed; the swipe still counts locally
        delivered: bool,
        timestamp: DateTime<Utc>,
    },

    /// One-shot automatic restart started
    RecoveryAttempted {
        session_id: String,
        reason: RecoveryReason,
        timestamp: DateTime<Utc>,
    },

    /// Enough likes (or a server signal) to prompt for a match
    MatchPromptDue {
        session_id: String,
        like_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Winner recorded, session closed
    SessionFinalized {
        session_id: String,
        winner_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Error surfaced to the caller
    ErrorRaised {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for RecsEvent
///
/// Cloning shares the underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecsEvent>,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RecsEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RecsEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
