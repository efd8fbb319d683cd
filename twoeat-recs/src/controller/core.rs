//! Core controller - handle, shared state and event plumbing
//!
//! **Responsibilities:**
//! - RecsController handle and construction
//! - Phase transitions and event emission
//! - Snapshot accessor and teardown

use crate::error::RecsError;
use crate::recovery::RecoveryPolicy;
use crate::state::{FeedSnapshot, FeedState};
use crate::transport::RecsApi;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use twoeat_common::config::FeedConfig;
use twoeat_common::events::{EventBus, FeedPhase, RecsEvent};
use twoeat_common::{Candidate, FeedbackAction};

/// Who asked for a session start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum StartInitiator {
    /// start / boot / restart from the caller; refills the recovery budget
    Caller,
    /// Automatic restart from the recovery policy
    Recovery,
}

/// Result of [`RecsController::boot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// Fingerprint unchanged since the last boot; nothing was sent
    AlreadyBooted,
    /// New session created and the first page requested
    Started { session_id: String },
}

/// Why a submit did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Nothing on screen to swipe
    NoCurrent,
    /// Another submit is still in flight
    Busy,
    /// Session completed or finalized
    SessionClosed,
    /// Controller torn down
    ShutDown,
}

/// Result of [`RecsController::submit`]
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Queue advanced past `candidate`
    Submitted {
        candidate: Candidate,
        action: FeedbackAction,
        /// Service acknowledged the swipe
        delivered: bool,
    },
    Ignored(IgnoreReason),
}

impl SubmitOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted { .. })
    }
}

/// Recommendation session controller
///
/// Cheap to clone; every clone drives the same feed.
#[derive(Clone)]
pub struct RecsController {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    /// Remote ranking service
    pub(super) api: Arc<dyn RecsApi>,

    pub(super) feed: FeedConfig,

    /// All session-scoped state; never held across a network call
    pub(super) state: Mutex<FeedState>,

    pub(super) events: EventBus,

    /// Cleared by shutdown(); late responses must not touch state afterwards
    pub(super) alive: AtomicBool,

    /// Feedback re-entrancy guard
    pub(super) submit_in_flight: AtomicBool,

    pub(super) fetches_in_flight: AtomicUsize,
}

/// Resets an in-flight flag when the owning call finishes
pub(super) struct FlagGuard<'a>(pub(super) &'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Decrements the fetch counter when a page request finishes
pub(super) struct FetchGuard<'a>(&'a AtomicUsize);

impl<'a> FetchGuard<'a> {
    pub(super) fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RecsController {
    /// Create a controller with its own event bus
    pub fn new(api: Arc<dyn RecsApi>, feed: FeedConfig) -> Self {
        Self::with_event_bus(api, feed, EventBus::default())
    }

    /// Create a controller that publishes on an existing bus
    pub fn with_event_bus(api: Arc<dyn RecsApi>, feed: FeedConfig, events: EventBus) -> Self {
        let state = FeedState::new(feed.recent_window, RecoveryPolicy::default());
        Self {
            inner: Arc::new(Inner {
                api,
                feed,
                state: Mutex::new(state),
                events,
                alive: AtomicBool::new(true),
                submit_in_flight: AtomicBool::new(false),
                fetches_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecsEvent> {
        self.inner.events.subscribe()
    }

    pub fn feed_config(&self) -> &FeedConfig {
        &self.inner.feed
    }

    pub fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    /// Current view of the feed
    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.inner.state.lock().await;
        let completed = state.session.as_ref().map(|s| s.completed).unwrap_or(false);
        let loading = state.pending_start.is_some()
            || self.inner.fetches_in_flight.load(Ordering::Acquire) > 0;

        FeedSnapshot {
            phase: state.phase,
            session_id: state.session_id().map(str::to_string),
            current: state.queue.current().cloned(),
            queue: state.queue.iter().cloned().collect(),
            loading,
            last_error: state.last_error.clone(),
            match_prompt_due: state.match_prompt_due(self.inner.feed.match_prompt_threshold),
            top3_candidate_ids: state.ledger.recent_likes(self.inner.feed.shortlist_size),
            superstar_id: state.ledger.superstar().map(str::to_string),
            like_count: state.ledger.like_count(),
            completed,
        }
    }

    /// Whether the caller should offer the match screen
    pub async fn match_prompt_due(&self) -> bool {
        let state = self.inner.state.lock().await;
        state.match_prompt_due(self.inner.feed.match_prompt_threshold)
    }

    /// Tear the controller down
    ///
    /// In-flight requests are left to finish but their responses are dropped.
    pub fn shutdown(&self) {
        if self.inner.alive.swap(false, Ordering::AcqRel) {
            info!("Recommendation controller shut down");
        }
    }
}

impl Inner {
    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Move to `phase` and announce it
    pub(super) fn transition(&self, state: &mut FeedState, phase: FeedPhase) {
        if let Some(transition) = state.transition_to(phase) {
            debug!(
                old_phase = ?transition.old_phase,
                new_phase = ?transition.new_phase,
                "Feed phase changed"
            );
            self.events.emit_lossy(RecsEvent::PhaseChanged {
                old_phase: transition.old_phase,
                new_phase: transition.new_phase,
                timestamp: transition.transitioned_at,
            });
        }
    }

    /// Record an error for the caller to render
    pub(super) fn raise_error(&self, state: &mut FeedState, err: &RecsError) {
        warn!(error = %err, "Recommendation feed error");
        state.last_error = Some(err.clone());
        self.events.emit_lossy(RecsEvent::ErrorRaised {
            message: err.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Emit MatchPromptDue the first time the prompt becomes due this session
    pub(super) fn announce_prompt_if_due(&self, state: &mut FeedState) {
        if state.prompt_announced || !state.match_prompt_due(self.feed.match_prompt_threshold) {
            return;
        }
        let Some(session_id) = state.session_id().map(str::to_string) else {
            return;
        };
        state.prompt_announced = true;
        info!(session_id = %session_id, likes = state.ledger.like_count(), "Match prompt due");
        self.events.emit_lossy(RecsEvent::MatchPromptDue {
            session_id,
            like_count: state.ledger.like_count(),
            timestamp: chrono::Utc::now(),
        });
    }
}
