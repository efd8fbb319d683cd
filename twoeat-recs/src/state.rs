//! Feed state machine
//!
//! Phases: IDLE → STARTING → ACTIVE ⇄ RECOVERING → COMPLETED | FAILED
//!
//! Everything that belongs to one session (queue, like history, superstar,
//! candidate catalog, completion flag) is held in [`FeedState`] and replaced
//! in a single step by [`FeedState::install_session`].

use crate::error::{RecsError, Result};
use crate::ledger::SwipeLedger;
use crate::queue::PrefetchQueue;
use crate::recovery::RecoveryPolicy;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use std::collections::HashMap;
use twoeat_common::events::FeedPhase;
use twoeat_common::{BootKey, Candidate, Location};

/// Shared handle on an in-flight session start
pub type SharedStart = Shared<BoxFuture<'static, Result<String>>>;

/// One server-tracked run of the swipe feed
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Server-issued session identifier
    pub id: String,

    /// Location snapshot the session was created for
    pub location: Location,

    pub boot_key: BootKey,

    /// No more swipes are meaningful (server signal or finalize)
    pub completed: bool,

    /// A winner was recorded
    pub finalized: bool,

    pub started_at: DateTime<Utc>,

    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: String, location: Location) -> Self {
        Self {
            id,
            boot_key: location.boot_key(),
            location,
            completed: false,
            finalized: false,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Mark the session as having nothing more to swipe on
    pub fn mark_completed(&mut self) {
        if !self.completed {
            self.completed = true;
            self.ended_at = Some(Utc::now());
        }
    }
}

/// Phase transition record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseTransition {
    pub old_phase: FeedPhase,
    pub new_phase: FeedPhase,
    pub transitioned_at: DateTime<Utc>,
}

/// In-flight start, keyed by the location fingerprint it was issued for
pub struct PendingStart {
    pub key: BootKey,
    pub generation: u64,
    pub future: SharedStart,
}

/// Mutable controller state, guarded by one lock
pub struct FeedState {
    pub phase: FeedPhase,

    /// Last location supplied by the caller
    pub location: Option<Location>,

    /// Fingerprint of the last successful (or in-progress) boot
    pub boot_key: Option<BootKey>,

    pub session: Option<Session>,

    pub queue: PrefetchQueue,

    pub ledger: SwipeLedger,

    /// Every candidate received this session, for winner lookup
    pub catalog: HashMap<String, Candidate>,

    pub recovery: RecoveryPolicy,

    /// Server asked for the match prompt
    pub server_prompt: bool,

    /// MatchPromptDue already emitted for this session
    pub prompt_announced: bool,

    pub last_error: Option<RecsError>,

    pub pending_start: Option<PendingStart>,

    pub start_generation: u64,

    recent_window: usize,
}

impl FeedState {
    pub fn new(recent_window: usize, recovery: RecoveryPolicy) -> Self {
        Self {
            phase: FeedPhase::Idle,
            location: None,
            boot_key: None,
            session: None,
            queue: PrefetchQueue::new(recent_window),
            ledger: SwipeLedger::new(),
            catalog: HashMap::new(),
            recovery,
            server_prompt: false,
            prompt_announced: false,
            last_error: None,
            pending_start: None,
            start_generation: 0,
            recent_window,
        }
    }

    /// Transition to a new phase
    ///
    /// Returns `None` when the phase does not change.
    pub fn transition_to(&mut self, new_phase: FeedPhase) -> Option<PhaseTransition> {
        if self.phase == new_phase {
            return None;
        }
        let transition = PhaseTransition {
            old_phase: self.phase,
            new_phase,
            transitioned_at: Utc::now(),
        };
        self.phase = new_phase;
        Some(transition)
    }

    /// Replace all session-scoped state with a fresh session
    pub fn install_session(&mut self, session: Session) {
        self.session = Some(session);
        self.queue = PrefetchQueue::new(self.recent_window);
        self.ledger = SwipeLedger::new();
        self.catalog.clear();
        self.server_prompt = false;
        self.prompt_announced = false;
        self.last_error = None;
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// True when `id` still names the live session
    pub fn is_current_session(&self, id: &str) -> bool {
        self.session_id() == Some(id)
    }

    /// Likes (or a server signal) say it is time to pick a winner
    pub fn match_prompt_due(&self, threshold: usize) -> bool {
        self.server_prompt || self.ledger.like_count() >= threshold
    }

    /// Remember candidates so a winner can be resolved later
    pub fn catalog_candidates<'a, I>(&mut self, candidates: I)
    where
        I: IntoIterator<Item = &'a Candidate>,
    {
        for candidate in candidates {
            self.catalog
                .entry(candidate.id.clone())
                .or_insert_with(|| candidate.clone());
        }
    }
}

/// Point-in-time view of the feed for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub phase: FeedPhase,
    pub session_id: Option<String>,
    pub current: Option<Candidate>,
    /// Full queue, current card first
    pub queue: Vec<Candidate>,
    /// A start or fetch is in flight
    pub loading: bool,
    pub last_error: Option<RecsError>,
    pub match_prompt_due: bool,
    /// Most recent likes, most recent first
    pub top3_candidate_ids: Vec<String>,
    pub superstar_id: Option<String>,
    pub like_count: usize,
    pub completed: bool,
}
