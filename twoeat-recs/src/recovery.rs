//! Recovery policy
//!
//! Bounded retry budget for stale-session and empty-page failures. One
//! failure episode gets at most `max_attempts` automatic restarts; the
//! budget is refilled only by a caller-initiated start or by a page that
//! actually delivered candidates.

use twoeat_common::events::RecoveryReason;

/// Canonical number of automatic restarts per failure episode
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    max_attempts: u32,
    used: u32,
}

impl RecoveryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            used: 0,
        }
    }

    /// Claim one attempt from the budget
    ///
    /// Returns false when the episode already used its attempts; the caller
    /// must then surface the failure instead of restarting.
    pub fn try_begin(&mut self) -> bool {
        if self.used >= self.max_attempts {
            return false;
        }
        self.used += 1;
        true
    }

    /// Whether a failure justifies a session restart at all
    ///
    /// A stale session is useless whatever is queued. An empty page only
    /// matters once the user has nothing left to look at; restarting earlier
    /// would wipe cards that are still on screen.
    pub fn warrants_restart(reason: RecoveryReason, queued: usize) -> bool {
        match reason {
            RecoveryReason::StaleSession => true,
            RecoveryReason::EmptyPage => queued == 0,
        }
    }

    /// End the failure episode
    pub fn reset(&mut self) {
        self.used = 0;
    }
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}
