//! Feedback submitter
//!
//! The queue advances before the network call and is never rolled back: a
//! dropped swipe costs one server-side signal, a stalled feed costs the user.

use super::core::{FlagGuard, IgnoreReason, RecsController, SubmitOutcome};
use crate::transport::FeedbackRequest;
use std::sync::atomic::Ordering;
use tracing::{debug, warn};
use twoeat_common::events::RecsEvent;
use twoeat_common::FeedbackAction;

impl RecsController {
    pub async fn like(&self) -> SubmitOutcome {
        self.submit(FeedbackAction::Like).await
    }

    pub async fn pass(&self) -> SubmitOutcome {
        self.submit(FeedbackAction::Pass).await
    }

    pub async fn super_star(&self) -> SubmitOutcome {
        self.submit(FeedbackAction::SuperStar).await
    }

    /// Swipe on the current card
    ///
    /// Sequence: pop the head, remember its id, report the swipe, then top
    /// up the queue once whatever the report's outcome.
    pub async fn submit(&self, action: FeedbackAction) -> SubmitOutcome {
        let inner = &self.inner;
        if !inner.is_alive() {
            return SubmitOutcome::Ignored(IgnoreReason::ShutDown);
        }
        if inner
            .submit_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(%action, "Submit already in flight, ignoring");
            return SubmitOutcome::Ignored(IgnoreReason::Busy);
        }
        let guard = FlagGuard(&inner.submit_in_flight);

        let popped = {
            let mut state = inner.state.lock().await;
            match state.session.as_ref().map(|s| (s.id.clone(), s.completed)) {
                Some((_, true)) => return SubmitOutcome::Ignored(IgnoreReason::SessionClosed),
                Some((session_id, false)) => {
                    let next = state.queue.advance();
                    if let Some(candidate) = &next {
                        state.ledger.record(&candidate.id, action);
                        inner.announce_prompt_if_due(&mut state);
                    }
                    next.map(|candidate| (session_id, candidate))
                }
                None => None,
            }
        };

        let Some((session_id, candidate)) = popped else {
            drop(guard);
            self.top_up_without_current().await;
            return SubmitOutcome::Ignored(IgnoreReason::NoCurrent);
        };

        let request = FeedbackRequest {
            session_id: session_id.clone(),
            candidate_id: candidate.id.clone(),
            action,
        };
        let result = inner.api.submit_feedback(&request).await;

        let delivered = {
            let mut state = inner.state.lock().await;
            match result {
                Ok(response) => {
                    if inner.is_alive() && state.is_current_session(&session_id) {
                        if response.should_suggest_match == Some(true) {
                            state.server_prompt = true;
                        }
                        if response.session_completed == Some(true) {
                            if let Some(session) = state.session.as_mut() {
                                session.mark_completed();
                            }
                            state.server_prompt = true;
                        }
                        inner.announce_prompt_if_due(&mut state);
                    }
                    if !response.ok {
                        warn!(candidate_id = %candidate.id, %action, "Service did not accept feedback");
                    }
                    response.ok
                }
                Err(e) => {
                    warn!(candidate_id = %candidate.id, %action, error = %e, "Feedback not delivered");
                    false
                }
            }
        };

        inner.events.emit_lossy(RecsEvent::FeedbackSubmitted {
            session_id,
            candidate_id: candidate.id.clone(),
            action,
            delivered,
            timestamp: chrono::Utc::now(),
        });
        drop(guard);

        if let Err(e) = self.fetch_more(false).await {
            debug!(error = %e, "Top-up after feedback failed");
        }

        SubmitOutcome::Submitted {
            candidate,
            action,
            delivered,
        }
    }

    /// Nothing on screen: make sure a session exists and pull a page
    async fn top_up_without_current(&self) {
        if let Err(e) = self.fetch_more(false).await {
            debug!(error = %e, "Top-up without current card failed");
        }
    }
}
