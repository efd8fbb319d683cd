//! Prefetch - keep the queue above the low-water mark
//!
//! Fetching only ever appends; the current card changes solely through
//! feedback, finalize or restart. Stale-session and empty-page failures are
//! handed to the recovery policy, which allows one restart-and-refetch per
//! failure episode.

use super::core::{FetchGuard, RecsController, StartInitiator};
use crate::error::{RecsError, Result};
use crate::recovery::RecoveryPolicy;
use crate::transport::NextPageRequest;
use std::sync::atomic::Ordering;
use tracing::{debug, info, warn};
use twoeat_common::events::{FeedPhase, RecoveryReason, RecsEvent};
use twoeat_common::Location;

enum FetchStep {
    Done,
    /// No session yet; create one and try again
    NeedSession,
    /// Recovery budget granted; restart at this location and refetch
    Recover(Location),
}

impl RecsController {
    /// Request another page of candidates
    ///
    /// Without `force` the request is skipped while the queue is at or above
    /// the low-water mark or while another fetch or a session start is
    /// running. It is also skipped while the feed is recovering or terminal.
    /// A completed session makes this a no-op either way.
    pub async fn fetch_more(&self, force: bool) -> Result<()> {
        let mut force = force;
        loop {
            match self.fetch_page_once(force).await? {
                FetchStep::Done => return Ok(()),
                FetchStep::NeedSession => {
                    self.ensure_session().await?;
                    force = true;
                }
                FetchStep::Recover(location) => {
                    self.start_with(location, StartInitiator::Recovery).await?;
                    force = true;
                }
            }
        }
    }

    async fn fetch_page_once(&self, force: bool) -> Result<FetchStep> {
        let inner = &self.inner;
        if !inner.is_alive() {
            return Err(RecsError::ShutDown);
        }

        let (request, _guard) = {
            let state = inner.state.lock().await;
            let Some(session) = state.session.as_ref() else {
                return Ok(FetchStep::NeedSession);
            };
            if session.completed {
                debug!(session_id = %session.id, "Session completed, not fetching");
                return Ok(FetchStep::Done);
            }
            if !force {
                let busy = inner.fetches_in_flight.load(Ordering::Acquire) > 0;
                if busy
                    || state.pending_start.is_some()
                    || state.phase == FeedPhase::Recovering
                    || state.phase.is_terminal()
                    || state.queue.len() >= inner.feed.low_water_mark
                {
                    return Ok(FetchStep::Done);
                }
            }

            let request = NextPageRequest {
                session_id: session.id.clone(),
                lat: session.location.latitude,
                lng: session.location.longitude,
                limit: inner.feed.page_size,
                exclude_ids: state.queue.exclusion_set(),
            };
            (request, FetchGuard::new(&inner.fetches_in_flight))
        };

        debug!(
            session_id = %request.session_id,
            excluded = request.exclude_ids.len(),
            "Fetching next page"
        );
        let result = inner.api.next_page(&request).await;

        let mut state = inner.state.lock().await;
        if !inner.is_alive() {
            debug!("Dropping page response after shutdown");
            return Err(RecsError::ShutDown);
        }
        if !state.is_current_session(&request.session_id) {
            debug!(session_id = %request.session_id, "Dropping page for superseded session");
            return Ok(FetchStep::Done);
        }
        if state.session.as_ref().map(|s| s.completed).unwrap_or(false) {
            debug!(session_id = %request.session_id, "Dropping page for completed session");
            return Ok(FetchStep::Done);
        }

        let (reason, failure) = match result {
            Ok(page) => {
                let returned = page.items.len();
                state.catalog_candidates(&page.items);
                let report = state.queue.append(page.items);
                if report.duplicates > 0 {
                    warn!(
                        duplicates = report.duplicates,
                        "Service returned candidates that were already queued or recently shown"
                    );
                }

                if page.session_completed == Some(true) {
                    info!(session_id = %request.session_id, "Service reports session completed");
                    if let Some(session) = state.session.as_mut() {
                        session.mark_completed();
                    }
                    state.server_prompt = true;
                    inner.announce_prompt_if_due(&mut state);
                }

                if report.added > 0 {
                    state.recovery.reset();
                    if matches!(state.phase, FeedPhase::Recovering | FeedPhase::Failed) {
                        state.last_error = None;
                        inner.transition(&mut state, FeedPhase::Active);
                    }
                    debug!(returned, added = report.added, queue_len = state.queue.len(), "Queue topped up");
                    inner.events.emit_lossy(RecsEvent::QueueToppedUp {
                        session_id: request.session_id.clone(),
                        added: report.added,
                        queue_len: state.queue.len(),
                        timestamp: chrono::Utc::now(),
                    });
                    return Ok(FetchStep::Done);
                }

                let completed = state.session.as_ref().map(|s| s.completed).unwrap_or(false);
                if completed
                    || !RecoveryPolicy::warrants_restart(RecoveryReason::EmptyPage, state.queue.len())
                {
                    return Ok(FetchStep::Done);
                }
                (RecoveryReason::EmptyPage, RecsError::NoMoreSuggestions)
            }
            Err(e) if e.is_stale_session() => (RecoveryReason::StaleSession, e),
            Err(e) => {
                if state.phase == FeedPhase::Recovering {
                    inner.transition(&mut state, FeedPhase::Failed);
                }
                inner.raise_error(&mut state, &e);
                return Err(e);
            }
        };

        if state.recovery.try_begin() {
            warn!(session_id = %request.session_id, ?reason, "Recovering session");
            inner.transition(&mut state, FeedPhase::Recovering);
            inner.events.emit_lossy(RecsEvent::RecoveryAttempted {
                session_id: request.session_id.clone(),
                reason,
                timestamp: chrono::Utc::now(),
            });
            let location = state
                .session
                .as_ref()
                .map(|s| s.location)
                .ok_or(RecsError::NoSession)?;
            return Ok(FetchStep::Recover(location));
        }

        inner.transition(&mut state, FeedPhase::Failed);
        inner.raise_error(&mut state, &failure);
        Err(failure)
    }
}
