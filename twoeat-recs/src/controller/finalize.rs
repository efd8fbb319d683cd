//! Finalizer - close the session with a chosen winner

use super::core::RecsController;
use crate::error::{RecsError, Result};
use crate::transport::FinalizeRequest;
use tracing::{info, warn};
use twoeat_common::events::{FeedPhase, RecsEvent};
use twoeat_common::Candidate;

impl RecsController {
    /// Submit `winner_id` together with the like shortlist and superstar pick
    ///
    /// On success the session is completed and the winner's detail record is
    /// returned, taken from the response or else from the candidates seen
    /// this session. On failure the session stays open and may be finalized
    /// again.
    pub async fn finalize(&self, winner_id: &str) -> Result<Candidate> {
        let inner = &self.inner;
        if !inner.is_alive() {
            return Err(RecsError::ShutDown);
        }
        if winner_id.trim().is_empty() {
            return Err(RecsError::InvalidInput("winner id is empty".to_string()));
        }

        let request = {
            let state = inner.state.lock().await;
            let session = state.session.as_ref().ok_or(RecsError::NoSession)?;
            if session.finalized {
                return Err(RecsError::SessionClosed(session.id.clone()));
            }
            let queued = state.queue.ids();
            FinalizeRequest {
                session_id: session.id.clone(),
                top3: state
                    .ledger
                    .shortlist(inner.feed.shortlist_size, queued.iter().map(String::as_str)),
                winner_id: winner_id.to_string(),
                superstar_id: state.ledger.superstar().map(str::to_string),
            }
        };

        info!(
            session_id = %request.session_id,
            winner_id,
            top3 = ?request.top3,
            "Finalizing match"
        );
        let result = inner.api.finalize_match(&request).await;

        let mut state = inner.state.lock().await;
        if !inner.is_alive() {
            return Err(RecsError::ShutDown);
        }
        if !state.is_current_session(&request.session_id) {
            warn!(session_id = %request.session_id, "Session replaced while finalizing");
            return Err(RecsError::SessionClosed(request.session_id));
        }

        let response = match result {
            Ok(response) if response.ok => response,
            Ok(_) => {
                let err = RecsError::Rejected("finalize-match returned ok=false".to_string());
                inner.raise_error(&mut state, &err);
                return Err(err);
            }
            Err(e) => {
                inner.raise_error(&mut state, &e);
                return Err(e);
            }
        };

        if let Some(session) = state.session.as_mut() {
            session.finalized = true;
            session.mark_completed();
        }
        state.queue.clear();
        state.last_error = None;
        inner.transition(&mut state, FeedPhase::Completed);
        inner.events.emit_lossy(RecsEvent::SessionFinalized {
            session_id: request.session_id.clone(),
            winner_id: winner_id.to_string(),
            timestamp: chrono::Utc::now(),
        });

        response
            .winner
            .filter(|winner| winner.id == winner_id)
            .or_else(|| state.catalog.get(winner_id).cloned())
            .ok_or_else(|| RecsError::WinnerUnavailable(winner_id.to_string()))
    }
}
