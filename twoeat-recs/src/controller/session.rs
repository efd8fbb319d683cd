//! Session manager - start, boot, ensure and restart
//!
//! At most one session start is in flight per controller. Callers asking for
//! the same boot key join the pending start and observe its result; a start
//! for a different key waits for the pending one to settle first.

use super::core::{BootOutcome, Inner, RecsController, StartInitiator};
use crate::error::{RecsError, Result};
use crate::state::{PendingStart, Session, SharedStart};
use crate::transport::StartSessionRequest;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info};
use twoeat_common::events::{FeedPhase, RecsEvent};
use twoeat_common::Location;

enum StartStep {
    /// Await this start and return its result
    Join(SharedStart),
    /// Another location's start is pending; await it, then try again
    Wait(SharedStart),
}

impl RecsController {
    /// Create a new session for `location`
    ///
    /// Replaces all session-scoped state on success. On failure the previous
    /// session (if any) stays in place and the error is recorded.
    pub async fn start(&self, location: Location) -> Result<String> {
        location.validate()?;
        {
            let mut state = self.inner.state.lock().await;
            if !self.inner.is_alive() {
                return Err(RecsError::ShutDown);
            }
            state.location = Some(location);
        }
        self.start_with(location, StartInitiator::Caller).await
    }

    /// Current session id, starting one for the last known location if needed
    pub async fn ensure_session(&self) -> Result<String> {
        let location = {
            let state = self.inner.state.lock().await;
            if let Some(id) = state.session_id() {
                return Ok(id.to_string());
            }
            state.location.ok_or(RecsError::NoLocation)?
        };
        self.start_with(location, StartInitiator::Caller).await
    }

    /// Idempotent initialization for a location snapshot
    ///
    /// A repeated boot with the same rounded fingerprint is a no-op, so a
    /// re-entrant initializer never creates a second session. A failed start
    /// forgets the fingerprint again so the same location can be retried.
    pub async fn boot(&self, location: Location) -> Result<BootOutcome> {
        location.validate()?;
        let key = location.boot_key();
        {
            let mut state = self.inner.state.lock().await;
            if state.boot_key.as_ref() == Some(&key) {
                debug!(boot_key = %key, "Boot key unchanged, skipping");
                return Ok(BootOutcome::AlreadyBooted);
            }
            state.boot_key = Some(key.clone());
            state.location = Some(location);
        }

        let session_id = match self.start_with(location, StartInitiator::Caller).await {
            Ok(id) => id,
            Err(e) => {
                let mut state = self.inner.state.lock().await;
                if state.boot_key.as_ref() == Some(&key) {
                    state.boot_key = None;
                }
                return Err(e);
            }
        };

        self.fetch_more(true).await?;
        Ok(BootOutcome::Started { session_id })
    }

    /// Start over at the last known location and pull the first page
    pub async fn restart(&self) -> Result<String> {
        let location = {
            let state = self.inner.state.lock().await;
            state.location.ok_or(RecsError::NoLocation)?
        };
        info!("Restarting recommendation session");
        let session_id = self.start_with(location, StartInitiator::Caller).await?;
        self.fetch_more(true).await?;
        Ok(session_id)
    }

    /// Single-flight start
    pub(super) async fn start_with(
        &self,
        location: Location,
        initiator: StartInitiator,
    ) -> Result<String> {
        let key = location.boot_key();
        loop {
            let step = {
                let mut state = self.inner.state.lock().await;
                if !self.inner.is_alive() {
                    return Err(RecsError::ShutDown);
                }
                match &state.pending_start {
                    Some(pending) if pending.key == key => {
                        debug!(boot_key = %key, "Joining in-flight session start");
                        StartStep::Join(pending.future.clone())
                    }
                    Some(pending) => StartStep::Wait(pending.future.clone()),
                    None => {
                        state.start_generation += 1;
                        let generation = state.start_generation;
                        let previous_phase = state.phase;
                        if initiator == StartInitiator::Caller {
                            self.inner.transition(&mut state, FeedPhase::Starting);
                        }

                        let future = Inner::perform_start(
                            Arc::clone(&self.inner),
                            location,
                            initiator,
                            generation,
                            previous_phase,
                        )
                        .boxed()
                        .shared();

                        state.pending_start = Some(PendingStart {
                            key: key.clone(),
                            generation,
                            future: future.clone(),
                        });
                        StartStep::Join(future)
                    }
                }
            };

            match step {
                StartStep::Join(future) => return future.await,
                StartStep::Wait(future) => {
                    let _ = future.await;
                }
            }
        }
    }
}

impl Inner {
    /// Body of the shared start future
    async fn perform_start(
        inner: Arc<Inner>,
        location: Location,
        initiator: StartInitiator,
        generation: u64,
        previous_phase: FeedPhase,
    ) -> Result<String> {
        let request = StartSessionRequest {
            lat: location.latitude,
            lng: location.longitude,
            min_pool_size: inner.feed.min_pool_size,
        };
        debug!(lat = request.lat, lng = request.lng, ?initiator, "Starting session");

        let result = inner.api.start_session(&request).await;

        let mut state = inner.state.lock().await;
        if state
            .pending_start
            .as_ref()
            .map(|p| p.generation == generation)
            .unwrap_or(false)
        {
            state.pending_start = None;
        }

        if !inner.is_alive() {
            debug!("Dropping session start response after shutdown");
            return Err(RecsError::ShutDown);
        }

        match result {
            Ok(response) => {
                let session = Session::new(response.session_id.clone(), location);
                let boot_key = session.boot_key.to_string();
                state.install_session(session);

                if initiator == StartInitiator::Caller {
                    state.recovery.reset();
                    inner.transition(&mut state, FeedPhase::Active);
                }

                info!(session_id = %response.session_id, boot_key = %boot_key, "Session started");
                inner.events.emit_lossy(RecsEvent::SessionStarted {
                    session_id: response.session_id.clone(),
                    boot_key,
                    timestamp: chrono::Utc::now(),
                });
                Ok(response.session_id)
            }
            Err(e) => {
                let failed = initiator == StartInitiator::Recovery
                    || matches!(
                        previous_phase,
                        FeedPhase::Idle | FeedPhase::Starting | FeedPhase::Failed
                    );
                let phase = if failed { FeedPhase::Failed } else { previous_phase };
                inner.transition(&mut state, phase);
                inner.raise_error(&mut state, &e);
                Err(e)
            }
        }
    }
}
