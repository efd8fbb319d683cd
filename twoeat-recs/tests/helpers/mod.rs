//! Test helpers for controller integration tests
//!
//! `ScriptedApi` is an in-memory `RecsApi`: each endpoint pops the next
//! scripted response (falling back to a benign default), records the request
//! and counts calls. Start, page and feedback calls can be held in flight
//! with a `Notify` gate.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use twoeat_common::config::FeedConfig;
use twoeat_common::{Candidate, Location};
use twoeat_recs::error::{RecsError, Result};
use twoeat_recs::transport::{
    FeedbackRequest, FeedbackResponse, FinalizeRequest, FinalizeResponse, NextPageRequest,
    NextPageResponse, RecsApi, StartSessionRequest, StartSessionResponse,
};
use twoeat_recs::RecsController;

#[derive(Default)]
pub struct ScriptedApi {
    pub start_calls: AtomicUsize,
    pub next_calls: AtomicUsize,
    pub feedback_calls: AtomicUsize,
    pub finalize_calls: AtomicUsize,

    starts: Mutex<VecDeque<Result<StartSessionResponse>>>,
    pages: Mutex<VecDeque<Result<NextPageResponse>>>,
    feedback: Mutex<VecDeque<Result<FeedbackResponse>>>,
    finalize: Mutex<VecDeque<Result<FinalizeResponse>>>,

    pub next_requests: Mutex<Vec<NextPageRequest>>,
    pub feedback_requests: Mutex<Vec<FeedbackRequest>>,
    pub finalize_requests: Mutex<Vec<FinalizeRequest>>,

    start_gate: Mutex<Option<Arc<Notify>>>,
    page_gate: Mutex<Option<Arc<Notify>>>,
    feedback_gate: Mutex<Option<Arc<Notify>>>,

    /// Signalled each time a start call reaches the service
    pub start_entered: Notify,
    /// Signalled each time a page call is held at the gate
    pub page_entered: Notify,
    /// Signalled each time a feedback call reaches the service
    pub feedback_entered: Notify,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_start(&self, result: Result<StartSessionResponse>) {
        self.starts.lock().unwrap().push_back(result);
    }

    pub fn push_page(&self, result: Result<NextPageResponse>) {
        self.pages.lock().unwrap().push_back(result);
    }

    pub fn push_feedback(&self, result: Result<FeedbackResponse>) {
        self.feedback.lock().unwrap().push_back(result);
    }

    pub fn push_finalize(&self, result: Result<FinalizeResponse>) {
        self.finalize.lock().unwrap().push_back(result);
    }

    /// Hold every start call until the returned handle is notified
    pub fn hold_starts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.start_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Hold every page call until the returned handle is notified
    pub fn hold_pages(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.page_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Hold every feedback call until the returned handle is notified
    pub fn hold_feedback(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.feedback_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn starts(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.next_calls.load(Ordering::SeqCst)
    }

    pub fn feedbacks(&self) -> usize {
        self.feedback_calls.load(Ordering::SeqCst)
    }

    pub fn finalizes(&self) -> usize {
        self.finalize_calls.load(Ordering::SeqCst)
    }

    pub fn last_next_request(&self) -> Option<NextPageRequest> {
        self.next_requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RecsApi for ScriptedApi {
    async fn start_session(&self, _req: &StartSessionRequest) -> Result<StartSessionResponse> {
        let n = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.start_entered.notify_one();

        let gate = self.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self.starts.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(StartSessionResponse {
                session_id: format!("session-{}", n),
            })
        })
    }

    async fn next_page(&self, req: &NextPageRequest) -> Result<NextPageResponse> {
        self.next_calls.fetch_add(1, Ordering::SeqCst);
        self.next_requests.lock().unwrap().push(req.clone());

        let gate = self.page_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.page_entered.notify_one();
            gate.notified().await;
        }

        let scripted = self.pages.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(NextPageResponse::default()))
    }

    async fn submit_feedback(&self, req: &FeedbackRequest) -> Result<FeedbackResponse> {
        self.feedback_calls.fetch_add(1, Ordering::SeqCst);
        self.feedback_requests.lock().unwrap().push(req.clone());
        self.feedback_entered.notify_one();

        let gate = self.feedback_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let scripted = self.feedback.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(FeedbackResponse::default()))
    }

    async fn finalize_match(&self, req: &FinalizeRequest) -> Result<FinalizeResponse> {
        self.finalize_calls.fetch_add(1, Ordering::SeqCst);
        self.finalize_requests.lock().unwrap().push(req.clone());

        let scripted = self.finalize.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(FinalizeResponse::default()))
    }
}

pub fn location() -> Location {
    Location::new(40.4237, -86.9212).unwrap()
}

pub fn other_location() -> Location {
    Location::new(41.8781, -87.6298).unwrap()
}

pub fn candidates(ids: &[&str]) -> Vec<Candidate> {
    ids.iter()
        .map(|id| Candidate::new(*id, format!("Restaurant {}", id)))
        .collect()
}

pub fn page(ids: &[&str]) -> Result<NextPageResponse> {
    Ok(NextPageResponse {
        items: candidates(ids),
        session_completed: None,
    })
}

pub fn stale() -> RecsError {
    RecsError::StaleSession { status: 409 }
}

pub fn controller(api: &Arc<ScriptedApi>) -> RecsController {
    controller_with(api, FeedConfig::default())
}

pub fn controller_with(api: &Arc<ScriptedApi>, feed: FeedConfig) -> RecsController {
    let api: Arc<dyn RecsApi> = Arc::clone(api) as Arc<dyn RecsApi>;
    RecsController::new(api, feed)
}

/// Controller with a started session and `ids` queued
pub async fn active_controller(api: &Arc<ScriptedApi>, feed: FeedConfig, ids: &[&str]) -> RecsController {
    let controller = controller_with(api, feed);
    controller.start(location()).await.unwrap();
    api.push_page(page(ids));
    controller.fetch_more(true).await.unwrap();
    controller
}

pub fn current_id(snapshot: &twoeat_recs::FeedSnapshot) -> Option<String> {
    snapshot.current.as_ref().map(|c| c.id.clone())
}
