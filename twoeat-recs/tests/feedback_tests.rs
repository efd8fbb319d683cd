//! Integration tests for the feedback submitter
//!
//! Covers the optimistic advance, bookkeeping per action, the re-entrancy
//! guard and the match prompt.

mod helpers;

use helpers::*;
use twoeat_common::config::FeedConfig;
use twoeat_common::events::RecsEvent;
use twoeat_common::FeedbackAction;
use twoeat_recs::transport::FeedbackResponse;
use twoeat_recs::{IgnoreReason, RecsError, SubmitOutcome};

fn submitted_id(outcome: &SubmitOutcome) -> Option<&str> {
    match outcome {
        SubmitOutcome::Submitted { candidate, .. } => Some(candidate.id.as_str()),
        SubmitOutcome::Ignored(_) => None,
    }
}

#[tokio::test]
async fn test_like_advances_and_tops_up_once() {
    // LIKE on X pops it into the like history
    let api = ScriptedApi::new();
    let feed = FeedConfig {
        low_water_mark: 5,
        ..FeedConfig::default()
    };
    let controller = active_controller(&api, feed, &["x", "y", "z", "w"]).await;
    assert_eq!(api.fetches(), 1);

    api.push_page(page(&["v"]));
    let outcome = controller.like().await;

    assert_eq!(submitted_id(&outcome), Some("x"));
    let snapshot = controller.snapshot().await;
    assert_eq!(current_id(&snapshot).as_deref(), Some("y"));
    assert_eq!(snapshot.like_count, 1);
    assert_eq!(snapshot.top3_candidate_ids, vec!["x"]);
    assert_eq!(api.fetches(), 2, "Exactly one top-up per submission");

    let request = api.feedback_requests.lock().unwrap()[0].clone();
    assert_eq!(request.session_id, "session-1");
    assert_eq!(request.candidate_id, "x");
    assert_eq!(request.action, FeedbackAction::Like);
}

#[tokio::test]
async fn test_failed_feedback_still_advances() {
    let api = ScriptedApi::new();
    let controller =
        active_controller(&api, FeedConfig::default(), &["a", "b", "c", "d", "e"]).await;

    api.push_feedback(Err(RecsError::Network("dropped".to_string())));
    let outcome = controller.like().await;

    match outcome {
        SubmitOutcome::Submitted {
            candidate,
            delivered,
            ..
        } => {
            assert_eq!(candidate.id, "a");
            assert!(!delivered);
        }
        other => panic!("Unexpected outcome: {:?}", other),
    }

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.queue.len(), 4, "Queue shrinks by exactly one");
    assert_eq!(current_id(&snapshot).as_deref(), Some("b"));
    assert_eq!(snapshot.like_count, 1, "Optimistic like is not rolled back");
    assert!(snapshot.last_error.is_none(), "Feedback failure is not surfaced");
}

#[tokio::test]
async fn test_every_submission_shrinks_queue_by_one() {
    let api = ScriptedApi::new();
    let controller =
        active_controller(&api, FeedConfig::default(), &["a", "b", "c", "d", "e", "f"]).await;
    api.push_feedback(Err(RecsError::Http {
        status: 500,
        message: String::new(),
    }));

    let mut expected_len = 6;
    for action in [FeedbackAction::Pass, FeedbackAction::Like, FeedbackAction::SuperStar] {
        let before = controller.snapshot().await;
        let outcome = controller.submit(action).await;
        let after = controller.snapshot().await;

        expected_len -= 1;
        assert_eq!(submitted_id(&outcome), current_id(&before).as_deref());
        assert_eq!(after.queue.len(), expected_len);
        assert_eq!(current_id(&after), before.queue.get(1).map(|c| c.id.clone()));
    }
}

#[tokio::test]
async fn test_submit_while_in_flight_is_ignored() {
    let api = ScriptedApi::new();
    let controller =
        active_controller(&api, FeedConfig::default(), &["a", "b", "c", "d", "e"]).await;
    let gate = api.hold_feedback();

    let first = {
        let controller = controller.clone();
        tokio::spawn(async move { controller.like().await })
    };
    api.feedback_entered.notified().await;

    assert_eq!(controller.pass().await, SubmitOutcome::Ignored(IgnoreReason::Busy));
    assert_eq!(current_id(&controller.snapshot().await).as_deref(), Some("b"));

    gate.notify_one();
    assert_eq!(submitted_id(&first.await.unwrap()), Some("a"));

    // Guard released once the first submission finished
    gate.notify_one();
    assert_eq!(submitted_id(&controller.pass().await), Some("b"));
    assert_eq!(api.feedbacks(), 2);
}

#[tokio::test]
async fn test_match_prompt_due_at_like_threshold() {
    // The local like count alone makes the prompt due
    let api = ScriptedApi::new();
    let ids: Vec<String> = (0..20).map(|i| format!("r{}", i)).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let controller = active_controller(&api, FeedConfig::default(), &ids).await;
    let mut events = controller.subscribe();

    for _ in 0..14 {
        controller.like().await;
    }
    assert!(!controller.match_prompt_due().await);

    controller.like().await;
    assert!(controller.match_prompt_due().await);
    assert!(controller.snapshot().await.match_prompt_due);

    controller.like().await;

    let mut prompts = 0;
    while let Ok(event) = events.try_recv() {
        if let RecsEvent::MatchPromptDue { like_count, .. } = event {
            assert_eq!(like_count, 15);
            prompts += 1;
        }
    }
    assert_eq!(prompts, 1, "Prompt announced once per session");
}

#[tokio::test]
async fn test_server_can_suggest_match_early() {
    let api = ScriptedApi::new();
    let controller = active_controller(&api, FeedConfig::default(), &["a", "b", "c", "d"]).await;

    api.push_feedback(Ok(FeedbackResponse {
        ok: true,
        should_suggest_match: Some(true),
        session_completed: None,
    }));
    controller.pass().await;

    let snapshot = controller.snapshot().await;
    assert!(snapshot.match_prompt_due);
    assert!(!snapshot.completed);
}

#[tokio::test]
async fn test_superstar_keeps_only_latest_pick() {
    let api = ScriptedApi::new();
    let controller = active_controller(&api, FeedConfig::default(), &["a", "b", "c", "d"]).await;

    controller.super_star().await;
    controller.super_star().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.superstar_id.as_deref(), Some("b"));
    assert_eq!(snapshot.like_count, 0);
}

#[tokio::test]
async fn test_submit_without_current_tops_up() {
    let api = ScriptedApi::new();
    let controller = controller(&api);
    controller.start(location()).await.unwrap();

    api.push_page(page(&["a", "b", "c"]));
    let outcome = controller.like().await;

    assert_eq!(outcome, SubmitOutcome::Ignored(IgnoreReason::NoCurrent));
    assert_eq!(api.feedbacks(), 0);
    assert_eq!(api.fetches(), 1);
    assert_eq!(current_id(&controller.snapshot().await).as_deref(), Some("a"));
}

#[tokio::test]
async fn test_submit_before_any_location_does_nothing() {
    let api = ScriptedApi::new();
    let controller = controller(&api);

    assert_eq!(controller.pass().await, SubmitOutcome::Ignored(IgnoreReason::NoCurrent));
    assert_eq!((api.starts(), api.fetches(), api.feedbacks()), (0, 0, 0));
}

#[tokio::test]
async fn test_server_completion_closes_feedback() {
    let api = ScriptedApi::new();
    let controller = active_controller(&api, FeedConfig::default(), &["a", "b", "c", "d"]).await;

    api.push_feedback(Ok(FeedbackResponse {
        ok: true,
        should_suggest_match: None,
        session_completed: Some(true),
    }));
    assert!(controller.like().await.is_submitted());

    let snapshot = controller.snapshot().await;
    assert!(snapshot.completed);
    assert!(snapshot.match_prompt_due);
    assert_eq!(
        controller.pass().await,
        SubmitOutcome::Ignored(IgnoreReason::SessionClosed)
    );
    assert_eq!(api.feedbacks(), 1);
}
