use std::sync::Arc;

use services::{Clock, ErrorKind, SessionRegistry, SessionTracker};
use sqlearn_core::Catalog;
use sqlearn_core::model::{SessionError, SessionEvent, SessionStatus};
use sqlearn_core::time::fixed_now;

fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::bundled().unwrap())
}

#[test]
fn full_session_walkthrough() {
    let mut tracker = SessionTracker::start(Clock::fixed(fixed_now()), catalog());
    assert_eq!(tracker.status(), SessionStatus::Active);

    assert!(tracker.visit_topic("basic-queries").unwrap());
    assert!(tracker.visit_topic("joins").unwrap());
    assert!(!tracker.visit_topic("basic-queries").unwrap());

    let feedback = tracker.submit_answer("basic-queries.q1", 2).unwrap();
    assert!(!feedback.correct);
    assert_eq!(feedback.message, "It starts with 'W'.");

    let feedback = tracker.submit_answer("basic-queries.q1", 1).unwrap();
    assert!(feedback.correct);

    let feedback = tracker
        .submit_selection("transactions.q1", &[0, 1, 2])
        .unwrap();
    assert!(feedback.correct);

    let feedback = tracker.submit_selection("views.q1", &[0, 2]).unwrap();
    assert!(!feedback.correct);
    assert_eq!(feedback.extra.len(), 1);
    assert_eq!(feedback.missing.len(), 2);

    let score = tracker.score();
    assert_eq!((score.correct, score.answered), (2, 3));

    let final_score = tracker.end_session().unwrap();
    assert_eq!(final_score, score);

    assert_eq!(
        tracker.visit_topic("subqueries"),
        Err(SessionError::SessionEnded)
    );
    assert_eq!(
        tracker.submit_answer("joins.q1", 3),
        Err(SessionError::SessionEnded)
    );
    assert_eq!(tracker.visited().len(), 2);
    assert_eq!(tracker.score(), score);
}

#[test]
fn invalid_answers_leave_the_session_unchanged() {
    let mut tracker = SessionTracker::start(Clock::fixed(fixed_now()), catalog());
    tracker.submit_answer("joins.q1", 3).unwrap();
    let before = tracker.state().clone();

    assert!(matches!(
        tracker.submit_answer("joins.q1", 4),
        Err(SessionError::Answer(_))
    ));
    assert!(matches!(
        tracker.submit_answer("indexes.q1", 0),
        Err(SessionError::Answer(_))
    ));
    assert!(matches!(
        tracker.submit_answer("joins.q9", 0),
        Err(SessionError::QuestionNotFound(_))
    ));
    assert_eq!(tracker.state(), &before);
}

#[test]
fn event_log_replays_to_the_same_state() {
    let clock = Clock::fixed(fixed_now());
    let mut tracker = SessionTracker::start(clock, catalog());
    tracker.visit_topic("views").unwrap();
    tracker.submit_selection("views.q1", &[3, 1, 0]).unwrap();
    tracker.submit_answer("subqueries.q1", 1).unwrap();
    tracker.end_session().unwrap();

    let replayed = SessionTracker::replay(
        clock,
        catalog(),
        tracker.id(),
        tracker.state().started_at(),
        tracker.events(),
    )
    .unwrap();
    assert_eq!(replayed.state(), tracker.state());
    assert!(matches!(
        replayed.events().last(),
        Some(SessionEvent::SessionEnded { .. })
    ));
}

#[test]
fn progress_reflects_visits_and_answers() {
    let mut tracker = SessionTracker::start(Clock::fixed(fixed_now()), catalog());
    tracker.visit_topic("normalization").unwrap();
    tracker.submit_answer("normalization.q1", 1).unwrap();

    let progress = tracker.progress();
    let normalization = progress
        .topics
        .iter()
        .find(|t| t.topic.as_str() == "normalization")
        .unwrap();
    assert!(normalization.visited);
    assert_eq!(normalization.questions, 2);
    assert_eq!(normalization.answered, 1);
    assert!(!normalization.is_mastered());
    assert_eq!(progress.total_questions, 15);
}

#[tokio::test]
async fn concurrent_sessions_do_not_interfere() {
    let registry = Arc::new(SessionRegistry::new(Clock::fixed(fixed_now()), catalog()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            let id = registry.start().unwrap();
            registry.visit_topic(id, "joins").await.unwrap();
            // even sessions answer correctly
            let answer = if i % 2 == 0 { 3 } else { 0 };
            registry.submit_answer(id, "joins.q1", answer).await.unwrap();
            (i, id)
        }));
    }

    for handle in handles {
        let (i, id) = handle.await.unwrap();
        let score = registry.score(id).await.unwrap();
        assert_eq!(score.answered, 1);
        assert_eq!(score.correct, u32::from(i % 2 == 0));
    }
    assert_eq!(registry.len().unwrap(), 8);
}

#[tokio::test]
async fn ended_sessions_stay_readable_in_the_registry() {
    let registry = SessionRegistry::new(Clock::fixed(fixed_now()), catalog());
    let id = registry.start().unwrap();
    registry.submit_answer(id, "joins.q1", 3).await.unwrap();
    registry.end(id).await.unwrap();

    let err = registry.end(id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionEnded);
    let err = registry
        .submit_selection(id, "views.q1", &[0])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionEnded);

    assert_eq!(registry.score(id).await.unwrap().correct, 1);
    assert!(registry.progress(id).await.unwrap().topics[1].answered == 1);
}
