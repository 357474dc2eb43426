mod common;

use chrono::Duration;
use std::sync::Arc;
use common::{Harness, YieldingStore};
use shared::models::game_session::SessionStatus;
use shared::models::queue::QueueEntry;
use shared::models::requests::{EnqueueRequest, TimeControl};
use shared::models::responses::EnqueueResult;
use shared::models::user::{PlayerProfile, User};
use shared::repositories::session_store::SessionStore;
use shared::services::errors::game_service_errors::GameServiceError;
use shared::services::matchmaking_service::MatchmakingService;
use test_case::test_case;

fn tc(seconds: i64) -> TimeControl {
    EnqueueRequest {
        time_control: seconds,
    }
    .validate()
    .unwrap()
}

fn matched_id(result: EnqueueResult) -> String {
    match result {
        EnqueueResult::Matched { session_id } => session_id,
        EnqueueResult::Waiting => panic!("expected a match"),
    }
}

#[tokio::test]
async fn test_two_players_are_paired() -> anyhow::Result<()> {
    let h = Harness::new().await;

    assert_eq!(h.matchmaking.enqueue("alice", tc(300)).await?, EnqueueResult::Waiting);
    let session_id = matched_id(h.matchmaking.enqueue("bob", tc(300)).await?);

    let session = h.session(&session_id).await;
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.initial_time, 300);
    assert_eq!((session.white_time_left, session.black_time_left), (300, 300));
    let mut seated = session.participants.clone();
    seated.sort();
    assert_eq!(seated, vec!["alice", "bob"]);

    let alice_row = h.store.get_queue_entry("alice").await?.unwrap();
    assert_eq!(alice_row.matched_session_id.as_deref(), Some(session_id.as_str()));
    assert!(h.store.get_queue_entry("bob").await?.is_none());

    // The waiting player learns about the game on the next call.
    let again = h.matchmaking.enqueue("alice", tc(300)).await?;
    assert_eq!(matched_id(again), session_id);
    assert!(h.store.get_queue_entry("alice").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_enqueue_is_idempotent() -> anyhow::Result<()> {
    let h = Harness::new().await;

    h.matchmaking.enqueue("alice", tc(300)).await?;
    let first = h.store.get_queue_entry("alice").await?.unwrap();
    h.advance_secs(5);
    assert_eq!(h.matchmaking.enqueue("alice", tc(300)).await?, EnqueueResult::Waiting);

    assert_eq!(h.store.queue_len().await, 1);
    assert_eq!(h.store.get_queue_entry("alice").await?.unwrap(), first);
    Ok(())
}

#[tokio::test]
async fn test_changing_time_control_replaces_the_row() -> anyhow::Result<()> {
    let h = Harness::new().await;

    h.matchmaking.enqueue("alice", tc(300)).await?;
    assert_eq!(h.matchmaking.enqueue("alice", tc(600)).await?, EnqueueResult::Waiting);

    assert_eq!(h.store.queue_len().await, 1);
    assert_eq!(h.store.get_queue_entry("alice").await?.unwrap().time_control, 600);
    Ok(())
}

#[tokio::test]
async fn test_different_time_controls_do_not_pair() -> anyhow::Result<()> {
    let h = Harness::new().await;

    h.matchmaking.enqueue("alice", tc(300)).await?;
    assert_eq!(h.matchmaking.enqueue("bob", tc(600)).await?, EnqueueResult::Waiting);

    assert_eq!(h.store.queue_len().await, 2);
    Ok(())
}

#[test_case(1349, false; "just outside the window")]
#[test_case(1350, true; "lower edge of the window")]
#[test_case(1650, true; "upper edge of the window")]
#[test_case(1651, false; "just above the window")]
#[tokio::test]
async fn test_rating_window(rating: i32, pairs: bool) -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.store.insert_user(User::new("dave", "Dave", rating)).await;

    h.matchmaking.enqueue("carol", tc(300)).await?;
    let result = h.matchmaking.enqueue("dave", tc(300)).await?;

    assert_eq!(matches!(result, EnqueueResult::Matched { .. }), pairs);
    Ok(())
}

#[tokio::test]
async fn test_unknown_user_cannot_enqueue() {
    let h = Harness::new().await;

    let result = h.matchmaking.enqueue("ghost", tc(300)).await;

    assert!(matches!(
        result,
        Err(GameServiceError::NotFound(msg)) if msg == "User profile not found."
    ));
}

#[tokio::test]
async fn test_player_in_a_game_gets_that_game() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = h.start_game("alice", "bob").await;

    let result = h.matchmaking.enqueue("alice", tc(300)).await?;

    assert_eq!(matched_id(result), id);
    assert_eq!(h.store.queue_len().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_matched_rows_are_not_candidates() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.matchmaking.enqueue("alice", tc(300)).await?;
    let session_id = matched_id(h.matchmaking.enqueue("bob", tc(300)).await?);

    h.store.insert_user(User::new("erin", "Erin", 1210)).await;
    let result = h.matchmaking.enqueue("erin", tc(300)).await?;

    assert_eq!(result, EnqueueResult::Waiting);
    let alice_row = h.store.get_queue_entry("alice").await?.unwrap();
    assert_eq!(alice_row.matched_session_id.as_deref(), Some(session_id.as_str()));
    Ok(())
}

#[tokio::test]
async fn test_dequeue() -> anyhow::Result<()> {
    let h = Harness::new().await;

    assert!(!h.matchmaking.dequeue("alice").await?);

    h.matchmaking.enqueue("alice", tc(300)).await?;
    assert!(h.matchmaking.dequeue("alice").await?);
    assert_eq!(h.store.queue_len().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_dequeue_keeps_a_matched_row() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.matchmaking.enqueue("alice", tc(300)).await?;
    h.matchmaking.enqueue("bob", tc(300)).await?;

    assert!(!h.matchmaking.dequeue("alice").await?);
    assert!(h.store.get_queue_entry("alice").await?.unwrap().is_matched());
    Ok(())
}

#[tokio::test]
async fn test_purge_removes_only_stale_waiting_rows() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let long_ago = h.now() - Duration::minutes(4);
    let entry = |user_id: &str, at| {
        QueueEntry::new(
            PlayerProfile {
                display_name: user_id.to_string(),
                rating: 1200,
                country_code: None,
                profile_image: None,
            },
            user_id,
            300,
            at,
        )
    };

    h.store.insert_queue_entry(entry("old-1", long_ago)).await;
    h.store.insert_queue_entry(entry("old-2", long_ago)).await;
    h.store.insert_queue_entry(entry("fresh", h.now())).await;
    let mut claimed = entry("claimed", long_ago);
    claimed.matched_session_id = Some("game-1".to_string());
    h.store.insert_queue_entry(claimed).await;

    assert_eq!(h.matchmaking.purge_stale_entries().await?, 2);

    assert_eq!(h.store.queue_len().await, 2);
    assert!(h.store.get_queue_entry("fresh").await?.is_some());
    assert!(h.store.get_queue_entry("claimed").await?.is_some());
    assert_eq!(h.matchmaking.purge_stale_entries().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_racing_enqueues_claim_the_waiting_player_once() -> anyhow::Result<()> {
    let h = Harness::new().await;
    h.store.insert_user(User::new("dave", "Dave", 1210)).await;
    let racing = MatchmakingService::new(
        Arc::new(YieldingStore::new(h.store.clone())),
        h.clock.clone(),
        h.config.clone(),
    );

    assert_eq!(h.matchmaking.enqueue("alice", tc(300)).await?, EnqueueResult::Waiting);

    let (bob, dave) = tokio::join!(
        racing.enqueue("bob", tc(300)),
        racing.enqueue("dave", tc(300))
    );

    let bob_paired = matches!(bob, Ok(EnqueueResult::Matched { .. }));
    let dave_paired = matches!(dave, Ok(EnqueueResult::Matched { .. }));
    assert!(bob_paired != dave_paired, "bob {:?}, dave {:?}", bob, dave);
    let (winner, winner_result, loser, loser_result) = if bob_paired {
        ("bob", bob, "dave", dave)
    } else {
        ("dave", dave, "bob", bob)
    };
    let session_id = matched_id(winner_result?);

    let alice_row = h.store.get_queue_entry("alice").await?.unwrap();
    assert_eq!(alice_row.matched_session_id.as_deref(), Some(session_id.as_str()));
    assert!(h.store.get_queue_entry(winner).await?.is_none());

    let session = h.session(&session_id).await;
    let mut seated = session.participants.clone();
    seated.sort();
    assert_eq!(seated, vec!["alice".to_string(), winner.to_string()]);

    match loser_result {
        Ok(EnqueueResult::Waiting) => {
            let row = h.store.get_queue_entry(loser).await?.unwrap();
            assert_eq!(row.matched_session_id, None);
        }
        Err(err) => assert!(err.is_retryable(), "{} failed with {:?}", loser, err),
        Ok(other) => panic!("{} was also paired: {:?}", loser, other),
    }
    assert!(h.store.find_active_session(loser).await?.is_none());
    Ok(())
}
