mod common;

use common::{failed_precondition, Harness, MIDGAME_FEN};
use shared::models::game_session::{
    Color, Outcome, Presence, SessionStatus, TerminationReason, Winner,
};
use shared::models::requests::GameAction;
use shared::models::responses::ActionOutcome;
use shared::services::errors::game_service_errors::GameServiceError;

const MIDGAME_BLACK_TO_MOVE: &str =
    "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 2 7";

async fn rated_game(h: &Harness) -> String {
    h.start_game_with("alice", "bob", |s| s.fen = MIDGAME_FEN.to_string())
        .await
}

#[tokio::test]
async fn test_draw_offer_decline_and_accept() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = h.start_game("alice", "bob").await;

    assert_eq!(h.act(&id, "alice", GameAction::OfferDraw).await?, ActionOutcome::Applied);
    assert_eq!(h.session(&id).await.draw_offer_from, Some(Color::White));
    assert_eq!(
        failed_precondition(h.act(&id, "alice", GameAction::AcceptDraw).await),
        "No valid draw offer to accept."
    );

    assert_eq!(h.act(&id, "bob", GameAction::DeclineDraw).await?, ActionOutcome::Applied);
    assert_eq!(h.session(&id).await.draw_offer_from, None);
    assert_eq!(
        failed_precondition(h.act(&id, "bob", GameAction::DeclineDraw).await),
        "No valid draw offer to decline."
    );

    h.act(&id, "alice", GameAction::OfferDraw).await?;
    let outcome = h.act(&id, "bob", GameAction::AcceptDraw).await?;

    assert_eq!(
        outcome,
        ActionOutcome::Finished {
            winner: Some(Winner::Draw),
            outcome: Outcome::new(TerminationReason::AgreedDraw),
        }
    );
    let session = h.session(&id).await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.draw_offer_from, None);
    Ok(())
}

#[tokio::test]
async fn test_a_move_withdraws_the_draw_offer() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = h.start_game("alice", "bob").await;

    h.act(&id, "alice", GameAction::OfferDraw).await?;
    h.play(&id, "alice", "e2e4").await?;

    assert_eq!(h.session(&id).await.draw_offer_from, None);
    Ok(())
}

#[tokio::test]
async fn test_rated_resignation() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = rated_game(&h).await;

    let outcome = h.act(&id, "alice", GameAction::Resign).await?;

    assert_eq!(
        outcome,
        ActionOutcome::Finished {
            winner: Some(Winner::Black),
            outcome: Outcome::new(TerminationReason::Resignation),
        }
    );
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    assert_eq!(alice.rating, Some(1185));
    assert_eq!(alice.stats.losses, 1);
    assert_eq!(bob.rating, Some(1235));
    assert_eq!(bob.stats.wins, 1);

    let session = h.session(&id).await;
    let deltas = session.rating_deltas.unwrap();
    assert_eq!((deltas.white, deltas.black), (-15, 15));

    let replay = h.act(&id, "alice", GameAction::Resign).await?;
    assert_eq!(
        replay,
        ActionOutcome::AlreadyCompleted {
            outcome: Some(Outcome::new(TerminationReason::Resignation)),
        }
    );
    assert_eq!(h.session(&id).await, session);
    assert_eq!(h.user("alice").await.rating, Some(1185));
    Ok(())
}

#[tokio::test]
async fn test_early_resignation_is_unrated() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = h.start_game("alice", "bob").await;

    let outcome = h.act(&id, "bob", GameAction::Resign).await?;

    assert_eq!(
        outcome,
        ActionOutcome::Finished {
            winner: Some(Winner::White),
            outcome: Outcome::unrated_early_end(TerminationReason::Resignation),
        }
    );
    assert_eq!(h.user("bob").await.rating, Some(1220));
    assert!(h.session(&id).await.elo_applied);
    Ok(())
}

#[tokio::test]
async fn test_resigning_a_waiting_game_is_rejected() {
    let h = Harness::new().await;
    let id = h
        .start_game_with("alice", "bob", |s| s.status = SessionStatus::Waiting)
        .await;

    assert_eq!(
        failed_precondition(h.act(&id, "alice", GameAction::Resign).await),
        "Game is not active."
    );
    assert_eq!(h.session(&id).await.status, SessionStatus::Waiting);
}

#[tokio::test]
async fn test_outsider_actions_are_denied() {
    let h = Harness::new().await;
    let id = h.start_game("alice", "bob").await;

    for action in [GameAction::Resign, GameAction::OfferDraw, GameAction::OfferRematch] {
        let result = h.act(&id, "carol", action).await;
        assert!(
            matches!(result, Err(GameServiceError::PermissionDenied(ref msg)) if msg == "Not a participant."),
            "{:?} gave {:?}",
            action,
            result
        );
    }
}

#[tokio::test]
async fn test_racing_resignation_and_timeout_settle_once() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = h
        .start_game_with("alice", "bob", |s| {
            s.fen = MIDGAME_BLACK_TO_MOVE.to_string();
            s.turn = Color::Black;
            s.black_time_left = 5;
        })
        .await;
    h.advance_secs(10);

    let (claim, resign) = tokio::join!(
        h.games.claim_timeout(&id, "alice"),
        h.act(&id, "bob", GameAction::Resign)
    );

    let finished = [&claim, &resign]
        .iter()
        .filter(|result| matches!(result, Ok(ActionOutcome::Finished { .. })))
        .count();
    assert_eq!(finished, 1, "claim: {:?}, resign: {:?}", claim, resign);

    let session = h.session(&id).await;
    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.winner, Some(Winner::White));
    assert_eq!(h.user("alice").await.rating, Some(1217));
    assert_eq!(h.user("bob").await.rating, Some(1203));
    Ok(())
}

#[tokio::test]
async fn test_presence_updates() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = h.start_game("alice", "bob").await;

    h.act(&id, "bob", GameAction::UpdateStatus(Presence::Disconnected)).await?;
    let first = h.session(&id).await.black_disconnected_at;
    assert!(first.is_some());

    h.advance_secs(5);
    h.act(&id, "bob", GameAction::UpdateStatus(Presence::Disconnected)).await?;
    let session = h.session(&id).await;
    assert_eq!(session.black_disconnected_at, first);
    assert_eq!(session.black_presence, Presence::Disconnected);

    h.act(&id, "bob", GameAction::UpdateStatus(Presence::Online)).await?;
    let session = h.session(&id).await;
    assert_eq!(session.black_disconnected_at, None);
    assert_eq!(session.black_presence, Presence::Online);
    Ok(())
}

#[tokio::test]
async fn test_presence_on_finished_game() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = h.start_game("alice", "bob").await;
    h.act(&id, "alice", GameAction::Resign).await?;
    let finished = h.session(&id).await;

    let outcome = h
        .act(&id, "bob", GameAction::UpdateStatus(Presence::Disconnected))
        .await?;

    assert!(matches!(outcome, ActionOutcome::AlreadyCompleted { .. }));
    assert_eq!(h.session(&id).await, finished);
    Ok(())
}

#[tokio::test]
async fn test_rematch_swaps_colors_and_replays() -> anyhow::Result<()> {
    let h = Harness::new().await;
    let id = rated_game(&h).await;

    assert_eq!(
        failed_precondition(h.act(&id, "alice", GameAction::OfferRematch).await),
        "Game is not completed."
    );
    h.act(&id, "alice", GameAction::Resign).await?;

    assert_eq!(
        failed_precondition(h.actions.accept_rematch(&id, "bob").await.map(|_| ActionOutcome::Applied)),
        "No valid rematch offer to accept."
    );
    h.act(&id, "alice", GameAction::OfferRematch).await?;
    assert_eq!(h.session(&id).await.rematch_offer_from.as_deref(), Some("alice"));
    assert_eq!(
        failed_precondition(h.actions.accept_rematch(&id, "alice").await.map(|_| ActionOutcome::Applied)),
        "No valid rematch offer to accept."
    );

    let rematch_id = h.actions.accept_rematch(&id, "bob").await?;

    let rematch = h.session(&rematch_id).await;
    assert_eq!(rematch.player_white_id, "bob");
    assert_eq!(rematch.player_black_id.as_deref(), Some("alice"));
    assert_eq!(rematch.status, SessionStatus::InProgress);
    assert_eq!(rematch.initial_time, 300);
    assert_eq!(rematch.white_profile.rating, 1235);

    let previous = h.session(&id).await;
    assert_eq!(previous.next_session_id.as_deref(), Some(rematch_id.as_str()));
    assert_eq!(previous.rematch_offer_from, None);

    assert_eq!(h.actions.accept_rematch(&id, "bob").await?, rematch_id);
    assert_eq!(h.actions.accept_rematch(&id, "alice").await?, rematch_id);

    let outsider = h.actions.accept_rematch(&id, "carol").await;
    assert!(matches!(outsider, Err(GameServiceError::PermissionDenied(_))));
    Ok(())
}
