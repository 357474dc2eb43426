use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::GameConfig;
use crate::models::game_session::{
    Color, GameSession, Outcome, RatingDeltas, SessionStatus, TerminationReason, Verdict, Winner,
};
use crate::models::responses::ActionOutcome;
use crate::models::user::User;
use crate::repositories::transaction::Transaction;
use crate::services::errors::game_service_errors::GameServiceError;

/// Expected score of a player rated `rating` against `opponent`.
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) as f64 / 400.0))
}

/// New rating after scoring `score` (1, 0.5 or 0). Halves round up.
pub fn updated_rating(rating: i32, opponent: i32, score: f64, k_factor: i32) -> i32 {
    let raw = rating as f64 + k_factor as f64 * (score - expected_score(rating, opponent));
    (raw + 0.5).floor() as i32
}

/// New `(white, black)` ratings for a finished game.
pub fn rate_game(white: i32, black: i32, winner: Winner, k_factor: i32) -> (i32, i32) {
    let (white_score, black_score) = match winner {
        Winner::White => (1.0, 0.0),
        Winner::Black => (0.0, 1.0),
        Winner::Draw => (0.5, 0.5),
    };
    (
        updated_rating(white, black, white_score, k_factor),
        updated_rating(black, white, black_score, k_factor),
    )
}

fn record_result(user: &mut User, color: Color, winner: Winner) {
    match winner {
        Winner::Draw => user.stats.draws += 1,
        w if w == Winner::from(color) => user.stats.wins += 1,
        _ => user.stats.losses += 1,
    }
}

fn close(session: &mut GameSession, verdict: Verdict, outcome: Outcome, now: DateTime<Utc>) {
    session.status = if outcome.reason == TerminationReason::Corruption {
        SessionStatus::Error
    } else {
        SessionStatus::Completed
    };
    session.winner = verdict.winner();
    session.outcome = Some(outcome);
    session.elo_applied = true;
    session.draw_offer_from = None;
    session.pending_promotion = None;
    session.completed_at = Some(now);
}

/// Moves `session` to a terminal status and settles ratings in the same transaction.
///
/// A session that is already terminal is left untouched. Ratings change only for a decided
/// game between two seated players that reached the minimum move count; otherwise the
/// session closes unrated, and an early decisive result gets the unrated outcome suffix.
pub async fn finalize_session(
    tx: &mut Transaction,
    mut session: GameSession,
    verdict: Verdict,
    reason: TerminationReason,
    config: &GameConfig,
    now: DateTime<Utc>,
) -> Result<ActionOutcome, GameServiceError> {
    if session.status.is_terminal() {
        return Ok(ActionOutcome::AlreadyCompleted {
            outcome: session.outcome,
        });
    }

    let early = session.move_count() < config.min_moves_for_rating;
    let winner = match verdict.winner() {
        Some(winner) if session.has_both_players() && !early => winner,
        _ => {
            let outcome = if early && verdict.is_decisive() && reason != TerminationReason::Corruption {
                Outcome::unrated_early_end(reason)
            } else {
                Outcome::new(reason)
            };
            debug!("Closing session {} unrated: {}", session.session_id, outcome);
            close(&mut session, verdict, outcome, now);
            tx.put_session(session);
            return Ok(ActionOutcome::Finished {
                winner: verdict.winner(),
                outcome,
            });
        }
    };

    let outcome = Outcome::new(reason);
    let white_id = session.player_white_id.clone();
    let black_id = session.player_black_id.clone().unwrap_or_default();
    let white = tx.get_user(&white_id).await?;
    let black = tx.get_user(&black_id).await?;

    let (mut white, mut black) = match (white, black) {
        (Some(white), Some(black)) => (white, black),
        _ => {
            debug!("Rating record missing for session {}, closing unrated", session.session_id);
            close(&mut session, verdict, outcome, now);
            tx.put_session(session);
            return Ok(ActionOutcome::Finished {
                winner: Some(winner),
                outcome,
            });
        }
    };

    let white_rating = white.rating_or(config.default_rating);
    let black_rating = black.rating_or(config.default_rating);
    let (new_white, new_black) = rate_game(white_rating, black_rating, winner, config.k_factor);

    white.rating = Some(new_white);
    black.rating = Some(new_black);
    record_result(&mut white, Color::White, winner);
    record_result(&mut black, Color::Black, winner);

    close(&mut session, verdict, outcome, now);
    session.rating_deltas = Some(RatingDeltas {
        white: new_white - white_rating,
        black: new_black - black_rating,
    });

    tx.put_user(white);
    tx.put_user(black);
    tx.put_session(session);

    Ok(ActionOutcome::Finished {
        winner: Some(winner),
        outcome,
    })
}
