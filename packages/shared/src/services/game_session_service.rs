use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    config::GameConfig,
    models::{
        game_session::{
            position_key, Color, GameSession, PendingPromotion, Presence, SessionStatus,
            TerminationReason, Verdict,
        },
        requests::{MoveCommand, PromotionPiece, UciMove},
        responses::ActionOutcome,
    },
    repositories::{
        session_store::SessionStore,
        transaction::{Transaction, TransactionBody, TransactionRunner},
    },
    services::{
        chess_service::RulesEngine,
        clock::{charge, elapsed_seconds_ceil, Clock, ClockCharge},
        errors::game_service_errors::GameServiceError,
        rating_service::finalize_session,
    },
};

pub(crate) async fn load_session(
    tx: &mut Transaction,
    session_id: &str,
) -> Result<GameSession, GameServiceError> {
    tx.get_session(session_id)
        .await?
        .ok_or_else(|| GameServiceError::NotFound("Game not found.".to_string()))
}

pub(crate) fn participant_color(
    session: &GameSession,
    user_id: &str,
) -> Result<Color, GameServiceError> {
    session
        .color_of(user_id)
        .ok_or_else(|| GameServiceError::PermissionDenied("Not a participant.".to_string()))
}

fn not_active() -> GameServiceError {
    GameServiceError::FailedPrecondition("Game is not active.".to_string())
}

/// Moves, clock claims and abandonment claims on a running game.
#[derive(Clone)]
pub struct GameSessionService {
    runner: TransactionRunner,
    rules: Arc<dyn RulesEngine>,
    clock: Arc<dyn Clock>,
    config: GameConfig,
}

impl GameSessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        rules: Arc<dyn RulesEngine>,
        clock: Arc<dyn Clock>,
        config: GameConfig,
    ) -> Self {
        GameSessionService {
            runner: TransactionRunner::new(store, config.max_transaction_attempts),
            rules,
            clock,
            config,
        }
    }

    pub async fn make_move(
        &self,
        session_id: &str,
        user_id: &str,
        command: &MoveCommand,
    ) -> Result<ActionOutcome, GameServiceError> {
        let body = MakeMove {
            service: self,
            session_id,
            user_id,
            command,
        };
        match self.runner.run(&body).await? {
            Ok(outcome) => {
                info!("Move by {} in session {}: {:?}", user_id, session_id, outcome);
                Ok(outcome)
            }
            Err(err) => {
                warn!("Session {} closed: {}", session_id, err);
                Err(err)
            }
        }
    }

    pub async fn claim_timeout(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<ActionOutcome, GameServiceError> {
        let outcome = self
            .runner
            .run(&ClaimTimeout {
                service: self,
                session_id,
                user_id,
            })
            .await?;
        info!("Timeout claim by {} in session {}: {:?}", user_id, session_id, outcome);
        Ok(outcome)
    }

    pub async fn claim_abandonment(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<ActionOutcome, GameServiceError> {
        let outcome = self
            .runner
            .run(&ClaimAbandonment {
                service: self,
                session_id,
                user_id,
            })
            .await?;
        info!("Abandonment claim by {} in session {}: {:?}", user_id, session_id, outcome);
        Ok(outcome)
    }
}

struct MakeMove<'a> {
    service: &'a GameSessionService,
    session_id: &'a str,
    user_id: &'a str,
    command: &'a MoveCommand,
}

impl<'a> MakeMove<'a> {
    fn internal(err: impl std::fmt::Display) -> GameServiceError {
        GameServiceError::Internal(format!("Rules engine failure: {}", err))
    }

    /// The move to play: the staged squares plus the chosen piece, or the submitted move.
    fn resolve_move(&self, session: &GameSession, finalizing: bool) -> Result<UciMove, GameServiceError> {
        if finalizing {
            let piece = self.command.promotion_piece().ok_or_else(|| {
                GameServiceError::ValidationError("Missing promotion piece.".to_string())
            })?;
            let pending = session
                .pending_promotion
                .as_ref()
                .ok_or_else(|| GameServiceError::Internal("Promotion vanished.".to_string()))?;
            return Ok(UciMove {
                from: pending.from.clone(),
                to: pending.to.clone(),
                promotion: Some(piece),
            });
        }

        let uci = self
            .command
            .uci
            .as_ref()
            .ok_or_else(|| GameServiceError::ValidationError("Missing move UCI.".to_string()))?;
        Ok(match (uci.promotion, self.command.promotion) {
            (None, Some(piece)) => uci.with_promotion(piece),
            _ => uci.clone(),
        })
    }
}

#[async_trait]
impl<'a> TransactionBody for MakeMove<'a> {
    type Output = Result<ActionOutcome, GameServiceError>;

    async fn run(&self, tx: &mut Transaction) -> Result<Self::Output, GameServiceError> {
        let config = &self.service.config;
        let rules = &self.service.rules;
        let now = self.service.clock.now();
        let mut session = load_session(tx, self.session_id).await?;

        match session.status {
            SessionStatus::Waiting => {
                return Err(GameServiceError::FailedPrecondition(
                    "Waiting for opponent to join.".to_string(),
                ))
            }
            SessionStatus::Completed | SessionStatus::Error => {
                return Ok(Ok(ActionOutcome::AlreadyCompleted {
                    outcome: session.outcome,
                }))
            }
            SessionStatus::InProgress => {}
        }
        if !session.has_both_players() {
            return Err(GameServiceError::FailedPrecondition(
                "Waiting for opponent to join.".to_string(),
            ));
        }
        let color = participant_color(&session, self.user_id)?;

        let finalizing = session.pending_promotion.as_ref().map(|p| p.color) == Some(color);
        let my_turn = session.turn == color;

        let mut time_left = session.time_left(color);
        if my_turn && !finalizing {
            match charge(time_left, session.last_move_at, now) {
                ClockCharge::Remaining(left) => time_left = left,
                ClockCharge::Flagged => {
                    debug!("{} flagged in session {}", color, session.session_id);
                    session.set_time_left(color, 0);
                    session.last_move_at = Some(now);
                    session.pending_promotion = None;
                    let outcome = finalize_session(
                        tx,
                        session,
                        Verdict::from(color.opponent()),
                        TerminationReason::Timeout,
                        config,
                        now,
                    )
                    .await?;
                    return Ok(Ok(outcome));
                }
            }
        }
        if !my_turn && !finalizing {
            return Err(GameServiceError::FailedPrecondition("Not your turn.".to_string()));
        }

        if let Err(err) = rules.load(&session.fen) {
            debug!("Unreadable board in session {}: {}", session.session_id, err);
            finalize_session(
                tx,
                session,
                Verdict::None,
                TerminationReason::Corruption,
                config,
                now,
            )
            .await?;
            return Ok(Err(GameServiceError::Corrupted));
        }

        let mv = self.resolve_move(&session, finalizing)?;

        let reaches_last_rank = mv.to.ends_with(color.promotion_rank());
        if !finalizing
            && mv.promotion.is_none()
            && reaches_last_rank
            && rules
                .is_pawn_of(&session.fen, &mv.from, color)
                .map_err(Self::internal)?
        {
            let probe = mv.with_promotion(PromotionPiece::Queen);
            if rules
                .apply_move(&session.fen, &probe, &session.position_history)
                .map_err(Self::internal)?
                .is_some()
            {
                session.pending_promotion = Some(PendingPromotion {
                    from: mv.from.clone(),
                    to: mv.to.clone(),
                    color,
                });
                session.set_disconnected_at(color, None);
                session.set_presence(color, Presence::Online);
                session.set_time_left(color, time_left);
                session.last_move_at = Some(now);
                tx.put_session(session);
                return Ok(Ok(ActionOutcome::PromotionRequired));
            }
        }

        let applied = rules
            .apply_move(&session.fen, &mv, &session.position_history)
            .map_err(Self::internal)?
            .ok_or_else(|| GameServiceError::FailedPrecondition("Invalid move.".to_string()))?;

        session.fen = applied.fen;
        session.turn = applied.side_to_move;
        session.last_move_at = Some(now);
        session.draw_offer_from = None;
        session.pending_promotion = None;
        session.set_disconnected_at(color, None);
        session.set_presence(color, Presence::Online);
        if !finalizing {
            session.set_time_left(color, time_left);
        }
        session.move_history.push(mv.to_uci());
        session
            .position_history
            .push(position_key(&session.fen));

        match applied.terminal {
            Some(reason) => {
                let verdict = if reason == TerminationReason::Checkmate {
                    Verdict::from(color)
                } else {
                    Verdict::Draw
                };
                let outcome = finalize_session(tx, session, verdict, reason, config, now).await?;
                Ok(Ok(outcome))
            }
            None => {
                tx.put_session(session);
                Ok(Ok(ActionOutcome::Applied))
            }
        }
    }
}

struct ClaimTimeout<'a> {
    service: &'a GameSessionService,
    session_id: &'a str,
    user_id: &'a str,
}

#[async_trait]
impl<'a> TransactionBody for ClaimTimeout<'a> {
    type Output = ActionOutcome;

    async fn run(&self, tx: &mut Transaction) -> Result<ActionOutcome, GameServiceError> {
        let now = self.service.clock.now();
        let mut session = load_session(tx, self.session_id).await?;

        match session.status {
            SessionStatus::Completed | SessionStatus::Error => {
                return Ok(ActionOutcome::AlreadyCompleted {
                    outcome: session.outcome,
                })
            }
            SessionStatus::Waiting => return Err(not_active()),
            SessionStatus::InProgress => {}
        }
        let color = participant_color(&session, self.user_id)?;
        let opponent = session.turn;

        if session.pending_promotion.as_ref().map(|p| p.color) == Some(opponent) {
            return Err(GameServiceError::FailedPrecondition(
                "Opponent is selecting promotion. Clock is paused.".to_string(),
            ));
        }
        if opponent == color {
            return Err(GameServiceError::FailedPrecondition(
                "Cannot claim timeout on your own turn.".to_string(),
            ));
        }

        match charge(session.time_left(opponent), session.last_move_at, now) {
            ClockCharge::Remaining(left) => Err(GameServiceError::FailedPrecondition(format!(
                "Opponent has not timed out yet. Remaining: {}s",
                left
            ))),
            ClockCharge::Flagged => {
                session.set_time_left(opponent, 0);
                session.last_move_at = Some(now);
                session.pending_promotion = None;
                finalize_session(
                    tx,
                    session,
                    Verdict::from(color),
                    TerminationReason::Timeout,
                    &self.service.config,
                    now,
                )
                .await
            }
        }
    }
}

struct ClaimAbandonment<'a> {
    service: &'a GameSessionService,
    session_id: &'a str,
    user_id: &'a str,
}

#[async_trait]
impl<'a> TransactionBody for ClaimAbandonment<'a> {
    type Output = ActionOutcome;

    async fn run(&self, tx: &mut Transaction) -> Result<ActionOutcome, GameServiceError> {
        let now = self.service.clock.now();
        let grace = self.service.config.abandonment_grace;
        let session = load_session(tx, self.session_id).await?;

        match session.status {
            SessionStatus::Completed | SessionStatus::Error => {
                return Ok(ActionOutcome::AlreadyCompleted {
                    outcome: session.outcome,
                })
            }
            SessionStatus::Waiting => return Err(not_active()),
            SessionStatus::InProgress => {}
        }
        let color = participant_color(&session, self.user_id)?;

        let disconnected_at = session.disconnected_at(color.opponent()).ok_or_else(|| {
            GameServiceError::FailedPrecondition("Opponent is not disconnected.".to_string())
        })?;
        let away = now - disconnected_at;
        if away < grace {
            let wait = elapsed_seconds_ceil(now, disconnected_at + grace);
            return Err(GameServiceError::FailedPrecondition(format!(
                "Grace period has not expired yet. Wait {}s.",
                wait
            )));
        }

        let outcome = finalize_session(
            tx,
            session,
            Verdict::from(color),
            TerminationReason::Abandonment,
            &self.service.config,
            now,
        )
        .await?;
        Ok(outcome)
    }
}
