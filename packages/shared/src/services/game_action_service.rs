use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::{
    config::GameConfig,
    models::{
        game_session::{GameSession, Presence, SessionStatus, TerminationReason, Verdict},
        requests::GameAction,
        responses::ActionOutcome,
        user::PlayerProfile,
    },
    repositories::{
        session_store::SessionStore,
        transaction::{Transaction, TransactionBody, TransactionRunner},
    },
    services::{
        clock::Clock,
        errors::game_service_errors::GameServiceError,
        game_session_service::{load_session, participant_color},
        rating_service::finalize_session,
    },
};

/// Draw, resignation, rematch and presence actions.
#[derive(Clone)]
pub struct GameActionService {
    runner: TransactionRunner,
    clock: Arc<dyn Clock>,
    config: GameConfig,
}

impl GameActionService {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: GameConfig) -> Self {
        GameActionService {
            runner: TransactionRunner::new(store, config.max_transaction_attempts),
            clock,
            config,
        }
    }

    pub async fn handle_game_action(
        &self,
        session_id: &str,
        user_id: &str,
        action: GameAction,
    ) -> Result<ActionOutcome, GameServiceError> {
        let outcome = self
            .runner
            .run(&HandleAction {
                service: self,
                session_id,
                user_id,
                action,
            })
            .await?;
        info!("{:?} by {} in session {}: {:?}", action, user_id, session_id, outcome);
        Ok(outcome)
    }

    /// Starts the rematch offered by the other player and returns the new session id.
    /// Replays return the session created the first time.
    pub async fn accept_rematch(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<String, GameServiceError> {
        let new_session_id = self
            .runner
            .run(&AcceptRematch {
                service: self,
                session_id,
                user_id,
            })
            .await?;
        info!("Rematch of {} accepted by {}: {}", session_id, user_id, new_session_id);
        Ok(new_session_id)
    }
}

fn require_status(
    session: &GameSession,
    status: SessionStatus,
    message: &str,
) -> Result<(), GameServiceError> {
    if session.status != status {
        return Err(GameServiceError::FailedPrecondition(message.to_string()));
    }
    Ok(())
}

struct HandleAction<'a> {
    service: &'a GameActionService,
    session_id: &'a str,
    user_id: &'a str,
    action: GameAction,
}

#[async_trait]
impl<'a> TransactionBody for HandleAction<'a> {
    type Output = ActionOutcome;

    async fn run(&self, tx: &mut Transaction) -> Result<ActionOutcome, GameServiceError> {
        let now = self.service.clock.now();
        let config = &self.service.config;
        let mut session = load_session(tx, self.session_id).await?;
        let color = participant_color(&session, self.user_id)?;

        match self.action {
            GameAction::Resign => {
                // A finished game falls through: the finalizer replays its outcome.
                if session.status == SessionStatus::Waiting {
                    return Err(GameServiceError::FailedPrecondition(
                        "Game is not active.".to_string(),
                    ));
                }
                finalize_session(
                    tx,
                    session,
                    Verdict::from(color.opponent()),
                    TerminationReason::Resignation,
                    config,
                    now,
                )
                .await
            }
            GameAction::OfferDraw => {
                require_status(&session, SessionStatus::InProgress, "Game is not active.")?;
                if session.draw_offer_from != Some(color) {
                    session.draw_offer_from = Some(color);
                    tx.put_session(session);
                }
                Ok(ActionOutcome::Applied)
            }
            GameAction::AcceptDraw => {
                require_status(&session, SessionStatus::InProgress, "Game is not active.")?;
                if session.draw_offer_from != Some(color.opponent()) {
                    return Err(GameServiceError::FailedPrecondition(
                        "No valid draw offer to accept.".to_string(),
                    ));
                }
                session.draw_offer_from = None;
                finalize_session(
                    tx,
                    session,
                    Verdict::Draw,
                    TerminationReason::AgreedDraw,
                    config,
                    now,
                )
                .await
            }
            GameAction::DeclineDraw => {
                require_status(&session, SessionStatus::InProgress, "Game is not active.")?;
                if session.draw_offer_from != Some(color.opponent()) {
                    return Err(GameServiceError::FailedPrecondition(
                        "No valid draw offer to decline.".to_string(),
                    ));
                }
                session.draw_offer_from = None;
                tx.put_session(session);
                Ok(ActionOutcome::Applied)
            }
            GameAction::OfferRematch => {
                require_status(&session, SessionStatus::Completed, "Game is not completed.")?;
                if session.rematch_offer_from.as_deref() != Some(self.user_id) {
                    session.rematch_offer_from = Some(self.user_id.to_string());
                    tx.put_session(session);
                }
                Ok(ActionOutcome::Applied)
            }
            GameAction::UpdateStatus(_) if session.status.is_terminal() => {
                Ok(ActionOutcome::AlreadyCompleted {
                    outcome: session.outcome,
                })
            }
            GameAction::UpdateStatus(presence) => {
                let before = (session.presence(color), session.disconnected_at(color));
                match presence {
                    // Re-sending `disconnected` keeps the first timestamp.
                    Presence::Disconnected if before.0 != Presence::Disconnected => {
                        session.set_disconnected_at(color, Some(now));
                    }
                    Presence::Disconnected => {}
                    Presence::Online => session.set_disconnected_at(color, None),
                }
                session.set_presence(color, presence);
                if (session.presence(color), session.disconnected_at(color)) != before {
                    tx.put_session(session);
                }
                Ok(ActionOutcome::Applied)
            }
        }
    }
}

struct AcceptRematch<'a> {
    service: &'a GameActionService,
    session_id: &'a str,
    user_id: &'a str,
}

#[async_trait]
impl<'a> TransactionBody for AcceptRematch<'a> {
    type Output = String;

    async fn run(&self, tx: &mut Transaction) -> Result<String, GameServiceError> {
        let now = self.service.clock.now();
        let config = &self.service.config;
        let mut previous = load_session(tx, self.session_id).await?;

        require_status(&previous, SessionStatus::Completed, "Game is not completed.")?;
        if !previous.elo_applied {
            return Err(GameServiceError::FailedPrecondition(
                "ELO calculation pending. Please wait.".to_string(),
            ));
        }
        let (old_white, old_black) = match previous.player_black_id.clone() {
            Some(black) if previous.has_both_players() => (previous.player_white_id.clone(), black),
            _ => {
                return Err(GameServiceError::FailedPrecondition(
                    "Both players are required for a rematch.".to_string(),
                ))
            }
        };
        participant_color(&previous, self.user_id)?;

        if let Some(next_session_id) = &previous.next_session_id {
            return Ok(next_session_id.clone());
        }

        let offered_by_opponent = previous
            .rematch_offer_from
            .as_deref()
            .is_some_and(|offerer| offerer != self.user_id && previous.color_of(offerer).is_some());
        if !offered_by_opponent {
            return Err(GameServiceError::FailedPrecondition(
                "No valid rematch offer to accept.".to_string(),
            ));
        }

        // Colors swap: the previous black player opens the rematch.
        let new_white = tx.get_user(&old_black).await?;
        let new_black = tx.get_user(&old_white).await?;
        let (new_white, new_black) = match (new_white, new_black) {
            (Some(white), Some(black)) => (white, black),
            _ => {
                return Err(GameServiceError::NotFound(
                    "Could not find user profiles.".to_string(),
                ))
            }
        };

        let time_control = if previous.initial_time > 0 {
            previous.initial_time
        } else {
            config.default_initial_time
        };
        let rematch = GameSession::new(
            (&old_black, PlayerProfile::from_user(&new_white, config.default_rating)),
            (&old_white, PlayerProfile::from_user(&new_black, config.default_rating)),
            time_control,
            now,
        );
        let rematch_id = rematch.session_id.clone();

        previous.next_session_id = Some(rematch_id.clone());
        previous.rematch_offer_from = None;
        tx.put_session(rematch);
        tx.put_session(previous);

        Ok(rematch_id)
    }
}
