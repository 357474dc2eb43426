use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    config::GameConfig,
    models::{
        game_session::GameSession,
        queue::{CandidateQuery, QueueEntry},
        requests::TimeControl,
        responses::EnqueueResult,
        user::PlayerProfile,
    },
    repositories::{
        session_store::SessionStore,
        transaction::{Transaction, TransactionBody, TransactionRunner},
    },
    services::{clock::Clock, errors::game_service_errors::GameServiceError},
};

/// Queue admission and pairing.
#[derive(Clone)]
pub struct MatchmakingService {
    runner: TransactionRunner,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: GameConfig,
}

impl MatchmakingService {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, config: GameConfig) -> Self {
        MatchmakingService {
            runner: TransactionRunner::new(store.clone(), config.max_transaction_attempts),
            store,
            clock,
            config,
        }
    }

    /// Puts the caller in the queue, or pairs them with a waiting player of the same time
    /// control within the rating window.
    pub async fn enqueue(
        &self,
        user_id: &str,
        time_control: TimeControl,
    ) -> Result<EnqueueResult, GameServiceError> {
        let result = self
            .runner
            .run(&Enqueue {
                service: self,
                user_id,
                time_control: time_control.seconds(),
            })
            .await?;
        match &result {
            EnqueueResult::Matched { session_id } => {
                info!("{} matched into session {}", user_id, session_id)
            }
            EnqueueResult::Waiting => {
                info!("{} waiting for a {}s game", user_id, time_control.seconds())
            }
        }
        Ok(result)
    }

    /// Leaves the queue. Returns whether a waiting row was removed; a row already claimed by
    /// a pairing is kept.
    pub async fn dequeue(&self, user_id: &str) -> Result<bool, GameServiceError> {
        let removed = self.runner.run(&Dequeue { user_id }).await?;
        info!("{} left the queue (removed: {})", user_id, removed);
        Ok(removed)
    }

    /// Deletes unmatched rows older than the staleness window, one bounded batch per call.
    pub async fn purge_stale_entries(&self) -> Result<usize, GameServiceError> {
        let cutoff = self.clock.now() - self.config.stale_queue_after;
        let stale = self
            .store
            .find_stale_queue_entries(cutoff, self.config.janitor_batch_limit)
            .await?;

        if stale.is_empty() {
            info!("No stale queue entries found");
            return Ok(0);
        }

        let user_ids: Vec<String> = stale.into_iter().map(|entry| entry.user_id).collect();
        debug!("Purging stale queue entries: {:?}", user_ids);
        let deleted = self.store.delete_queue_entries(&user_ids).await?;
        info!("Deleted {} stale queue entries", deleted);
        Ok(deleted)
    }
}

struct Enqueue<'a> {
    service: &'a MatchmakingService,
    user_id: &'a str,
    time_control: i64,
}

#[async_trait]
impl<'a> TransactionBody for Enqueue<'a> {
    type Output = EnqueueResult;

    async fn run(&self, tx: &mut Transaction) -> Result<EnqueueResult, GameServiceError> {
        let config = &self.service.config;
        let now = self.service.clock.now();

        let user = tx
            .get_user(self.user_id)
            .await?
            .ok_or_else(|| GameServiceError::NotFound("User profile not found.".to_string()))?;
        let own_entry = tx.get_queue_entry(self.user_id).await?;

        if let Some(active) = tx.find_active_session(self.user_id).await? {
            tx.delete_queue_entry(self.user_id);
            return Ok(EnqueueResult::Matched {
                session_id: active.session_id,
            });
        }

        if let Some(entry) = &own_entry {
            if let Some(session_id) = &entry.matched_session_id {
                return Ok(EnqueueResult::Matched {
                    session_id: session_id.clone(),
                });
            }
            if entry.time_control == self.time_control {
                return Ok(EnqueueResult::Waiting);
            }
        }

        let profile = PlayerProfile::from_user(&user, config.default_rating);
        let query = CandidateQuery::around(
            profile.rating,
            config.elo_window,
            self.time_control,
            config.candidate_limit,
        );
        let candidate = tx
            .find_queue_candidates(&query)
            .await?
            .into_iter()
            .find(|entry| entry.user_id != self.user_id);

        let Some(candidate) = candidate else {
            tx.put_queue_entry(QueueEntry::new(profile, self.user_id, self.time_control, now));
            return Ok(EnqueueResult::Waiting);
        };

        // The query result is not part of the snapshot; re-read the row before claiming it.
        let mut opponent = tx.get_queue_entry(&candidate.user_id).await?.ok_or_else(|| {
            GameServiceError::Contention("Contention: Opponent disappeared.".to_string())
        })?;
        if opponent.is_matched() {
            return Err(GameServiceError::Contention(
                "Contention: Opponent already matched.".to_string(),
            ));
        }

        let caller = (self.user_id, profile);
        let waiting = (opponent.user_id.as_str(), opponent.profile.clone());
        let session = if rand::random::<bool>() {
            GameSession::new(caller, waiting, self.time_control, now)
        } else {
            GameSession::new(waiting, caller, self.time_control, now)
        };
        let session_id = session.session_id.clone();

        opponent.matched_session_id = Some(session_id.clone());
        tx.put_session(session);
        tx.put_queue_entry(opponent);
        tx.delete_queue_entry(self.user_id);

        Ok(EnqueueResult::Matched { session_id })
    }
}

struct Dequeue<'a> {
    user_id: &'a str,
}

#[async_trait]
impl<'a> TransactionBody for Dequeue<'a> {
    type Output = bool;

    async fn run(&self, tx: &mut Transaction) -> Result<bool, GameServiceError> {
        match tx.get_queue_entry(self.user_id).await? {
            Some(entry) if !entry.is_matched() => {
                tx.delete_queue_entry(self.user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
