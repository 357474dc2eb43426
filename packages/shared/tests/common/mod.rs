#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use shared::config::GameConfig;
use shared::models::game_session::GameSession;
use shared::models::queue::{CandidateQuery, QueueEntry};
use shared::models::requests::{GameAction, MakeMoveRequest, MoveCommand};
use shared::models::responses::ActionOutcome;
use shared::models::user::{PlayerProfile, User};
use shared::repositories::memory_store::InMemorySessionStore;
use shared::repositories::errors::session_store_errors::SessionStoreError;
use shared::repositories::session_store::{Commit, SessionStore};
use shared::services::chess_service::ChessService;
use shared::services::clock::{Clock, ManualClock};
use shared::services::errors::game_service_errors::GameServiceError;
use shared::services::game_action_service::GameActionService;
use shared::services::game_session_service::GameSessionService;
use shared::services::matchmaking_service::MatchmakingService;

/// White to move, fullmove 7: old enough for the result to be rated.
pub const MIDGAME_FEN: &str = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 7";

pub struct Harness {
    pub store: Arc<InMemorySessionStore>,
    pub clock: Arc<ManualClock>,
    pub config: GameConfig,
    pub games: GameSessionService,
    pub actions: GameActionService,
    pub matchmaking: MatchmakingService,
}

impl Harness {
    /// Services over an empty store with `alice` (1200), `bob` (1220) and `carol` (1500).
    pub async fn new() -> Self {
        let store = Arc::new(InMemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = GameConfig::default();

        store.insert_user(User::new("alice", "Alice", 1200)).await;
        store.insert_user(User::new("bob", "Bob", 1220)).await;
        store.insert_user(User::new("carol", "Carol", 1500)).await;

        Harness {
            games: GameSessionService::new(
                store.clone(),
                Arc::new(ChessService::default()),
                clock.clone(),
                config.clone(),
            ),
            actions: GameActionService::new(store.clone(), clock.clone(), config.clone()),
            matchmaking: MatchmakingService::new(store.clone(), clock.clone(), config.clone()),
            store,
            clock,
            config,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance_ms(&self, millis: i64) {
        self.clock.advance(Duration::milliseconds(millis));
    }

    pub fn advance_secs(&self, seconds: i64) {
        self.clock.advance(Duration::seconds(seconds));
    }

    async fn profile(&self, user_id: &str) -> PlayerProfile {
        let user = self.store.get_user(user_id).await.unwrap().unwrap();
        PlayerProfile::from_user(&user, self.config.default_rating)
    }

    /// A 300s game started now, adjusted by `customize` before it is stored.
    pub async fn start_game_with(
        &self,
        white: &str,
        black: &str,
        customize: impl FnOnce(&mut GameSession),
    ) -> String {
        let mut session = GameSession::new(
            (white, self.profile(white).await),
            (black, self.profile(black).await),
            300,
            self.now(),
        );
        customize(&mut session);
        let session_id = session.session_id.clone();
        self.store.insert_session(session).await;
        session_id
    }

    pub async fn start_game(&self, white: &str, black: &str) -> String {
        self.start_game_with(white, black, |_| {}).await
    }

    pub async fn session(&self, session_id: &str) -> GameSession {
        self.store.get_session(session_id).await.unwrap().unwrap()
    }

    pub async fn user(&self, user_id: &str) -> User {
        self.store.get_user(user_id).await.unwrap().unwrap()
    }

    pub async fn play(
        &self,
        session_id: &str,
        user_id: &str,
        uci: &str,
    ) -> Result<ActionOutcome, GameServiceError> {
        self.games.make_move(session_id, user_id, &move_command(uci)).await
    }

    pub async fn act(
        &self,
        session_id: &str,
        user_id: &str,
        action: GameAction,
    ) -> Result<ActionOutcome, GameServiceError> {
        self.actions.handle_game_action(session_id, user_id, action).await
    }
}

pub fn move_command(uci: &str) -> MoveCommand {
    MakeMoveRequest {
        uci: Some(uci.to_string()),
        promotion: None,
    }
    .validate()
    .unwrap()
}

pub fn promotion_command(letter: &str) -> MoveCommand {
    MakeMoveRequest {
        uci: None,
        promotion: Some(letter.to_string()),
    }
    .validate()
    .unwrap()
}

pub fn failed_precondition(result: Result<ActionOutcome, GameServiceError>) -> String {
    match result {
        Err(GameServiceError::FailedPrecondition(msg)) => msg,
        other => panic!("expected a failed precondition, got {:?}", other),
    }
}

/// Yields to the scheduler before every store call so concurrent requests on one task
/// interleave between their reads and their commit.
pub struct YieldingStore {
    inner: Arc<InMemorySessionStore>,
}

impl YieldingStore {
    pub fn new(inner: Arc<InMemorySessionStore>) -> Self {
        YieldingStore { inner }
    }
}

#[async_trait]
impl SessionStore for YieldingStore {
    async fn get_session(&self, session_id: &str) -> Result<Option<GameSession>, SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.get_session(session_id).await
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.get_user(user_id).await
    }

    async fn get_queue_entry(&self, user_id: &str) -> Result<Option<QueueEntry>, SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.get_queue_entry(user_id).await
    }

    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.find_active_session(user_id).await
    }

    async fn find_queue_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<QueueEntry>, SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.find_queue_candidates(query).await
    }

    async fn commit(&self, commit: Commit) -> Result<(), SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.commit(commit).await
    }

    async fn find_stale_queue_entries(
        &self,
        queued_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.find_stale_queue_entries(queued_before, limit).await
    }

    async fn delete_queue_entries(&self, user_ids: &[String]) -> Result<usize, SessionStoreError> {
        tokio::task::yield_now().await;
        self.inner.delete_queue_entries(user_ids).await
    }
}
