use std::sync::Arc;

use shared::config::GameConfig;
use shared::repositories::session_store::SessionStore;
use shared::services::auth_service::AuthService;
use shared::services::chess_service::ChessService;
use shared::services::clock::Clock;
use shared::services::game_action_service::GameActionService;
use shared::services::game_session_service::GameSessionService;
use shared::services::matchmaking_service::MatchmakingService;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub game_session_service: Arc<GameSessionService>,
    pub game_action_service: Arc<GameActionService>,
    pub matchmaking_service: Arc<MatchmakingService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        config: GameConfig,
        jwt_secret: String,
    ) -> Self {
        AppState {
            auth_service: Arc::new(AuthService::new(jwt_secret)),
            game_session_service: Arc::new(GameSessionService::new(
                store.clone(),
                Arc::new(ChessService::new()),
                clock.clone(),
                config.clone(),
            )),
            game_action_service: Arc::new(GameActionService::new(
                store.clone(),
                clock.clone(),
                config.clone(),
            )),
            matchmaking_service: Arc::new(MatchmakingService::new(store, clock, config)),
        }
    }
}
