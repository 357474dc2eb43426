use axum::{routing::get, Router};

use crate::state::AppState;

pub mod games;
pub mod health;
pub mod matchmaking;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .merge(games::routes())
        .merge(matchmaking::routes())
        .with_state(state)
}
