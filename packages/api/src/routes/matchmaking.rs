use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::debug;

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::requests::EnqueueRequest;
use shared::models::responses::{DequeueResponse, EnqueueResult};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/matchmaking/enqueue", post(enqueue))
        .route("/matchmaking/dequeue", post(dequeue))
}

async fn enqueue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> Result<Json<EnqueueResult>, ApiError> {
    let Json(payload) = payload?;
    let time_control = payload.validate()?;

    let result = state
        .matchmaking_service
        .enqueue(&user.user_id, time_control)
        .await?;

    debug!("enqueue {}: {:?}", user.user_id, result);
    Ok(Json(result))
}

async fn dequeue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<DequeueResponse>, ApiError> {
    let removed = state.matchmaking_service.dequeue(&user.user_id).await?;
    Ok(Json(DequeueResponse {
        success: true,
        removed,
    }))
}
