use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::post,
    Json, Router,
};
use tracing::debug;

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::requests::{GameActionRequest, MakeMoveRequest, SessionRequest};
use shared::models::responses::{ActionResponse, RematchResponse};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/games/{session_id}/move", post(make_move))
        .route("/games/{session_id}/timeout", post(claim_timeout))
        .route("/games/{session_id}/abandonment", post(claim_abandonment))
        .route("/games/{session_id}/action", post(game_action))
        .route("/games/{session_id}/rematch", post(accept_rematch))
}

fn session_id(session_id: String) -> Result<String, ApiError> {
    let request = SessionRequest { session_id };
    request.validate()?;
    Ok(request.session_id)
}

async fn make_move(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    payload: Result<Json<MakeMoveRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = session_id(id)?;
    let Json(payload) = payload?;
    let command = payload.validate()?;

    let outcome = state
        .game_session_service
        .make_move(&id, &user.user_id, &command)
        .await?;

    debug!("makeMove {} by {}: {:?}", id, user.user_id, outcome);
    Ok(Json(outcome.into()))
}

async fn claim_timeout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = session_id(id)?;
    let outcome = state
        .game_session_service
        .claim_timeout(&id, &user.user_id)
        .await?;
    Ok(Json(outcome.into()))
}

async fn claim_abandonment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = session_id(id)?;
    let outcome = state
        .game_session_service
        .claim_abandonment(&id, &user.user_id)
        .await?;
    Ok(Json(outcome.into()))
}

async fn game_action(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    payload: Result<Json<GameActionRequest>, JsonRejection>,
) -> Result<Json<ActionResponse>, ApiError> {
    let id = session_id(id)?;
    let Json(payload) = payload?;
    let action = payload.validate()?;

    let outcome = state
        .game_action_service
        .handle_game_action(&id, &user.user_id, action)
        .await?;
    Ok(Json(outcome.into()))
}

async fn accept_rematch(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<RematchResponse>, ApiError> {
    let id = session_id(id)?;
    let session_id = state
        .game_action_service
        .accept_rematch(&id, &user.user_id)
        .await?;
    Ok(Json(RematchResponse { session_id }))
}
