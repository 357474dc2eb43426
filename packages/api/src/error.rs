use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

use shared::services::errors::auth_service_errors::AuthServiceError;
use shared::services::errors::game_service_errors::{ErrorKind, GameServiceError};

#[derive(Debug)]
pub struct ApiError(pub GameServiceError);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    pub retryable: bool,
}

impl From<GameServiceError> for ApiError {
    fn from(error: GameServiceError) -> Self {
        ApiError(error)
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(error: AuthServiceError) -> Self {
        ApiError(error.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(GameServiceError::ValidationError(rejection.body_text()))
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::FailedPrecondition => StatusCode::CONFLICT,
        ErrorKind::Aborted => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);
        match kind {
            ErrorKind::Internal => error!("Request failed: {}", self.0),
            ErrorKind::Aborted => warn!("Request lost a race: {}", self.0),
            _ => {}
        }

        // Store internals stay in the logs.
        let message = match &self.0 {
            GameServiceError::RepositoryError(_) if kind == ErrorKind::Internal => {
                "Internal error.".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            error: message,
            kind,
            retryable: self.0.is_retryable(),
        };
        (status, Json(body)).into_response()
    }
}
