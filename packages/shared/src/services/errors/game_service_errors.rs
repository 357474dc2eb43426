use serde::Serialize;

use crate::repositories::errors::session_store_errors::SessionStoreError;
use crate::services::errors::auth_service_errors::AuthServiceError;

/// Stable classification of a failure, attached where the failure is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    InvalidArgument,
    NotFound,
    PermissionDenied,
    FailedPrecondition,
    Aborted,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::FailedPrecondition => "failed_precondition",
            ErrorKind::Aborted => "aborted",
            ErrorKind::Internal => "internal",
        }
    }
}

pub const CORRUPTED_MESSAGE: &str = "Game state corrupted. Game aborted.";

#[derive(Debug)]
pub enum GameServiceError {
    Unauthenticated(String),
    ValidationError(String),
    NotFound(String),
    PermissionDenied(String),
    FailedPrecondition(String),
    /// Lost a race with another caller. Safe to retry.
    Contention(String),
    /// The board state could not be read. Raised only after the session was closed.
    Corrupted,
    Internal(String),
    RepositoryError(SessionStoreError),
}

impl GameServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameServiceError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            GameServiceError::ValidationError(_) => ErrorKind::InvalidArgument,
            GameServiceError::NotFound(_) => ErrorKind::NotFound,
            GameServiceError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            GameServiceError::FailedPrecondition(_) | GameServiceError::Corrupted => {
                ErrorKind::FailedPrecondition
            }
            GameServiceError::Contention(_) => ErrorKind::Aborted,
            GameServiceError::RepositoryError(SessionStoreError::Conflict) => ErrorKind::Aborted,
            GameServiceError::Internal(_) | GameServiceError::RepositoryError(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Aborted
    }
}

impl std::fmt::Display for GameServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameServiceError::Unauthenticated(msg)
            | GameServiceError::ValidationError(msg)
            | GameServiceError::NotFound(msg)
            | GameServiceError::PermissionDenied(msg)
            | GameServiceError::FailedPrecondition(msg)
            | GameServiceError::Contention(msg)
            | GameServiceError::Internal(msg) => write!(f, "{}", msg),
            GameServiceError::Corrupted => write!(f, "{}", CORRUPTED_MESSAGE),
            GameServiceError::RepositoryError(err) => write!(f, "Repository error: {}", err),
        }
    }
}

impl std::error::Error for GameServiceError {}

impl From<SessionStoreError> for GameServiceError {
    fn from(err: SessionStoreError) -> Self {
        GameServiceError::RepositoryError(err)
    }
}

impl From<AuthServiceError> for GameServiceError {
    fn from(err: AuthServiceError) -> Self {
        GameServiceError::Unauthenticated(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            GameServiceError::ValidationError("x".into()).kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(GameServiceError::Corrupted.kind(), ErrorKind::FailedPrecondition);
        assert_eq!(
            GameServiceError::RepositoryError(SessionStoreError::DynamoDb("boom".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_only_contention_is_retryable() {
        assert!(GameServiceError::Contention("retry".into()).is_retryable());
        assert!(GameServiceError::RepositoryError(SessionStoreError::Conflict).is_retryable());
        assert!(!GameServiceError::FailedPrecondition("Not your turn.".into()).is_retryable());
        assert!(!GameServiceError::Corrupted.is_retryable());
    }

    #[test]
    fn test_messages_are_verbatim() {
        assert_eq!(
            GameServiceError::FailedPrecondition("Not your turn.".into()).to_string(),
            "Not your turn."
        );
        assert_eq!(GameServiceError::Corrupted.to_string(), CORRUPTED_MESSAGE);
    }

    #[test]
    fn test_auth_failures_are_unauthenticated() {
        let err = GameServiceError::from(AuthServiceError::MissingToken);
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        assert_eq!(err.to_string(), "The function must be called while authenticated.");
    }
}
