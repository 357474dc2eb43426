use std::fmt;

#[derive(Debug, PartialEq, Eq)]
pub enum AuthServiceError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    JwtError(String),
}

impl fmt::Display for AuthServiceError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthServiceError::MissingToken => write!(f, "The function must be called while authenticated."),
            AuthServiceError::InvalidToken => write!(f, "Invalid JWT token"),
            AuthServiceError::ExpiredToken => write!(f, "JWT token has expired"),
            AuthServiceError::JwtError(msg) => write!(f, "JWT error: {}", msg),
        }
    }
}

impl std::error::Error for AuthServiceError {}
