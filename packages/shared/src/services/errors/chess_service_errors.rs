#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChessServiceError {
    InvalidPosition(String),
    InvalidSquare(String),
}

impl std::fmt::Display for ChessServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChessServiceError::InvalidPosition(msg) => write!(f, "Invalid position: {}", msg),
            ChessServiceError::InvalidSquare(msg) => write!(f, "Invalid square: {}", msg),
        }
    }
}

impl std::error::Error for ChessServiceError {}
