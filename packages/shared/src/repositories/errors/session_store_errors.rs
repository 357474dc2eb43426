#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreError {
    /// A precondition of the commit no longer held. Nothing was written.
    Conflict,
    Serialization(String),
    DynamoDb(String),
    Configuration(String),
}

impl SessionStoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SessionStoreError::Conflict)
    }
}

impl std::fmt::Display for SessionStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStoreError::Conflict => write!(f, "Transaction conflict"),
            SessionStoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            SessionStoreError::DynamoDb(msg) => write!(f, "DynamoDB error: {}", msg),
            SessionStoreError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SessionStoreError {}

impl From<serde_dynamo::Error> for SessionStoreError {
    fn from(err: serde_dynamo::Error) -> Self {
        SessionStoreError::Serialization(err.to_string())
    }
}
