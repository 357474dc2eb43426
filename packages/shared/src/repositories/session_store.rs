use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::game_session::GameSession;
use crate::models::queue::{CandidateQuery, QueueEntry};
use crate::models::user::User;
use crate::repositories::errors::session_store_errors::SessionStoreError;

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Session(String),
    User(String),
    QueueEntry(String),
}

/// A document read by the transaction that must still be at `expected_version` on commit.
/// `None` means the document must still not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub key: DocumentKey,
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    PutSession(GameSession),
    PutUser(User),
    PutQueueEntry(QueueEntry),
    DeleteQueueEntry(String),
}

impl Mutation {
    pub fn key(&self) -> DocumentKey {
        match self {
            Mutation::PutSession(session) => DocumentKey::Session(session.session_id.clone()),
            Mutation::PutUser(user) => DocumentKey::User(user.id.clone()),
            Mutation::PutQueueEntry(entry) => DocumentKey::QueueEntry(entry.user_id.clone()),
            Mutation::DeleteQueueEntry(user_id) => DocumentKey::QueueEntry(user_id.clone()),
        }
    }
}

/// A write guarded by the version the transaction saw. A put stores the document at
/// `expected_version + 1` (or 1 when it must be new).
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub mutation: Mutation,
    pub expected_version: Option<u64>,
}

impl Write {
    pub fn next_version(&self) -> u64 {
        self.expected_version.map_or(1, |version| version + 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commit {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Write>,
}

impl Commit {
    pub fn is_empty(&self) -> bool {
        self.preconditions.is_empty() && self.writes.is_empty()
    }
}

/// Document store behind every game and matchmaking operation.
///
/// Point reads return the stored `version`. `commit` applies all writes or none: it returns
/// `SessionStoreError::Conflict` when any precondition or write expectation fails.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_session(&self, session_id: &str)
        -> Result<Option<GameSession>, SessionStoreError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, SessionStoreError>;

    async fn get_queue_entry(&self, user_id: &str)
        -> Result<Option<QueueEntry>, SessionStoreError>;

    /// A waiting or in-progress session the user takes part in.
    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError>;

    /// Unmatched rows inside the query bounds, ordered by rating then by enqueue time.
    async fn find_queue_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<QueueEntry>, SessionStoreError>;

    async fn commit(&self, commit: Commit) -> Result<(), SessionStoreError>;

    /// Unmatched rows enqueued before `queued_before`.
    async fn find_stale_queue_entries(
        &self,
        queued_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, SessionStoreError>;

    /// Unconditional delete. Missing rows are ignored.
    async fn delete_queue_entries(&self, user_ids: &[String]) -> Result<usize, SessionStoreError>;
}
