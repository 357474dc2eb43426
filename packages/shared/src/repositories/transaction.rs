use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::game_session::GameSession;
use crate::models::queue::{CandidateQuery, QueueEntry};
use crate::models::user::User;
use crate::repositories::errors::session_store_errors::SessionStoreError;
use crate::repositories::session_store::{
    Commit, DocumentKey, Mutation, Precondition, SessionStore, Write,
};
use crate::services::errors::game_service_errors::GameServiceError;

/// One attempt at a unit of work: a snapshot of point reads plus buffered writes.
///
/// Every document read by key is pinned at the version seen. Writes are checked against
/// those versions when the transaction commits, so a concurrent change to anything read
/// turns into `SessionStoreError::Conflict`.
pub struct Transaction {
    store: Arc<dyn SessionStore>,
    reads: HashMap<DocumentKey, Option<u64>>,
    writes: Vec<Write>,
}

impl Transaction {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Transaction {
            store,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    fn record_read(&mut self, key: DocumentKey, version: Option<u64>) -> Result<(), SessionStoreError> {
        match self.reads.get(&key) {
            Some(seen) if *seen != version => Err(SessionStoreError::Conflict),
            Some(_) => Ok(()),
            None => {
                self.reads.insert(key, version);
                Ok(())
            }
        }
    }

    pub async fn get_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        let session = self.store.get_session(session_id).await?;
        self.record_read(
            DocumentKey::Session(session_id.to_string()),
            session.as_ref().map(|s| s.version),
        )?;
        Ok(session)
    }

    pub async fn get_user(&mut self, user_id: &str) -> Result<Option<User>, SessionStoreError> {
        let user = self.store.get_user(user_id).await?;
        self.record_read(
            DocumentKey::User(user_id.to_string()),
            user.as_ref().map(|u| u.version),
        )?;
        Ok(user)
    }

    pub async fn get_queue_entry(
        &mut self,
        user_id: &str,
    ) -> Result<Option<QueueEntry>, SessionStoreError> {
        let entry = self.store.get_queue_entry(user_id).await?;
        self.record_read(
            DocumentKey::QueueEntry(user_id.to_string()),
            entry.as_ref().map(|e| e.version),
        )?;
        Ok(entry)
    }

    /// Query; not part of the read set.
    pub async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        self.store.find_active_session(user_id).await
    }

    /// Query; not part of the read set. Re-read a candidate with `get_queue_entry` before
    /// writing to it.
    pub async fn find_queue_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<QueueEntry>, SessionStoreError> {
        self.store.find_queue_candidates(query).await
    }

    fn push(&mut self, mutation: Mutation) {
        let key = mutation.key();
        let expected_version = self.reads.get(&key).copied().flatten();
        self.writes.retain(|write| write.mutation.key() != key);
        self.writes.push(Write {
            mutation,
            expected_version,
        });
    }

    pub fn put_session(&mut self, session: GameSession) {
        self.push(Mutation::PutSession(session));
    }

    pub fn put_user(&mut self, user: User) {
        self.push(Mutation::PutUser(user));
    }

    pub fn put_queue_entry(&mut self, entry: QueueEntry) {
        self.push(Mutation::PutQueueEntry(entry));
    }

    /// Deletes a row this transaction read and found present. Otherwise does nothing.
    pub fn delete_queue_entry(&mut self, user_id: &str) {
        let key = DocumentKey::QueueEntry(user_id.to_string());
        if let Some(Some(_)) = self.reads.get(&key) {
            self.push(Mutation::DeleteQueueEntry(user_id.to_string()));
        }
    }

    pub fn into_commit(self) -> Commit {
        let written: Vec<DocumentKey> = self.writes.iter().map(|w| w.mutation.key()).collect();
        let preconditions = self
            .reads
            .into_iter()
            .filter(|(key, _)| !written.contains(key))
            .map(|(key, expected_version)| Precondition {
                key,
                expected_version,
            })
            .collect();
        Commit {
            preconditions,
            writes: self.writes,
        }
    }
}

/// The body of a transaction. It may run several times for one request, so it must only
/// read through `tx` and describe writes on it.
#[async_trait]
pub trait TransactionBody: Send + Sync {
    type Output: Send;

    async fn run(&self, tx: &mut Transaction) -> Result<Self::Output, GameServiceError>;
}

#[derive(Clone)]
pub struct TransactionRunner {
    store: Arc<dyn SessionStore>,
    max_attempts: u32,
}

impl TransactionRunner {
    pub fn new(store: Arc<dyn SessionStore>, max_attempts: u32) -> Self {
        TransactionRunner {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Runs `body` until its commit succeeds. Only store conflicts are retried; errors
    /// returned by the body abort without writing anything.
    pub async fn run<B: TransactionBody>(&self, body: &B) -> Result<B::Output, GameServiceError> {
        for attempt in 1..=self.max_attempts {
            let mut tx = Transaction::new(self.store.clone());
            let output = match body.run(&mut tx).await {
                Ok(output) => output,
                Err(GameServiceError::RepositoryError(SessionStoreError::Conflict)) => {
                    debug!("Inconsistent read on attempt {}, retrying", attempt);
                    continue;
                }
                Err(err) => return Err(err),
            };

            match self.store.commit(tx.into_commit()).await {
                Ok(()) => return Ok(output),
                Err(SessionStoreError::Conflict) => {
                    debug!("Commit conflict on attempt {}, retrying", attempt);
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!("Transaction gave up after {} attempts", self.max_attempts);
        Err(GameServiceError::Contention(
            "The game was updated concurrently. Please retry.".to_string(),
        ))
    }
}
