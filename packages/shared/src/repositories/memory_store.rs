use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::game_session::GameSession;
use crate::models::queue::{CandidateQuery, QueueEntry};
use crate::models::user::User;
use crate::repositories::errors::session_store_errors::SessionStoreError;
use crate::repositories::session_store::{Commit, DocumentKey, Mutation, SessionStore};

#[derive(Default)]
struct StoreState {
    sessions: HashMap<String, GameSession>,
    users: HashMap<String, User>,
    queue: HashMap<String, QueueEntry>,
}

impl StoreState {
    fn version_of(&self, key: &DocumentKey) -> Option<u64> {
        match key {
            DocumentKey::Session(id) => self.sessions.get(id).map(|s| s.version),
            DocumentKey::User(id) => self.users.get(id).map(|u| u.version),
            DocumentKey::QueueEntry(id) => self.queue.get(id).map(|e| e.version),
        }
    }
}

/// Process-local store with the same commit semantics as the DynamoDB one.
#[derive(Default)]
pub struct InMemorySessionStore {
    state: Mutex<StoreState>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, mut user: User) {
        user.version = user.version.max(1);
        self.state.lock().await.users.insert(user.id.clone(), user);
    }

    pub async fn insert_session(&self, mut session: GameSession) {
        session.version = session.version.max(1);
        self.state
            .lock()
            .await
            .sessions
            .insert(session.session_id.clone(), session);
    }

    pub async fn insert_queue_entry(&self, mut entry: QueueEntry) {
        entry.version = entry.version.max(1);
        self.state
            .lock()
            .await
            .queue
            .insert(entry.user_id.clone(), entry);
    }

    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.queue.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_session(
        &self,
        session_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        Ok(self.state.lock().await.sessions.get(session_id).cloned())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, SessionStoreError> {
        Ok(self.state.lock().await.users.get(user_id).cloned())
    }

    async fn get_queue_entry(
        &self,
        user_id: &str,
    ) -> Result<Option<QueueEntry>, SessionStoreError> {
        Ok(self.state.lock().await.queue.get(user_id).cloned())
    }

    async fn find_active_session(
        &self,
        user_id: &str,
    ) -> Result<Option<GameSession>, SessionStoreError> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .filter(|s| s.status.is_active() && s.participants.iter().any(|p| p == user_id))
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn find_queue_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<QueueEntry>, SessionStoreError> {
        let state = self.state.lock().await;
        let mut candidates: Vec<QueueEntry> = state
            .queue
            .values()
            .filter(|entry| query.matches(entry))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| (a.elo, a.queued_at).cmp(&(b.elo, b.queued_at)));
        candidates.truncate(query.limit);
        Ok(candidates)
    }

    async fn commit(&self, commit: Commit) -> Result<(), SessionStoreError> {
        let mut state = self.state.lock().await;

        for precondition in &commit.preconditions {
            if state.version_of(&precondition.key) != precondition.expected_version {
                debug!("Precondition failed for {:?}", precondition.key);
                return Err(SessionStoreError::Conflict);
            }
        }
        for write in &commit.writes {
            if state.version_of(&write.mutation.key()) != write.expected_version {
                debug!("Write expectation failed for {:?}", write.mutation.key());
                return Err(SessionStoreError::Conflict);
            }
        }

        for write in commit.writes {
            let version = write.next_version();
            match write.mutation {
                Mutation::PutSession(mut session) => {
                    session.version = version;
                    state.sessions.insert(session.session_id.clone(), session);
                }
                Mutation::PutUser(mut user) => {
                    user.version = version;
                    state.users.insert(user.id.clone(), user);
                }
                Mutation::PutQueueEntry(mut entry) => {
                    entry.version = version;
                    state.queue.insert(entry.user_id.clone(), entry);
                }
                Mutation::DeleteQueueEntry(user_id) => {
                    state.queue.remove(&user_id);
                }
            }
        }
        Ok(())
    }

    async fn find_stale_queue_entries(
        &self,
        queued_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueueEntry>, SessionStoreError> {
        let state = self.state.lock().await;
        let mut stale: Vec<QueueEntry> = state
            .queue
            .values()
            .filter(|entry| !entry.is_matched() && entry.queued_at < queued_before)
            .cloned()
            .collect();
        stale.sort_by_key(|entry| entry.queued_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn delete_queue_entries(&self, user_ids: &[String]) -> Result<usize, SessionStoreError> {
        let mut state = self.state.lock().await;
        Ok(user_ids
            .iter()
            .filter(|id| state.queue.remove(id.as_str()).is_some())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game_session::tests::session;
    use crate::repositories::session_store::{Precondition, Write};

    #[tokio::test]
    async fn test_commit_bumps_version() {
        let store = InMemorySessionStore::new();
        let game = session("white", "black");
        store.insert_session(game.clone()).await;

        let stored = store.get_session(&game.session_id).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        store
            .commit(Commit {
                preconditions: vec![],
                writes: vec![Write {
                    mutation: Mutation::PutSession(stored),
                    expected_version: Some(1),
                }],
            })
            .await
            .unwrap();

        let updated = store.get_session(&game.session_id).await.unwrap().unwrap();
        assert_eq!(updated.version, 2);
    }

    #[tokio::test]
    async fn test_stale_commit_conflicts_and_writes_nothing() {
        let store = InMemorySessionStore::new();
        let game = session("white", "black");
        store.insert_session(game.clone()).await;
        store.insert_user(User::new("white", "White", 1200)).await;

        let mut changed_user = User::new("white", "White", 1300);
        changed_user.version = 1;
        let result = store
            .commit(Commit {
                preconditions: vec![],
                writes: vec![
                    Write {
                        mutation: Mutation::PutUser(changed_user),
                        expected_version: Some(1),
                    },
                    Write {
                        mutation: Mutation::PutSession(game.clone()),
                        expected_version: Some(7),
                    },
                ],
            })
            .await;

        assert_eq!(result, Err(SessionStoreError::Conflict));
        let user = store.get_user("white").await.unwrap().unwrap();
        assert_eq!(user.rating, Some(1200));
    }

    #[tokio::test]
    async fn test_precondition_on_missing_document() {
        let store = InMemorySessionStore::new();
        store.insert_user(User::new("late", "Late", 1200)).await;

        let result = store
            .commit(Commit {
                preconditions: vec![Precondition {
                    key: DocumentKey::User("late".to_string()),
                    expected_version: None,
                }],
                writes: vec![],
            })
            .await;

        assert_eq!(result, Err(SessionStoreError::Conflict));
    }

    #[tokio::test]
    async fn test_delete_queue_entries_ignores_missing_rows() {
        let store = InMemorySessionStore::new();
        let profile = crate::models::game_session::tests::profile("a", 1200);
        store
            .insert_queue_entry(QueueEntry::new(profile, "a", 300, Utc::now()))
            .await;

        let deleted = store
            .delete_queue_entries(&["a".to_string(), "ghost".to_string()])
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert_eq!(store.queue_len().await, 0);
    }
}
