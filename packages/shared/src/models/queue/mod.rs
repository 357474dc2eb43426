use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::PlayerProfile;

/// A player waiting in the matchmaking queue. One row per user, keyed by `user_id`.
///
/// `matched_session_id` is `None` while the player waits and is set exactly once when
/// another player pairs with this row.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueueEntry {
    pub user_id: String,
    #[serde(default)]
    pub version: u64,
    pub elo: i32,
    pub time_control: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub queued_at: DateTime<Utc>,
    pub profile: PlayerProfile,
    #[serde(default)]
    pub matched_session_id: Option<String>,
}

impl QueueEntry {
    pub fn new(profile: PlayerProfile, user_id: &str, time_control: i64, now: DateTime<Utc>) -> Self {
        QueueEntry {
            user_id: user_id.to_string(),
            version: 0,
            elo: profile.rating,
            time_control,
            queued_at: now,
            profile,
            matched_session_id: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched_session_id.is_some()
    }
}

/// Bounds of a candidate search in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateQuery {
    pub time_control: i64,
    pub min_elo: i32,
    pub max_elo: i32,
    pub limit: usize,
}

impl CandidateQuery {
    pub fn around(elo: i32, window: i32, time_control: i64, limit: usize) -> Self {
        CandidateQuery {
            time_control,
            min_elo: elo - window,
            max_elo: elo + window,
            limit,
        }
    }

    pub fn matches(&self, entry: &QueueEntry) -> bool {
        entry.matched_session_id.is_none()
            && entry.time_control == self.time_control
            && entry.elo >= self.min_elo
            && entry.elo <= self.max_elo
    }
}
