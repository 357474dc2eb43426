use chrono::{DateTime, Duration, Utc};
use std::sync::RwLock;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Lets callers replay a game at chosen instants.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Whole seconds since `since`, rounded up. Never negative.
pub fn elapsed_seconds_ceil(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (now - since).num_milliseconds().max(0);
    (millis + 999) / 1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockCharge {
    Remaining(i64),
    Flagged,
}

/// Deducts the time spent since the last clock-affecting action from `remaining`.
pub fn charge(remaining: i64, last_move_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ClockCharge {
    let elapsed = last_move_at.map_or(0, |since| elapsed_seconds_ceil(since, now));
    let left = remaining - elapsed;
    if left <= 0 {
        ClockCharge::Flagged
    } else {
        ClockCharge::Remaining(left)
    }
}
