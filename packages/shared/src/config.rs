use chrono::Duration;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(String),
    Invalid { name: String, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "{} environment variable must be set", name)
            }
            ConfigError::Invalid { name, value } => {
                write!(f, "{} has an invalid value: {}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::Missing(name.to_string()))
}

fn optional<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

/// DynamoDB table names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub game_sessions_table: String,
    pub users_table: String,
    pub matchmaking_table: String,
}

impl StoreConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(StoreConfig {
            game_sessions_table: required("GAME_SESSIONS_TABLE")?,
            users_table: required("USERS_TABLE")?,
            matchmaking_table: required("MATCHMAKING_TABLE")?,
        })
    }
}

/// Engine constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    pub k_factor: i32,
    pub min_moves_for_rating: u32,
    pub default_rating: i32,
    pub abandonment_grace: Duration,
    pub elo_window: i32,
    pub candidate_limit: usize,
    pub default_initial_time: i64,
    pub max_transaction_attempts: u32,
    pub stale_queue_after: Duration,
    pub janitor_batch_limit: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            k_factor: 32,
            min_moves_for_rating: 5,
            default_rating: 1200,
            abandonment_grace: Duration::seconds(30),
            elo_window: 150,
            candidate_limit: 10,
            default_initial_time: 300,
            max_transaction_attempts: 5,
            stale_queue_after: Duration::minutes(3),
            janitor_batch_limit: 450,
        }
    }
}

impl GameConfig {
    /// Defaults with the optional environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = GameConfig::default();
        if let Some(attempts) = optional::<u32>("MAX_TRANSACTION_ATTEMPTS")? {
            config.max_transaction_attempts = attempts.max(1);
        }
        if let Some(seconds) = optional::<i64>("ABANDONMENT_GRACE_SECONDS")? {
            config.abandonment_grace = Duration::seconds(seconds);
        }
        if let Some(window) = optional::<i32>("MATCHMAKING_ELO_RANGE")? {
            config.elo_window = window;
        }
        if let Some(seconds) = optional::<i64>("STALE_QUEUE_SECONDS")? {
            config.stale_queue_after = Duration::seconds(seconds);
        }
        Ok(config)
    }
}
