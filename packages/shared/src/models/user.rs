use serde::{Deserialize, Serialize};

pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub draws: u32,
}

/// Rating record of a player. Owned by the profile system; the engine only reads it and
/// writes `rating` and `stats` when a rated game finishes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub stats: PlayerStats,
}

impl User {
    pub fn new(id: &str, display_name: &str, rating: i32) -> Self {
        User {
            id: id.to_string(),
            version: 0,
            display_name: Some(display_name.to_string()),
            country_code: None,
            profile_image: None,
            rating: Some(rating),
            stats: PlayerStats::default(),
        }
    }

    pub fn rating_or(&self, default_rating: i32) -> i32 {
        self.rating.unwrap_or(default_rating)
    }
}

/// Display metadata copied onto sessions and queue rows at match time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub display_name: String,
    pub rating: i32,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl PlayerProfile {
    pub fn from_user(user: &User, default_rating: i32) -> Self {
        PlayerProfile {
            display_name: user
                .display_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            rating: user.rating_or(default_rating),
            country_code: user.country_code.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}
