use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::user::PlayerProfile;

pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Repetition key of a position: placement, side to move, castling and en passant fields.
pub fn position_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// Lifecycle of a session. Only ever advances: waiting -> inprogress -> completed | error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    InProgress,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Error)
    }

    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Waiting | SessionStatus::InProgress)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    pub fn opponent(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Rank a pawn of this color promotes on.
    pub fn promotion_rank(self) -> char {
        match self {
            Color::White => '8',
            Color::Black => '1',
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

/// Winner recorded on a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    White,
    Black,
    Draw,
}

impl From<Color> for Winner {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Winner::White,
            Color::Black => Winner::Black,
        }
    }
}

/// Winner classification handed to the finalizer. `None` closes the session without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    White,
    Black,
    Draw,
    None,
}

impl Verdict {
    pub fn winner(self) -> Option<Winner> {
        match self {
            Verdict::White => Some(Winner::White),
            Verdict::Black => Some(Winner::Black),
            Verdict::Draw => Some(Winner::Draw),
            Verdict::None => None,
        }
    }

    pub fn is_decisive(self) -> bool {
        matches!(self, Verdict::White | Verdict::Black)
    }
}

impl From<Color> for Verdict {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Verdict::White,
            Color::Black => Verdict::Black,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
    Timeout,
    Resignation,
    AgreedDraw,
    Abandonment,
    Corruption,
}

impl TerminationReason {
    const ALL: [TerminationReason; 10] = [
        TerminationReason::Checkmate,
        TerminationReason::Stalemate,
        TerminationReason::InsufficientMaterial,
        TerminationReason::ThreefoldRepetition,
        TerminationReason::FiftyMoveRule,
        TerminationReason::Timeout,
        TerminationReason::Resignation,
        TerminationReason::AgreedDraw,
        TerminationReason::Abandonment,
        TerminationReason::Corruption,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TerminationReason::Checkmate => "checkmate",
            TerminationReason::Stalemate => "stalemate",
            TerminationReason::InsufficientMaterial => "insufficient_material",
            TerminationReason::ThreefoldRepetition => "threefold_repetition",
            TerminationReason::FiftyMoveRule => "50_move_rule",
            TerminationReason::Timeout => "timeout",
            TerminationReason::Resignation => "resignation",
            TerminationReason::AgreedDraw => "agreed_draw",
            TerminationReason::Abandonment => "abandonment",
            TerminationReason::Corruption => "internal_error_fen_corruption",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.as_str() == tag)
    }
}

const UNRATED_EARLY_END_SUFFIX: &str = "_unrated_early_end";

/// Outcome tag stored on a finished session, e.g. `timeout` or `resignation_unrated_early_end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Outcome {
    pub reason: TerminationReason,
    pub unrated_early_end: bool,
}

impl Outcome {
    pub fn new(reason: TerminationReason) -> Self {
        Outcome {
            reason,
            unrated_early_end: false,
        }
    }

    pub fn unrated_early_end(reason: TerminationReason) -> Self {
        Outcome {
            reason,
            unrated_early_end: true,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unrated_early_end {
            write!(f, "{}{}", self.reason.as_str(), UNRATED_EARLY_END_SUFFIX)
        } else {
            write!(f, "{}", self.reason.as_str())
        }
    }
}

impl From<Outcome> for String {
    fn from(outcome: Outcome) -> Self {
        outcome.to_string()
    }
}

impl TryFrom<String> for Outcome {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (tag, unrated_early_end) = match value.strip_suffix(UNRATED_EARLY_END_SUFFIX) {
            Some(tag) => (tag, true),
            None => (value.as_str(), false),
        };
        TerminationReason::from_tag(tag)
            .map(|reason| Outcome {
                reason,
                unrated_early_end,
            })
            .ok_or_else(|| format!("Unknown outcome: {}", value))
    }
}

/// A pawn move to the back rank waiting for the mover to pick a piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPromotion {
    pub from: String,
    pub to: String,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Online,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDeltas {
    pub white: i32,
    pub black: i32,
}

/// One game between two players.
///
/// Optional fields have a single meaning for "absent": a missing attribute and a stored null
/// deserialize to the same `None`. In particular `*_disconnected_at` is `None` while the
/// player is connected (or never disconnected) and `Some(t)` once they dropped at `t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub session_id: String,
    #[serde(default)]
    pub version: u64,
    pub fen: String,
    pub status: SessionStatus,
    pub player_white_id: String,
    /// Key of the `player-black-index`; left out of the item while the seat is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_black_id: Option<String>,
    pub participants: Vec<String>,
    pub white_profile: PlayerProfile,
    #[serde(default)]
    pub black_profile: Option<PlayerProfile>,
    pub turn: Color,
    pub initial_time: i64,
    pub white_time_left: i64,
    pub black_time_left: i64,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_move_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pending_promotion: Option<PendingPromotion>,
    #[serde(default)]
    pub draw_offer_from: Option<Color>,
    #[serde(default)]
    pub rematch_offer_from: Option<String>,
    #[serde(default)]
    pub next_session_id: Option<String>,
    #[serde(default)]
    pub white_presence: Presence,
    #[serde(default)]
    pub black_presence: Presence,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub white_disconnected_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub black_disconnected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub winner: Option<Winner>,
    #[serde(default)]
    pub outcome: Option<Outcome>,
    #[serde(default)]
    pub elo_applied: bool,
    #[serde(default)]
    pub rating_deltas: Option<RatingDeltas>,
    #[serde(default)]
    pub move_history: Vec<String>,
    #[serde(default)]
    pub position_history: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// A fresh, running game with both seats filled and full clocks.
    pub fn new(
        white: (&str, PlayerProfile),
        black: (&str, PlayerProfile),
        time_control: i64,
        now: DateTime<Utc>,
    ) -> Self {
        let (white_id, white_profile) = white;
        let (black_id, black_profile) = black;
        GameSession {
            session_id: Uuid::new_v4().to_string(),
            version: 0,
            fen: INITIAL_FEN.to_string(),
            status: SessionStatus::InProgress,
            player_white_id: white_id.to_string(),
            player_black_id: Some(black_id.to_string()),
            participants: vec![white_id.to_string(), black_id.to_string()],
            white_profile,
            black_profile: Some(black_profile),
            turn: Color::White,
            initial_time: time_control,
            white_time_left: time_control,
            black_time_left: time_control,
            last_move_at: Some(now),
            pending_promotion: None,
            draw_offer_from: None,
            rematch_offer_from: None,
            next_session_id: None,
            white_presence: Presence::Online,
            black_presence: Presence::Online,
            white_disconnected_at: None,
            black_disconnected_at: None,
            winner: None,
            outcome: None,
            elo_applied: false,
            rating_deltas: None,
            move_history: vec![],
            position_history: vec![position_key(INITIAL_FEN)],
            created_at: now,
            completed_at: None,
        }
    }

    pub fn color_of(&self, user_id: &str) -> Option<Color> {
        if self.player_white_id == user_id {
            Some(Color::White)
        } else if self.player_black_id.as_deref() == Some(user_id) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn player_id(&self, color: Color) -> Option<&str> {
        match color {
            Color::White => Some(self.player_white_id.as_str()).filter(|id| !id.is_empty()),
            Color::Black => self.player_black_id.as_deref().filter(|id| !id.is_empty()),
        }
    }

    pub fn has_both_players(&self) -> bool {
        self.player_id(Color::White).is_some() && self.player_id(Color::Black).is_some()
    }

    pub fn time_left(&self, color: Color) -> i64 {
        match color {
            Color::White => self.white_time_left,
            Color::Black => self.black_time_left,
        }
    }

    pub fn set_time_left(&mut self, color: Color, seconds: i64) {
        match color {
            Color::White => self.white_time_left = seconds,
            Color::Black => self.black_time_left = seconds,
        }
    }

    pub fn presence(&self, color: Color) -> Presence {
        match color {
            Color::White => self.white_presence,
            Color::Black => self.black_presence,
        }
    }

    pub fn set_presence(&mut self, color: Color, presence: Presence) {
        match color {
            Color::White => self.white_presence = presence,
            Color::Black => self.black_presence = presence,
        }
    }

    pub fn disconnected_at(&self, color: Color) -> Option<DateTime<Utc>> {
        match color {
            Color::White => self.white_disconnected_at,
            Color::Black => self.black_disconnected_at,
        }
    }

    pub fn set_disconnected_at(&mut self, color: Color, at: Option<DateTime<Utc>>) {
        match color {
            Color::White => self.white_disconnected_at = at,
            Color::Black => self.black_disconnected_at = at,
        }
    }

    /// Full-move number from the sixth board-state field; 1 when missing or unreadable.
    pub fn move_count(&self) -> u32 {
        self.fen
            .split_whitespace()
            .nth(5)
            .and_then(|field| field.parse().ok())
            .unwrap_or(1)
    }
}
