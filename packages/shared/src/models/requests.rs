use serde::{Deserialize, Serialize};

use crate::models::game_session::Presence;
use crate::services::errors::game_service_errors::GameServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromotionPiece {
    Queen,
    Rook,
    Bishop,
    Knight,
}

impl PromotionPiece {
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "q" => Some(PromotionPiece::Queen),
            "r" => Some(PromotionPiece::Rook),
            "b" => Some(PromotionPiece::Bishop),
            "n" => Some(PromotionPiece::Knight),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            PromotionPiece::Queen => 'q',
            PromotionPiece::Rook => 'r',
            PromotionPiece::Bishop => 'b',
            PromotionPiece::Knight => 'n',
        }
    }
}

/// A syntactically valid coordinate move such as `e2e4` or `e7e8q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UciMove {
    pub from: String,
    pub to: String,
    pub promotion: Option<PromotionPiece>,
}

impl UciMove {
    pub fn parse(uci: &str) -> Result<Self, GameServiceError> {
        let invalid = || GameServiceError::ValidationError("Invalid UCI format received.".to_string());
        if !uci.is_ascii() || !(uci.len() == 4 || uci.len() == 5) {
            return Err(invalid());
        }
        let (from, to) = (&uci[0..2], &uci[2..4]);
        if !is_square(from) || !is_square(to) {
            return Err(invalid());
        }
        let promotion = match uci.get(4..5) {
            Some(letter) => Some(PromotionPiece::from_letter(letter).ok_or_else(invalid)?),
            None => None,
        };
        Ok(UciMove {
            from: from.to_string(),
            to: to.to_string(),
            promotion,
        })
    }

    pub fn with_promotion(&self, promotion: PromotionPiece) -> Self {
        UciMove {
            promotion: Some(promotion),
            ..self.clone()
        }
    }

    pub fn to_uci(&self) -> String {
        match self.promotion {
            Some(piece) => format!("{}{}{}", self.from, self.to, piece.letter()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

fn is_square(square: &str) -> bool {
    let mut chars = square.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('a'..='h'), Some('1'..='8'))
    )
}

fn require_non_empty(field: &str, value: &str) -> Result<(), GameServiceError> {
    if value.trim().is_empty() {
        return Err(GameServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub session_id: String,
}

impl SessionRequest {
    pub fn validate(&self) -> Result<(), GameServiceError> {
        require_non_empty("sessionId", &self.session_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeMoveRequest {
    #[serde(default, rename = "move")]
    pub uci: Option<String>,
    #[serde(default)]
    pub promotion: Option<String>,
}

/// A move submission after schema checks. Either part may be absent; which one is required
/// depends on whether the caller has a promotion staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    pub uci: Option<UciMove>,
    pub promotion: Option<PromotionPiece>,
}

impl MakeMoveRequest {
    pub fn validate(&self) -> Result<MoveCommand, GameServiceError> {
        let uci = match self.uci.as_deref() {
            Some(uci) => {
                require_non_empty("move", uci)?;
                Some(UciMove::parse(uci)?)
            }
            None => None,
        };
        let promotion = match self.promotion.as_deref() {
            Some(letter) => Some(PromotionPiece::from_letter(letter).ok_or_else(|| {
                GameServiceError::ValidationError("Invalid promotion piece.".to_string())
            })?),
            None => None,
        };
        if uci.is_none() && promotion.is_none() {
            return Err(GameServiceError::ValidationError(
                "Either move or promotion must be provided.".to_string(),
            ));
        }
        Ok(MoveCommand { uci, promotion })
    }
}

impl MoveCommand {
    /// Promotion piece from the separate field, falling back to the fifth move character.
    pub fn promotion_piece(&self) -> Option<PromotionPiece> {
        self.promotion
            .or_else(|| self.uci.as_ref().and_then(|uci| uci.promotion))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
    OfferRematch,
    UpdateStatus(Presence),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameActionRequest {
    pub action: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl GameActionRequest {
    pub fn validate(&self) -> Result<GameAction, GameServiceError> {
        match self.action.as_str() {
            "resign" => Ok(GameAction::Resign),
            "offer_draw" => Ok(GameAction::OfferDraw),
            "accept_draw" => Ok(GameAction::AcceptDraw),
            "decline_draw" => Ok(GameAction::DeclineDraw),
            "offer_rematch" => Ok(GameAction::OfferRematch),
            "update_status" => match self.value.as_deref() {
                Some("online") => Ok(GameAction::UpdateStatus(Presence::Online)),
                Some("disconnected") => Ok(GameAction::UpdateStatus(Presence::Disconnected)),
                _ => Err(GameServiceError::ValidationError(
                    "Invalid status value.".to_string(),
                )),
            },
            "" => Err(GameServiceError::ValidationError(
                "action cannot be empty".to_string(),
            )),
            other => Err(GameServiceError::ValidationError(format!(
                "Invalid action: {}",
                other
            ))),
        }
    }
}

/// Requested time control in seconds. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl(i64);

impl TimeControl {
    pub fn seconds(self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    pub time_control: i64,
}

impl EnqueueRequest {
    pub fn validate(&self) -> Result<TimeControl, GameServiceError> {
        if self.time_control <= 0 {
            return Err(GameServiceError::ValidationError(
                "Time control must be a positive number of seconds.".to_string(),
            ));
        }
        Ok(TimeControl(self.time_control))
    }
}
