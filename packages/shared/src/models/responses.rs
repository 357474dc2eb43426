use serde::{Deserialize, Serialize};

use crate::models::game_session::{Outcome, Winner};

/// What a session operation did once its transaction committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    PromotionRequired,
    Finished {
        winner: Option<Winner>,
        outcome: Outcome,
    },
    AlreadyCompleted {
        outcome: Option<Outcome>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub requires_promotion: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<Winner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl From<ActionOutcome> for ActionResponse {
    fn from(result: ActionOutcome) -> Self {
        let base = ActionResponse {
            success: true,
            requires_promotion: false,
            already_completed: false,
            winner: None,
            outcome: None,
        };
        match result {
            ActionOutcome::Applied => base,
            ActionOutcome::PromotionRequired => ActionResponse {
                requires_promotion: true,
                ..base
            },
            ActionOutcome::Finished { winner, outcome } => ActionResponse {
                winner,
                outcome: Some(outcome),
                ..base
            },
            ActionOutcome::AlreadyCompleted { outcome } => ActionResponse {
                already_completed: true,
                outcome,
                ..base
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "status",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum EnqueueResult {
    Matched { session_id: String },
    Waiting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DequeueResponse {
    pub success: bool,
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RematchResponse {
    pub session_id: String,
}
