use serde::{Deserialize, Serialize};

use crate::model::progress::CompletionOutcome;

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCompletionResponse {
    pub success: bool,
    pub message: String,
    pub new_xp: i64,
    pub new_level: i64,
    pub streak: i64,
    pub course_completed: bool,
}

impl From<CompletionOutcome> for ModuleCompletionResponse {
    fn from(outcome: CompletionOutcome) -> Self {
        Self {
            success: true,
            message: String::from("Mission success!"),
            new_xp: outcome.xp,
            new_level: outcome.level,
            streak: outcome.streak,
            course_completed: outcome.course_completed,
        }
    }
}
