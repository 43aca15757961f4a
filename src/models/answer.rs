use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub attempt_id: Uuid,
    pub question_id: Uuid,
    pub selected_option_id: Uuid,
}

/// One submitted `{questionId, selectedOptionId}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSelection {
    pub question_id: Uuid,
    pub selected_option_id: Uuid,
}

impl AnswerSelection {
    pub fn into_answer(self, attempt_id: Uuid) -> Answer {
        Answer {
            id: Uuid::new_v4(),
            attempt_id,
            question_id: self.question_id,
            selected_option_id: self.selected_option_id,
        }
    }
}
