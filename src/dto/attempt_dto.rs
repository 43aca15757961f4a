use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::AnswerSelection;
use crate::models::quiz_attempt::QuizAttempt;
use crate::services::submission_service::SubmissionReceipt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAttemptResponse {
    pub attempt_id: Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<QuizAttempt> for StartAttemptResponse {
    fn from(attempt: QuizAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            started_at: attempt.started_at,
            expires_at: attempt.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEventRequest {
    /// `"warning"` or `"leave"`.
    pub event: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEventResponse {
    pub warnings: i32,
    pub is_blocked: bool,
    pub message: String,
}

impl From<QuizAttempt> for RecordEventResponse {
    fn from(attempt: QuizAttempt) -> Self {
        let message = if attempt.is_blocked {
            "Attempt blocked"
        } else if attempt.is_terminal() {
            "Attempt already submitted"
        } else {
            "Event recorded successfully"
        };
        Self {
            warnings: attempt.warnings,
            is_blocked: attempt.is_blocked,
            message: message.to_string(),
        }
    }
}

/// Submit bodies arrive either as a bare array or wrapped in `{"answers": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SubmitPayload {
    Bare(Vec<AnswerSelection>),
    Wrapped(SubmitQuizRequest),
}

impl From<SubmitPayload> for SubmitQuizRequest {
    fn from(payload: SubmitPayload) -> Self {
        match payload {
            SubmitPayload::Bare(answers) => Self { answers },
            SubmitPayload::Wrapped(req) => req,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    #[validate(length(max = 500))]
    pub answers: Vec<AnswerSelection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuizResponse {
    pub attempt_id: Uuid,
    /// 0..=20.
    pub score: i32,
    pub percentage: i32,
    pub correct: usize,
    pub total: usize,
    pub message: String,
}

impl From<SubmissionReceipt> for SubmitQuizResponse {
    fn from(receipt: SubmissionReceipt) -> Self {
        Self {
            attempt_id: receipt.attempt_id,
            score: receipt.score,
            percentage: receipt.percentage,
            correct: receipt.correct,
            total: receipt.total,
            message: "Quiz submitted successfully".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyAttemptsQuery {
    pub quiz_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptsQuery {
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffAttemptsQuery {
    pub quiz_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}
