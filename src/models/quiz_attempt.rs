use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::ops::Deref;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub quiz_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub warnings: i32,
    pub is_blocked: bool,
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptPhase {
    Active,
    Completed,
    Blocked,
}

impl QuizAttempt {
    pub fn key(&self) -> AttemptKey {
        AttemptKey::new(self.student_id, self.quiz_id)
    }

    pub fn phase(&self) -> AttemptPhase {
        match (self.completed_at, self.is_blocked) {
            (None, _) => AttemptPhase::Active,
            (Some(_), true) => AttemptPhase::Blocked,
            (Some(_), false) => AttemptPhase::Completed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// An attempt observed with `completed_at = NULL` under its slot lock.
///
/// Only the attempt stores build these, so decision code that takes an
/// `ActiveAttempt` can never be handed a terminal record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttempt(QuizAttempt);

impl ActiveAttempt {
    pub(crate) fn from_attempt(attempt: QuizAttempt) -> Option<Self> {
        if attempt.is_terminal() {
            None
        } else {
            Some(Self(attempt))
        }
    }

    pub fn into_inner(self) -> QuizAttempt {
        self.0
    }
}

impl Deref for ActiveAttempt {
    type Target = QuizAttempt;

    fn deref(&self) -> &QuizAttempt {
        &self.0
    }
}

/// The per-(student, quiz) slot every lifecycle operation serializes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptKey {
    pub student_id: Uuid,
    pub quiz_id: Uuid,
}

impl AttemptKey {
    pub fn new(student_id: Uuid, quiz_id: Uuid) -> Self {
        Self {
            student_id,
            quiz_id,
        }
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.student_id, self.quiz_id)
    }
}
