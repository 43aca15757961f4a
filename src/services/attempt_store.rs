use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerSelection};
use crate::models::quiz_attempt::{ActiveAttempt, AttemptKey, QuizAttempt};

pub const MAX_SCORE: i32 = 20;

/// Everything known about one (student, quiz) slot, read while the slot is locked.
#[derive(Debug, Clone)]
pub struct Slot {
    pub key: AttemptKey,
    /// Attempts in any state.
    pub attempts: i64,
    pub active: Option<ActiveAttempt>,
    /// Most recent attempt; equals `active` when one exists.
    pub latest: Option<QuizAttempt>,
}

impl Slot {
    pub fn empty(key: AttemptKey) -> Self {
        Self {
            key,
            attempts: 0,
            active: None,
            latest: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub completed_at: DateTime<Utc>,
    pub score: i32,
    pub answers: Vec<AnswerSelection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttempt {
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub warnings: i32,
    pub is_blocked: bool,
    /// `Some` creates the attempt directly in a terminal state.
    pub completion: Option<Completion>,
}

impl NewAttempt {
    pub fn active(started_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            started_at,
            expires_at,
            warnings: 0,
            is_blocked: false,
            completion: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptChange {
    Warn {
        warnings: i32,
    },
    Finalize {
        warnings: i32,
        is_blocked: bool,
        completion: Completion,
    },
}

/// What a lifecycle operation wants done to a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Insert(NewAttempt),
    Update {
        attempt_id: Uuid,
        change: AttemptChange,
    },
    Unchanged(QuizAttempt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Inserted,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    pub attempt: QuizAttempt,
    pub effect: Effect,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptWithAnswers {
    #[serde(flatten)]
    pub attempt: QuizAttempt,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Default)]
pub struct AttemptFilter {
    pub student_id: Option<Uuid>,
    pub quiz_id: Option<Uuid>,
    /// Restricts to these quizzes; an empty set matches nothing.
    pub quiz_ids: Option<Vec<Uuid>>,
    pub limit: i64,
}

impl AttemptFilter {
    pub fn matches(&self, attempt: &QuizAttempt) -> bool {
        self.student_id.map_or(true, |s| attempt.student_id == s)
            && self.quiz_id.map_or(true, |q| attempt.quiz_id == q)
            && self
                .quiz_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&attempt.quiz_id))
    }
}

pub type Decide<'a> = Box<dyn FnOnce(&Slot) -> Result<Decision> + Send + 'a>;

/// Transactional home of attempts and answers.
///
/// `apply` is the only write path: it locks the slot for `key`, hands a
/// snapshot to `decide`, checks the decision against the attempt invariants
/// and persists it before releasing the lock. An `Err` from `decide` aborts
/// without writing anything.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn apply(&self, key: &AttemptKey, decide: Decide<'_>) -> Result<Outcome>;

    async fn snapshot(&self, key: &AttemptKey) -> Result<Slot>;

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<AttemptWithAnswers>>;
}

/// Rejects decisions that would break an attempt invariant.
pub fn check_decision(slot: &Slot, decision: &Decision) -> Result<()> {
    match decision {
        Decision::Unchanged(_) => Ok(()),
        Decision::Insert(new) => {
            if new.warnings < 0 {
                return Err(Error::Internal("negative warning count".into()));
            }
            match &new.completion {
                None => {
                    if slot.active.is_some() {
                        return Err(Error::AttemptAlreadyActive);
                    }
                    if new.is_blocked {
                        return Err(Error::Internal("blocked attempt without completion".into()));
                    }
                    Ok(())
                }
                Some(completion) => check_completion(completion),
            }
        }
        Decision::Update { attempt_id, change } => {
            let Some(active) = slot.active.as_ref().filter(|a| a.id == *attempt_id) else {
                return Err(Error::Internal(format!(
                    "attempt {} is not the active attempt of {}",
                    attempt_id, slot.key
                )));
            };
            let warnings = match change {
                AttemptChange::Warn { warnings } => *warnings,
                AttemptChange::Finalize {
                    warnings,
                    completion,
                    ..
                } => {
                    check_completion(completion)?;
                    *warnings
                }
            };
            if warnings < active.warnings {
                return Err(Error::Internal("warning count may not decrease".into()));
            }
            Ok(())
        }
    }
}

fn check_completion(completion: &Completion) -> Result<()> {
    if !(0..=MAX_SCORE).contains(&completion.score) {
        return Err(Error::Internal(format!(
            "score {} outside 0..={}",
            completion.score, MAX_SCORE
        )));
    }
    Ok(())
}
