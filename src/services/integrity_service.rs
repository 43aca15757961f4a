use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::quiz_attempt::{ActiveAttempt, AttemptKey, QuizAttempt};
use crate::services::attempt_store::{
    AttemptChange, AttemptStore, Completion, Decision, Effect, Slot,
};

/// Warnings that block an attempt.
pub const MAX_WARNINGS: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationKind {
    /// Soft signal, e.g. a brief tab blur.
    Warning,
    /// Hard signal: the student left the quiz page.
    Leave,
}

impl FromStr for ViolationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("warning") => Ok(ViolationKind::Warning),
            v if v.eq_ignore_ascii_case("leave") => Ok(ViolationKind::Leave),
            _ => Err(Error::InvalidInput("Invalid event type".to_string())),
        }
    }
}

#[derive(Clone)]
pub struct IntegrityService {
    store: Arc<dyn AttemptStore>,
}

impl IntegrityService {
    pub fn new(store: Arc<dyn AttemptStore>) -> Self {
        Self { store }
    }

    /// Applies a proctoring event to the student's active attempt.
    /// Returns the attempt as stored afterwards.
    pub async fn record_event(
        &self,
        student_id: Uuid,
        quiz_id: Uuid,
        kind: ViolationKind,
    ) -> Result<QuizAttempt> {
        let key = AttemptKey::new(student_id, quiz_id);
        let now = Utc::now();
        let outcome = self
            .store
            .apply(
                &key,
                Box::new(move |slot: &Slot| decide_violation(slot, kind, now)),
            )
            .await?;
        let attempt = outcome.attempt;

        match outcome.effect {
            Effect::Unchanged => tracing::info!(
                %student_id,
                %quiz_id,
                attempt_id = %attempt.id,
                ?kind,
                "Integrity event ignored: attempt already final"
            ),
            _ if attempt.is_blocked => tracing::warn!(
                %student_id,
                %quiz_id,
                attempt_id = %attempt.id,
                ?kind,
                warnings = attempt.warnings,
                "Attempt blocked for integrity violation"
            ),
            _ => tracing::info!(
                %student_id,
                %quiz_id,
                attempt_id = %attempt.id,
                warnings = attempt.warnings,
                "Integrity warning recorded"
            ),
        }
        Ok(attempt)
    }
}

/// Terminal attempts report their frozen state; only an empty slot is an error.
pub fn decide_violation(slot: &Slot, kind: ViolationKind, now: DateTime<Utc>) -> Result<Decision> {
    match (&slot.active, &slot.latest) {
        (Some(active), _) => Ok(assess(active, kind, now)),
        (None, Some(latest)) => Ok(Decision::Unchanged(latest.clone())),
        (None, None) => Err(Error::NoActiveAttempt),
    }
}

/// A single Leave blocks outright; Warnings block once they reach `MAX_WARNINGS`.
pub fn assess(active: &ActiveAttempt, kind: ViolationKind, now: DateTime<Utc>) -> Decision {
    let warnings = active.warnings + 1;
    let block = match kind {
        ViolationKind::Leave => true,
        ViolationKind::Warning => warnings >= MAX_WARNINGS,
    };

    let change = if block {
        AttemptChange::Finalize {
            warnings,
            is_blocked: true,
            completion: Completion {
                completed_at: now,
                score: 0,
                answers: Vec::new(),
            },
        }
    } else {
        AttemptChange::Warn { warnings }
    };

    Decision::Update {
        attempt_id: active.id,
        change,
    }
}
