use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::AnswerSelection;
use crate::models::quiz_attempt::{AttemptKey, QuizAttempt};
use crate::services::attempt_store::{
    AttemptChange, AttemptStore, Completion, Decision, Effect, NewAttempt, Slot,
};
use crate::services::catalog::{EnrollmentDirectory, QuizCatalog};
use crate::services::grading_service::{Grade, GradingService};
use crate::services::time_guard::TimeGuard;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub attempt_id: Uuid,
    pub score: i32,
    pub percentage: i32,
    pub correct: usize,
    pub total: usize,
    /// The attempt was created by this submission rather than started earlier.
    pub created_on_submit: bool,
}

#[derive(Clone)]
pub struct SubmissionService {
    store: Arc<dyn AttemptStore>,
    catalog: Arc<dyn QuizCatalog>,
    enrollments: Arc<dyn EnrollmentDirectory>,
    time_guard: TimeGuard,
}

impl SubmissionService {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn QuizCatalog>,
        enrollments: Arc<dyn EnrollmentDirectory>,
        time_guard: TimeGuard,
    ) -> Self {
        Self {
            store,
            catalog,
            enrollments,
            time_guard,
        }
    }

    /// Grades the answers and finalizes the student's attempt together with them.
    ///
    /// Validation happens before the slot is touched, so a rejected submission
    /// leaves the attempt exactly as it was.
    pub async fn submit(
        &self,
        student_id: Uuid,
        quiz_id: Uuid,
        answers: Vec<AnswerSelection>,
    ) -> Result<SubmissionReceipt> {
        let quiz = self
            .catalog
            .get_quiz_with_answer_key(quiz_id)
            .await?
            .ok_or(Error::QuizNotFound)?;

        if !self.enrollments.is_enrolled(student_id, quiz.course_id).await? {
            return Err(Error::NotEnrolled);
        }

        GradingService::validate_submission(&quiz, &answers).inspect_err(|e| {
            tracing::info!(%student_id, %quiz_id, reason = %e, "Submission rejected");
        })?;
        let grade = GradingService::grade(&quiz, &answers);

        let key = AttemptKey::new(student_id, quiz_id);
        let now = Utc::now();
        let max_attempts = quiz.max_attempts;
        let guard = self.time_guard;

        let outcome = self
            .store
            .apply(
                &key,
                Box::new(move |slot: &Slot| {
                    decide_submission(slot, &guard, max_attempts, grade.score, answers, now)
                }),
            )
            .await
            .inspect_err(|e| {
                tracing::info!(%student_id, %quiz_id, reason = %e, "Submission refused");
            })?;

        let created_on_submit = outcome.effect == Effect::Inserted;
        tracing::info!(
            %student_id,
            %quiz_id,
            attempt_id = %outcome.attempt.id,
            score = grade.score,
            correct = grade.correct,
            total = grade.total,
            created_on_submit,
            "Quiz submitted"
        );
        Ok(receipt(&outcome.attempt, grade, created_on_submit))
    }
}

/// Finalizes the active attempt. Without one, an existing attempt means the
/// quiz was already submitted; an empty slot gets a terminal attempt created
/// directly, within the attempt limit.
pub fn decide_submission(
    slot: &Slot,
    guard: &TimeGuard,
    max_attempts: i32,
    score: i32,
    answers: Vec<AnswerSelection>,
    now: DateTime<Utc>,
) -> Result<Decision> {
    let completion = Completion {
        completed_at: now,
        score,
        answers,
    };

    if let Some(active) = &slot.active {
        guard.check_submission(active, now)?;
        return Ok(Decision::Update {
            attempt_id: active.id,
            change: AttemptChange::Finalize {
                warnings: active.warnings,
                is_blocked: false,
                completion,
            },
        });
    }

    if slot.latest.is_some() {
        return Err(Error::AlreadySubmitted);
    }
    if slot.attempts >= i64::from(max_attempts.max(0)) {
        return Err(Error::AttemptLimitReached);
    }

    Ok(Decision::Insert(NewAttempt {
        completion: Some(completion),
        ..NewAttempt::active(now, None)
    }))
}

fn receipt(attempt: &QuizAttempt, grade: Grade, created_on_submit: bool) -> SubmissionReceipt {
    SubmissionReceipt {
        attempt_id: attempt.id,
        score: attempt.score.unwrap_or(grade.score),
        percentage: grade.percentage,
        correct: grade.correct,
        total: grade.total,
        created_on_submit,
    }
}
