use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::quiz_attempt::{AttemptKey, QuizAttempt};
use crate::services::attempt_store::{AttemptStore, Decision, NewAttempt, Slot};
use crate::services::catalog::{EnrollmentDirectory, QuizCatalog};
use crate::services::time_guard::TimeGuard;

#[derive(Clone)]
pub struct AdmissionService {
    store: Arc<dyn AttemptStore>,
    catalog: Arc<dyn QuizCatalog>,
    enrollments: Arc<dyn EnrollmentDirectory>,
}

impl AdmissionService {
    pub fn new(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn QuizCatalog>,
        enrollments: Arc<dyn EnrollmentDirectory>,
    ) -> Self {
        Self {
            store,
            catalog,
            enrollments,
        }
    }

    /// Starts a new attempt for the student, or explains why it may not start.
    pub async fn request_attempt(&self, student_id: Uuid, quiz_id: Uuid) -> Result<QuizAttempt> {
        let quiz = self
            .catalog
            .get_quiz_with_answer_key(quiz_id)
            .await?
            .ok_or(Error::QuizNotFound)?;

        if !self.enrollments.is_enrolled(student_id, quiz.course_id).await? {
            tracing::info!(%student_id, %quiz_id, "Attempt refused: student not enrolled");
            return Err(Error::NotEnrolled);
        }

        let key = AttemptKey::new(student_id, quiz_id);
        let started_at = Utc::now();
        let expires_at = TimeGuard::deadline_for(&quiz, started_at);
        let max_attempts = quiz.max_attempts;

        let outcome = self
            .store
            .apply(
                &key,
                Box::new(move |slot: &Slot| {
                    decide_admission(slot, max_attempts, started_at, expires_at)
                }),
            )
            .await
            .inspect_err(|e| {
                tracing::info!(%student_id, %quiz_id, reason = %e, "Attempt refused");
            })?;

        tracing::info!(
            %student_id,
            %quiz_id,
            attempt_id = %outcome.attempt.id,
            expires_at = ?outcome.attempt.expires_at,
            "Attempt admitted"
        );
        Ok(outcome.attempt)
    }
}

/// Limit first, then the single-active-attempt rule.
pub fn decide_admission(
    slot: &Slot,
    max_attempts: i32,
    started_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<Decision> {
    if slot.attempts >= i64::from(max_attempts.max(0)) {
        return Err(Error::AttemptLimitReached);
    }
    if slot.active.is_some() {
        return Err(Error::AttemptAlreadyActive);
    }
    Ok(Decision::Insert(NewAttempt::active(started_at, expires_at)))
}
