use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::middleware::auth::{ActorIdentity, Role};
use crate::models::quiz::Quiz;
use crate::models::quiz_attempt::{AttemptKey, AttemptPhase};
use crate::services::attempt_store::{AttemptFilter, AttemptStore, AttemptWithAnswers};
use crate::services::catalog::{EnrollmentDirectory, QuizCatalog};
use crate::services::time_guard::TimeGuard;

pub const STUDENT_HISTORY_LIMIT: i64 = 200;
pub const QUIZ_HISTORY_LIMIT: i64 = 2000;

/// Where a student stands on one quiz: the active attempt, else the latest one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStatus {
    pub attempt_id: Uuid,
    pub state: AttemptPhase,
    pub warnings: i32,
    pub is_blocked: bool,
    pub score: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub remaining_seconds: Option<i64>,
    pub attempts_used: i64,
    pub max_attempts: i32,
}

/// Read side of the attempt lifecycle.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn AttemptStore>,
    catalog: Arc<dyn QuizCatalog>,
    enrollments: Arc<dyn EnrollmentDirectory>,
}

impl HistoryService {
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

    async fn quiz(&self, quiz_id: Uuid) -> Result<Quiz> {
        self.catalog
            .get_quiz_with_answer_key(quiz_id)
            .await?
            .ok_or(Error::QuizNotFound)
    }

    /// Loads a quiz the student may see. Outsiders get `NotEnrolled`.
    pub async fn quiz_for_student(&self, student_id: Uuid, quiz_id: Uuid) -> Result<Quiz> {
        let quiz = self.quiz(quiz_id).await?;
        if !self.enrollments.is_enrolled(student_id, quiz.course_id).await? {
            return Err(Error::NotEnrolled);
        }
        Ok(quiz)
    }

    /// Students see quizzes of their courses; staff see quizzes they may grade.
    pub async fn quiz_for_actor(&self, actor: &ActorIdentity, quiz_id: Uuid) -> Result<Quiz> {
        if actor.role == Role::Student {
            return self.quiz_for_student(actor.user_id, quiz_id).await;
        }
        let quiz = self.quiz(quiz_id).await?;
        authorize_staff(actor, &quiz)?;
        Ok(quiz)
    }

    pub async fn status(&self, student_id: Uuid, quiz_id: Uuid) -> Result<AttemptStatus> {
        let quiz = self.quiz_for_student(student_id, quiz_id).await?;
        let slot = self
            .store
            .snapshot(&AttemptKey::new(student_id, quiz_id))
            .await?;

        let attempt = slot.latest.ok_or(Error::NoActiveAttempt)?;
        Ok(AttemptStatus {
            attempt_id: attempt.id,
            state: attempt.phase(),
            warnings: attempt.warnings,
            is_blocked: attempt.is_blocked,
            score: attempt.score,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            expires_at: attempt.expires_at,
            remaining_seconds: TimeGuard::remaining_seconds(&attempt, Utc::now()),
            attempts_used: slot.attempts,
            max_attempts: quiz.max_attempts,
        })
    }

    /// The student's own attempts, newest first.
    pub async fn list_for_student(
        &self,
        student_id: Uuid,
        quiz_id: Option<Uuid>,
        course_id: Option<Uuid>,
    ) -> Result<Vec<AttemptWithAnswers>> {
        let quiz_ids = match course_id {
            Some(course_id) => Some(self.catalog.quiz_ids(Some(course_id), None).await?),
            None => None,
        };
        self.store
            .list_attempts(&AttemptFilter {
                student_id: Some(student_id),
                quiz_id,
                quiz_ids,
                limit: STUDENT_HISTORY_LIMIT,
            })
            .await
    }

    /// All attempts on a quiz, for its teacher or an admin.
    pub async fn list_for_quiz(
        &self,
        actor: &ActorIdentity,
        quiz_id: Uuid,
        student_id: Option<Uuid>,
    ) -> Result<Vec<AttemptWithAnswers>> {
        let quiz = self.quiz(quiz_id).await?;
        authorize_staff(actor, &quiz)?;

        self.store
            .list_attempts(&AttemptFilter {
                student_id,
                quiz_id: Some(quiz_id),
                quiz_ids: None,
                limit: QUIZ_HISTORY_LIMIT,
            })
            .await
    }

    /// Attempts across the caller's courses. Teachers only ever see quizzes of
    /// courses they teach, so a foreign `quiz_id` or `course_id` yields nothing.
    pub async fn list_for_staff(
        &self,
        actor: &ActorIdentity,
        quiz_id: Option<Uuid>,
        course_id: Option<Uuid>,
        student_id: Option<Uuid>,
    ) -> Result<Vec<AttemptWithAnswers>> {
        let quiz_ids = match actor.role {
            Role::Admin if course_id.is_none() => None,
            Role::Admin => Some(self.catalog.quiz_ids(course_id, None).await?),
            Role::Teacher => Some(
                self.catalog
                    .quiz_ids(course_id, Some(actor.user_id))
                    .await?,
            ),
            Role::Student => {
                return Err(Error::Forbidden("Teacher or admin role required".to_string()))
            }
        };
        if quiz_ids.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(Vec::new());
        }

        self.store
            .list_attempts(&AttemptFilter {
                student_id,
                quiz_id,
                quiz_ids,
                limit: QUIZ_HISTORY_LIMIT,
            })
            .await
    }
}

fn authorize_staff(actor: &ActorIdentity, quiz: &Quiz) -> Result<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Teacher if quiz.teacher_id == Some(actor.user_id) => Ok(()),
        _ => {
            tracing::warn!(
                actor_id = %actor.user_id,
                role = ?actor.role,
                quiz_id = %quiz.id,
                "Quiz access refused"
            );
            Err(Error::Forbidden("Not the teacher of this course".to_string()))
        }
    }
}
