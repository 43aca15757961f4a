use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::quiz::Quiz;

/// Read-only source of quizzes, including which option of each question is correct.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    async fn get_quiz_with_answer_key(&self, quiz_id: Uuid) -> Result<Option<Quiz>>;

    /// Ids of quizzes in `course_id` whose course is taught by `teacher_id`.
    /// A `None` leaves that side unconstrained.
    async fn quiz_ids(&self, course_id: Option<Uuid>, teacher_id: Option<Uuid>)
        -> Result<Vec<Uuid>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentDirectory: Send + Sync {
    async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> Result<bool>;
}
