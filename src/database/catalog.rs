use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::Result;
use crate::models::quiz::{Question, Quiz, QuizOption};
use crate::services::catalog::{EnrollmentDirectory, QuizCatalog};

#[derive(Debug, FromRow)]
struct QuizRow {
    id: Uuid,
    course_id: Uuid,
    teacher_id: Option<Uuid>,
    title: String,
    time_limit_minutes: i32,
    max_attempts: i32,
}

#[derive(Debug, FromRow)]
struct QuestionRow {
    id: Uuid,
    text: String,
}

#[derive(Debug, FromRow)]
struct OptionRow {
    id: Uuid,
    question_id: Uuid,
    text: String,
    is_correct: bool,
}

#[derive(Clone)]
pub struct PgQuizCatalog {
    pool: PgPool,
}

impl PgQuizCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizCatalog for PgQuizCatalog {
    async fn get_quiz_with_answer_key(&self, quiz_id: Uuid) -> Result<Option<Quiz>> {
        let Some(quiz) = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT q.id, q.course_id, c.teacher_id, q.title, q.time_limit_minutes, q.max_attempts
            FROM quizzes q
            LEFT JOIN courses c ON c.id = q.course_id
            WHERE q.id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"SELECT id, text FROM questions WHERE quiz_id = $1 ORDER BY position, id"#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let options = sqlx::query_as::<_, OptionRow>(
            r#"
            SELECT o.id, o.question_id, o.text, o.is_correct
            FROM options o
            JOIN questions q ON q.id = o.question_id
            WHERE q.quiz_id = $1
            ORDER BY o.position, o.id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;

        let questions = questions
            .into_iter()
            .map(|q| Question {
                options: options
                    .iter()
                    .filter(|o| o.question_id == q.id)
                    .map(|o| QuizOption {
                        id: o.id,
                        text: o.text.clone(),
                        is_correct: o.is_correct,
                    })
                    .collect(),
                id: q.id,
                text: q.text,
            })
            .collect();

        Ok(Some(Quiz {
            id: quiz.id,
            course_id: quiz.course_id,
            teacher_id: quiz.teacher_id,
            title: quiz.title,
            time_limit_minutes: quiz.time_limit_minutes,
            max_attempts: quiz.max_attempts,
            questions,
        }))
    }

    async fn quiz_ids(
        &self,
        course_id: Option<Uuid>,
        teacher_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT q.id
            FROM quizzes q
            JOIN courses c ON c.id = q.course_id
            WHERE ($1::uuid IS NULL OR q.course_id = $1)
              AND ($2::uuid IS NULL OR c.teacher_id = $2)
            "#,
        )
        .bind(course_id)
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[derive(Clone)]
pub struct PgEnrollmentDirectory {
    pool: PgPool,
}

impl PgEnrollmentDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrollmentDirectory for PgEnrollmentDirectory {
    async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> Result<bool> {
        let enrolled: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM enrollments WHERE student_id = $1 AND course_id = $2)"#,
        )
        .bind(student_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(enrolled)
    }
}
