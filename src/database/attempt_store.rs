use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::answer::{Answer, AnswerSelection};
use crate::models::quiz_attempt::{ActiveAttempt, AttemptKey, QuizAttempt};
use crate::services::attempt_store::{
    check_decision, AttemptChange, AttemptFilter, AttemptStore, AttemptWithAnswers, Decide,
    Decision, Effect, Outcome, Slot,
};

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn lock_slot(tx: &mut Transaction<'_, Postgres>, key: &AttemptKey) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(key.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn load_slot(tx: &mut Transaction<'_, Postgres>, key: &AttemptKey) -> Result<Slot> {
    let attempts: i64 = sqlx::query_scalar(
        r#"SELECT COUNT(*) FROM quiz_attempts WHERE student_id = $1 AND quiz_id = $2"#,
    )
    .bind(key.student_id)
    .bind(key.quiz_id)
    .fetch_one(&mut **tx)
    .await?;

    let latest = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, student_id, quiz_id, started_at, expires_at, completed_at, warnings, is_blocked, score
        FROM quiz_attempts
        WHERE student_id = $1 AND quiz_id = $2
        ORDER BY (completed_at IS NULL) DESC, started_at DESC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(key.student_id)
    .bind(key.quiz_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(Slot {
        key: *key,
        attempts,
        active: latest.clone().and_then(ActiveAttempt::from_attempt),
        latest,
    })
}

async fn insert_answers(
    tx: &mut Transaction<'_, Postgres>,
    attempt_id: Uuid,
    answers: Vec<AnswerSelection>,
) -> Result<()> {
    if answers.is_empty() {
        return Ok(());
    }
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "INSERT INTO quiz_answers (id, attempt_id, question_id, selected_option_id) ",
    );
    builder.push_values(answers, |mut row, selection| {
        row.push_bind(Uuid::new_v4())
            .push_bind(attempt_id)
            .push_bind(selection.question_id)
            .push_bind(selection.selected_option_id);
    });
    builder.build().execute(&mut **tx).await?;
    Ok(())
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn apply(&self, key: &AttemptKey, decide: Decide<'_>) -> Result<Outcome> {
        let mut tx = self.pool.begin().await?;
        lock_slot(&mut tx, key).await?;

        let slot = load_slot(&mut tx, key).await?;
        let decision = decide(&slot)?;
        check_decision(&slot, &decision)?;

        let outcome = match decision {
            Decision::Unchanged(attempt) => Outcome {
                attempt,
                effect: Effect::Unchanged,
            },
            Decision::Insert(new) => {
                let (completed_at, score, answers) = match new.completion {
                    Some(c) => (Some(c.completed_at), Some(c.score), c.answers),
                    None => (None, None, Vec::new()),
                };
                let attempt = sqlx::query_as::<_, QuizAttempt>(
                    r#"
                    INSERT INTO quiz_attempts (
                        id, student_id, quiz_id, started_at, expires_at, completed_at, warnings, is_blocked, score
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    RETURNING id, student_id, quiz_id, started_at, expires_at, completed_at, warnings, is_blocked, score
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(key.student_id)
                .bind(key.quiz_id)
                .bind(new.started_at)
                .bind(new.expires_at)
                .bind(completed_at)
                .bind(new.warnings)
                .bind(new.is_blocked)
                .bind(score)
                .fetch_one(&mut *tx)
                .await?;
                insert_answers(&mut tx, attempt.id, answers).await?;
                Outcome {
                    attempt,
                    effect: Effect::Inserted,
                }
            }
            Decision::Update { attempt_id, change } => {
                let updated = match change {
                    AttemptChange::Warn { warnings } => {
                        sqlx::query_as::<_, QuizAttempt>(
                            r#"
                            UPDATE quiz_attempts
                            SET warnings = $2
                            WHERE id = $1 AND completed_at IS NULL
                            RETURNING id, student_id, quiz_id, started_at, expires_at, completed_at, warnings, is_blocked, score
                            "#,
                        )
                        .bind(attempt_id)
                        .bind(warnings)
                        .fetch_optional(&mut *tx)
                        .await?
                    }
                    AttemptChange::Finalize {
                        warnings,
                        is_blocked,
                        completion,
                    } => {
                        let updated = sqlx::query_as::<_, QuizAttempt>(
                            r#"
                            UPDATE quiz_attempts
                            SET warnings = $2, is_blocked = $3, score = $4, completed_at = $5
                            WHERE id = $1 AND completed_at IS NULL
                            RETURNING id, student_id, quiz_id, started_at, expires_at, completed_at, warnings, is_blocked, score
                            "#,
                        )
                        .bind(attempt_id)
                        .bind(warnings)
                        .bind(is_blocked)
                        .bind(completion.score)
                        .bind(completion.completed_at)
                        .fetch_optional(&mut *tx)
                        .await?;
                        if updated.is_some() {
                            insert_answers(&mut tx, attempt_id, completion.answers).await?;
                        }
                        updated
                    }
                };
                let attempt = updated.ok_or_else(|| {
                    Error::Internal(format!("active attempt {} was finalized concurrently", attempt_id))
                })?;
                Outcome {
                    attempt,
                    effect: Effect::Updated,
                }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn snapshot(&self, key: &AttemptKey) -> Result<Slot> {
        let mut tx = self.pool.begin().await?;
        let slot = load_slot(&mut tx, key).await?;
        tx.commit().await?;
        Ok(slot)
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<AttemptWithAnswers>> {
        let limit = if filter.limit > 0 { filter.limit } else { i64::MAX };
        let attempts = sqlx::query_as::<_, QuizAttempt>(
            r#"
            SELECT id, student_id, quiz_id, started_at, expires_at, completed_at, warnings, is_blocked, score
            FROM quiz_attempts
            WHERE ($1::uuid IS NULL OR student_id = $1)
              AND ($2::uuid IS NULL OR quiz_id = $2)
              AND ($3::uuid[] IS NULL OR quiz_id = ANY($3))
            ORDER BY started_at DESC
            LIMIT $4
            "#,
        )
        .bind(filter.student_id)
        .bind(filter.quiz_id)
        .bind(filter.quiz_ids.as_deref())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = attempts.iter().map(|a| a.id).collect();
        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT id, attempt_id, question_id, selected_option_id
            FROM quiz_answers
            WHERE attempt_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts
            .into_iter()
            .map(|attempt| {
                let answers = answers
                    .iter()
                    .filter(|a| a.attempt_id == attempt.id)
                    .cloned()
                    .collect();
                AttemptWithAnswers { attempt, answers }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::attempt_store::{Completion, NewAttempt};
    use chrono::Utc;

    struct Seeded {
        quiz_id: Uuid,
        question_id: Uuid,
        option_id: Uuid,
    }

    async fn seed_quiz(pool: &PgPool) -> Seeded {
        let course_id = Uuid::new_v4();
        let quiz_id = Uuid::new_v4();
        let question_id = Uuid::new_v4();
        let option_id = Uuid::new_v4();
        sqlx::query("INSERT INTO courses (id, title, teacher_id) VALUES ($1, 'Course', $2)")
            .bind(course_id)
            .bind(Uuid::new_v4())
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO quizzes (id, course_id, title, time_limit_minutes, max_attempts) VALUES ($1, $2, 'Quiz', 10, 3)",
        )
        .bind(quiz_id)
        .bind(course_id)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO questions (id, quiz_id, text) VALUES ($1, $2, 'Q')")
            .bind(question_id)
            .bind(quiz_id)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO options (id, question_id, text, is_correct) VALUES ($1, $2, 'A', TRUE)",
        )
        .bind(option_id)
        .bind(question_id)
        .execute(pool)
        .await
        .unwrap();
        Seeded {
            quiz_id,
            question_id,
            option_id,
        }
    }

    fn start() -> Decide<'static> {
        Box::new(|_: &Slot| -> Result<Decision> {
            Ok(Decision::Insert(NewAttempt::active(Utc::now(), None)))
        })
    }

    fn finalize(attempt_id: Uuid, answers: Vec<AnswerSelection>) -> Decide<'static> {
        Box::new(move |_: &Slot| -> Result<Decision> {
            Ok(Decision::Update {
                attempt_id,
                change: AttemptChange::Finalize {
                    warnings: 0,
                    is_blocked: false,
                    completion: Completion {
                        completed_at: Utc::now(),
                        score: 20,
                        answers,
                    },
                },
            })
        })
    }

    async fn insert_row(pool: &PgPool, key: &AttemptKey, completed: bool) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let (completed_at, score) = if completed {
            (Some(Utc::now()), Some(10))
        } else {
            (None, None)
        };
        sqlx::query(
            "INSERT INTO quiz_attempts (id, student_id, quiz_id, completed_at, score) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(key.student_id)
        .bind(key.quiz_id)
        .bind(completed_at)
        .bind(score)
        .execute(pool)
        .await?;
        Ok(id)
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at Postgres"]
    async fn concurrent_starts_admit_one_attempt(pool: PgPool) {
        let seeded = seed_quiz(&pool).await;
        let store = PgAttemptStore::new(pool);
        let key = AttemptKey::new(Uuid::new_v4(), seeded.quiz_id);

        let (a, b) = futures::future::join(store.apply(&key, start()), store.apply(&key, start()))
            .await;
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::AttemptAlreadyActive))));

        let slot = store.snapshot(&key).await.unwrap();
        assert_eq!(slot.attempts, 1);
        assert!(slot.active.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at Postgres"]
    async fn second_active_row_maps_to_attempt_already_active(pool: PgPool) {
        let seeded = seed_quiz(&pool).await;
        let key = AttemptKey::new(Uuid::new_v4(), seeded.quiz_id);

        insert_row(&pool, &key, false).await.unwrap();
        let err = insert_row(&pool, &key, false).await.unwrap_err();
        assert!(matches!(err, Error::AttemptAlreadyActive));

        // terminal rows do not count against the index
        insert_row(&pool, &key, true).await.unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at Postgres"]
    async fn terminal_rows_are_frozen(pool: PgPool) {
        let seeded = seed_quiz(&pool).await;
        let key = AttemptKey::new(Uuid::new_v4(), seeded.quiz_id);
        let id = insert_row(&pool, &key, true).await.unwrap();

        let update = sqlx::query("UPDATE quiz_attempts SET warnings = warnings + 1 WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await;
        assert!(update.is_err());

        let store = PgAttemptStore::new(pool);
        let err = store
            .apply(&key, finalize(id, Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(store.snapshot(&key).await.unwrap().latest.unwrap().score, Some(10));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs DATABASE_URL pointing at Postgres"]
    async fn answers_are_written_only_when_the_attempt_is_finalized(pool: PgPool) {
        let seeded = seed_quiz(&pool).await;
        let store = PgAttemptStore::new(pool);
        let key = AttemptKey::new(Uuid::new_v4(), seeded.quiz_id);
        let attempt_id = store.apply(&key, start()).await.unwrap().attempt.id;
        let selection = AnswerSelection {
            question_id: seeded.question_id,
            selected_option_id: seeded.option_id,
        };

        let err = store
            .apply(
                &key,
                Box::new(|_: &Slot| -> Result<Decision> {
                    Err(Error::InvalidInput("rejected".into()))
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let filter = AttemptFilter {
            student_id: Some(key.student_id),
            ..Default::default()
        };
        let rows = store.list_attempts(&filter).await.unwrap();
        assert!(rows[0].answers.is_empty());
        assert!(rows[0].attempt.completed_at.is_none());

        let done = store
            .apply(&key, finalize(attempt_id, vec![selection]))
            .await
            .unwrap();
        assert_eq!(done.effect, Effect::Updated);
        assert_eq!(done.attempt.score, Some(20));

        // a replayed finalize is refused and adds no answers
        assert!(store
            .apply(&key, finalize(attempt_id, vec![selection]))
            .await
            .is_err());

        let rows = store.list_attempts(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].answers.len(), 1);
        assert_eq!(rows[0].answers[0].selected_option_id, seeded.option_id);

        let scoped = AttemptFilter {
            quiz_ids: Some(Vec::new()),
            ..filter
        };
        assert!(store.list_attempts(&scoped).await.unwrap().is_empty());
    }
}
