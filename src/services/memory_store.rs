use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::quiz_attempt::{ActiveAttempt, AttemptKey, QuizAttempt};
use crate::services::attempt_store::{
    check_decision, AttemptChange, AttemptFilter, AttemptStore, AttemptWithAnswers, Decide,
    Decision, Effect, Outcome, Slot,
};

#[derive(Debug, Default)]
struct SlotState {
    /// Oldest first.
    attempts: Vec<AttemptWithAnswers>,
}

impl SlotState {
    fn snapshot(&self, key: AttemptKey) -> Slot {
        let latest = self.attempts.last().map(|a| a.attempt.clone());
        let active = self
            .attempts
            .iter()
            .rev()
            .find(|a| !a.attempt.is_terminal())
            .and_then(|a| ActiveAttempt::from_attempt(a.attempt.clone()));
        Slot {
            key,
            attempts: self.attempts.len() as i64,
            active,
            latest,
        }
    }
}

/// Process-local attempt store for tests and single-process development.
///
/// Every attempt is kept for the life of the process. Each (student, quiz)
/// slot has its own lock; the outer map lock is only held long enough to
/// find, create or release a slot. Slots that never received an attempt are
/// released, so reads and rejected decisions do not grow the map.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    slots: Mutex<HashMap<AttemptKey, Arc<Mutex<SlotState>>>>,
}

type SlotMap = HashMap<AttemptKey, Arc<Mutex<SlotState>>>;

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_map(&self) -> Result<std::sync::MutexGuard<'_, SlotMap>> {
        self.slots
            .lock()
            .map_err(|_| Error::Internal("attempt slot map lock poisoned".into()))
    }

    fn slot(&self, key: &AttemptKey) -> Result<Arc<Mutex<SlotState>>> {
        Ok(self.lock_map()?.entry(*key).or_default().clone())
    }

    /// Drops `slot` from the map if it is still empty and nobody else holds it.
    fn release(&self, key: &AttemptKey, slot: Arc<Mutex<SlotState>>) -> Result<()> {
        let mut slots = self.lock_map()?;
        // handles are only cloned under the map lock: map + ours
        if Arc::strong_count(&slot) == 2 {
            let empty = slot.lock().map(|s| s.attempts.is_empty()).unwrap_or(false);
            if empty {
                slots.remove(key);
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn all_slots(&self) -> Result<Vec<Arc<Mutex<SlotState>>>> {
        Ok(self.lock_map()?.values().cloned().collect())
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn apply(&self, key: &AttemptKey, decide: Decide<'_>) -> Result<Outcome> {
        let slot = self.slot(key)?;
        let outcome = apply_locked(&slot, key, decide);
        self.release(key, slot)?;
        outcome
    }

    async fn snapshot(&self, key: &AttemptKey) -> Result<Slot> {
        let Some(slot) = self.lock_map()?.get(key).cloned() else {
            return Ok(Slot::empty(*key));
        };
        let state = slot
            .lock()
            .map_err(|_| Error::Internal(format!("attempt slot {} lock poisoned", key)))?;
        Ok(state.snapshot(*key))
    }

    async fn list_attempts(&self, filter: &AttemptFilter) -> Result<Vec<AttemptWithAnswers>> {
        let mut rows: Vec<AttemptWithAnswers> = Vec::new();
        for slot in self.all_slots()? {
            let state = slot
                .lock()
                .map_err(|_| Error::Internal("attempt slot lock poisoned".into()))?;
            rows.extend(
                state
                    .attempts
                    .iter()
                    .filter(|a| filter.matches(&a.attempt))
                    .cloned(),
            );
        }
        rows.sort_by(|a, b| b.attempt.started_at.cmp(&a.attempt.started_at));
        if filter.limit > 0 {
            rows.truncate(filter.limit as usize);
        }
        Ok(rows)
    }
}

fn apply_locked(
    slot: &Mutex<SlotState>,
    key: &AttemptKey,
    decide: Decide<'_>,
) -> Result<Outcome> {
    let mut state = slot
        .lock()
        .map_err(|_| Error::Internal(format!("attempt slot {} lock poisoned", key)))?;

    let snapshot = state.snapshot(*key);
    let decision = decide(&snapshot)?;
    check_decision(&snapshot, &decision)?;

    match decision {
        Decision::Unchanged(attempt) => Ok(Outcome {
            attempt,
            effect: Effect::Unchanged,
        }),
        Decision::Insert(new) => {
            let id = Uuid::new_v4();
            let (completed_at, score, answers) = match new.completion {
                Some(c) => (
                    Some(c.completed_at),
                    Some(c.score),
                    c.answers.into_iter().map(|a| a.into_answer(id)).collect(),
                ),
                None => (None, None, Vec::new()),
            };
            let attempt = QuizAttempt {
                id,
                student_id: key.student_id,
                quiz_id: key.quiz_id,
                started_at: new.started_at,
                expires_at: new.expires_at,
                completed_at,
                warnings: new.warnings,
                is_blocked: new.is_blocked,
                score,
            };
            state.attempts.push(AttemptWithAnswers {
                attempt: attempt.clone(),
                answers,
            });
            Ok(Outcome {
                attempt,
                effect: Effect::Inserted,
            })
        }
        Decision::Update { attempt_id, change } => {
            let stored = state
                .attempts
                .iter_mut()
                .find(|a| a.attempt.id == attempt_id && !a.attempt.is_terminal())
                .ok_or_else(|| {
                    Error::Internal(format!("active attempt {} vanished", attempt_id))
                })?;
            match change {
                AttemptChange::Warn { warnings } => {
                    stored.attempt.warnings = warnings;
                }
                AttemptChange::Finalize {
                    warnings,
                    is_blocked,
                    completion,
                } => {
                    stored.attempt.warnings = warnings;
                    stored.attempt.is_blocked = is_blocked;
                    stored.attempt.score = Some(completion.score);
                    stored.attempt.completed_at = Some(completion.completed_at);
                    stored.answers = completion
                        .answers
                        .into_iter()
                        .map(|a| a.into_answer(attempt_id))
                        .collect();
                }
            }
            Ok(Outcome {
                attempt: stored.attempt.clone(),
                effect: Effect::Updated,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer::{Answer, AnswerSelection};
    use crate::services::attempt_store::{Completion, NewAttempt};
    use chrono::Utc;

    fn answers_of(rows: &[AttemptWithAnswers], attempt_id: Uuid) -> Vec<Answer> {
        rows.iter()
            .find(|r| r.attempt.id == attempt_id)
            .map(|r| r.answers.clone())
            .unwrap_or_default()
    }

    fn decide(f: impl FnOnce(&Slot) -> Result<Decision> + Send + 'static) -> Decide<'static> {
        Box::new(f)
    }

    fn key() -> AttemptKey {
        AttemptKey::new(Uuid::new_v4(), Uuid::new_v4())
    }

    #[tokio::test]
    async fn failed_decision_writes_nothing() {
        let store = MemoryAttemptStore::new();
        let k = key();
        let err = store
            .apply(&k, decide(|_| Err(Error::InvalidInput("nope".into()))))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.snapshot(&k).await.unwrap().attempts, 0);
    }

    #[tokio::test]
    async fn finalize_persists_answers_with_the_attempt() {
        let store = MemoryAttemptStore::new();
        let k = key();
        let created = store
            .apply(
                &k,
                decide(|_| Ok(Decision::Insert(NewAttempt::active(Utc::now(), None)))),
            )
            .await
            .unwrap();
        assert_eq!(created.effect, Effect::Inserted);

        let selection = AnswerSelection {
            question_id: Uuid::new_v4(),
            selected_option_id: Uuid::new_v4(),
        };
        let id = created.attempt.id;
        let done = store
            .apply(
                &k,
                decide(move |_| {
                    Ok(Decision::Update {
                        attempt_id: id,
                        change: AttemptChange::Finalize {
                            warnings: 0,
                            is_blocked: false,
                            completion: Completion {
                                completed_at: Utc::now(),
                                score: 20,
                                answers: vec![selection],
                            },
                        },
                    })
                }),
            )
            .await
            .unwrap();
        assert_eq!(done.attempt.score, Some(20));

        let rows = store
            .list_attempts(&AttemptFilter {
                student_id: Some(k.student_id),
                ..Default::default()
            })
            .await
            .unwrap();
        let answers = answers_of(&rows, id);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].selected_option_id, selection.selected_option_id);

        let slot = store.snapshot(&k).await.unwrap();
        assert!(slot.active.is_none());
        assert_eq!(slot.latest.unwrap().id, id);
    }

    #[tokio::test]
    async fn slots_are_isolated_per_student_and_quiz() {
        let store = MemoryAttemptStore::new();
        let a = key();
        let b = AttemptKey::new(a.student_id, Uuid::new_v4());
        for k in [a, b] {
            store
                .apply(
                    &k,
                    decide(|_| Ok(Decision::Insert(NewAttempt::active(Utc::now(), None)))),
                )
                .await
                .unwrap();
        }
        assert!(store.snapshot(&a).await.unwrap().active.is_some());
        assert!(store.snapshot(&b).await.unwrap().active.is_some());
    }

    #[tokio::test]
    async fn reads_and_rejected_decisions_leave_no_slots_behind() {
        let store = MemoryAttemptStore::new();
        let k = key();
        assert_eq!(store.snapshot(&k).await.unwrap().attempts, 0);
        store
            .apply(&k, decide(|_| Err(Error::AttemptLimitReached)))
            .await
            .unwrap_err();
        assert_eq!(store.slot_count(), 0);

        store
            .apply(
                &k,
                decide(|_| Ok(Decision::Insert(NewAttempt::active(Utc::now(), None)))),
            )
            .await
            .unwrap();
        assert_eq!(store.slot_count(), 1);
    }
}
