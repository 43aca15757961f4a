use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::models::answer::AnswerSelection;
use crate::models::quiz::Quiz;
use crate::services::attempt_store::MAX_SCORE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grade {
    pub correct: usize,
    pub total: usize,
    /// Canonical 0..=20 score.
    pub score: i32,
    /// 0..=100, display only.
    pub percentage: i32,
}

pub struct GradingService;

impl GradingService {
    /// Checks a submission against the quiz structure. Nothing is graded or
    /// stored unless every pair is valid.
    pub fn validate_submission(quiz: &Quiz, answers: &[AnswerSelection]) -> Result<()> {
        let mut seen = HashSet::with_capacity(answers.len());
        for (idx, answer) in answers.iter().enumerate() {
            let Some(question) = quiz.question(answer.question_id) else {
                return Err(Error::InvalidInput(format!(
                    "Answer {}: questionId not found",
                    idx + 1
                )));
            };
            if !question.has_option(answer.selected_option_id) {
                return Err(Error::InvalidInput(format!(
                    "Answer {}: selected option does not belong to question",
                    idx + 1
                )));
            }
            if !seen.insert(answer.question_id) {
                return Err(Error::InvalidInput(format!(
                    "Answer {}: duplicate questionId",
                    idx + 1
                )));
            }
        }
        Ok(())
    }

    pub fn grade(quiz: &Quiz, answers: &[AnswerSelection]) -> Grade {
        let total = quiz.total_questions();
        let correct = answers
            .iter()
            .filter(|a| {
                quiz.question(a.question_id)
                    .and_then(|q| q.correct_option())
                    .is_some_and(|correct| correct == a.selected_option_id)
            })
            .count();

        Grade {
            correct,
            total,
            score: scale(correct, total, MAX_SCORE),
            percentage: scale(correct, total, 100),
        }
    }
}

fn scale(correct: usize, total: usize, max: i32) -> i32 {
    if total == 0 {
        return 0;
    }
    let ratio = correct.min(total) as f64 / total as f64;
    (ratio * f64::from(max)).round() as i32
}
