use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::quiz::{Question, Quiz, QuizOption};

/// A quiz as students see it. Carries no answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuizView {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub time_limit_minutes: i32,
    pub max_attempts: i32,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<PublicOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOption {
    pub id: Uuid,
    pub text: String,
}

impl From<&QuizOption> for PublicOption {
    fn from(option: &QuizOption) -> Self {
        Self {
            id: option.id,
            text: option.text.clone(),
        }
    }
}

impl From<&Question> for PublicQuestion {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            text: question.text.clone(),
            options: question.options.iter().map(PublicOption::from).collect(),
        }
    }
}

impl From<&Quiz> for PublicQuizView {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            course_id: quiz.course_id,
            title: quiz.title.clone(),
            time_limit_minutes: quiz.time_limit_minutes,
            max_attempts: quiz.max_attempts,
            questions: quiz.questions.iter().map(PublicQuestion::from).collect(),
        }
    }
}
