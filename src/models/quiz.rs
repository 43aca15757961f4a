use uuid::Uuid;

// These carry the answer key and must never be serialized to clients.
// Client-facing shapes live in `dto::quiz_dto`.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub id: Uuid,
    pub course_id: Uuid,
    pub teacher_id: Option<Uuid>,
    pub title: String,
    pub time_limit_minutes: i32,
    pub max_attempts: i32,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: Uuid,
    pub text: String,
    pub options: Vec<QuizOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizOption {
    pub id: Uuid,
    pub text: String,
    pub is_correct: bool,
}

impl Quiz {
    pub fn question(&self, question_id: Uuid) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }
}

impl Question {
    pub fn has_option(&self, option_id: Uuid) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }

    /// First option flagged correct; catalogs guarantee there is exactly one.
    pub fn correct_option(&self) -> Option<Uuid> {
        self.options.iter().find(|o| o.is_correct).map(|o| o.id)
    }
}
