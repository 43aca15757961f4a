#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use assessment_backend::{
    error::Result,
    middleware::auth::TokenVerifier,
    models::{
        answer::AnswerSelection,
        quiz::{Question, Quiz, QuizOption},
    },
    routes::build_router,
    services::{
        catalog::{EnrollmentDirectory, QuizCatalog},
        memory_store::MemoryAttemptStore,
        time_guard::DeadlinePolicy,
    },
    AppState,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key";

#[derive(Default)]
pub struct FakeCatalog {
    quizzes: Mutex<HashMap<Uuid, Quiz>>,
}

impl FakeCatalog {
    pub fn insert(&self, quiz: Quiz) {
        self.quizzes.lock().unwrap().insert(quiz.id, quiz);
    }
}

#[async_trait]
impl QuizCatalog for FakeCatalog {
    async fn get_quiz_with_answer_key(&self, quiz_id: Uuid) -> Result<Option<Quiz>> {
        Ok(self.quizzes.lock().unwrap().get(&quiz_id).cloned())
    }

    async fn quiz_ids(
        &self,
        course_id: Option<Uuid>,
        teacher_id: Option<Uuid>,
    ) -> Result<Vec<Uuid>> {
        Ok(self
            .quizzes
            .lock()
            .unwrap()
            .values()
            .filter(|q| course_id.map_or(true, |c| q.course_id == c))
            .filter(|q| teacher_id.map_or(true, |t| q.teacher_id == Some(t)))
            .map(|q| q.id)
            .collect())
    }
}

#[derive(Default)]
pub struct FakeEnrollments {
    pairs: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl FakeEnrollments {
    pub fn enroll(&self, student_id: Uuid, course_id: Uuid) {
        self.pairs.lock().unwrap().insert((student_id, course_id));
    }
}

#[async_trait]
impl EnrollmentDirectory for FakeEnrollments {
    async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> Result<bool> {
        Ok(self.pairs.lock().unwrap().contains(&(student_id, course_id)))
    }
}

/// Two questions, three options each; option 0 is correct on the first, option 1 on the second.
pub fn two_question_quiz(max_attempts: i32, time_limit_minutes: i32) -> Quiz {
    let question = |text: &str, correct: usize| Question {
        id: Uuid::new_v4(),
        text: text.to_string(),
        options: (0..3)
            .map(|i| QuizOption {
                id: Uuid::new_v4(),
                text: format!("{} option {}", text, i),
                is_correct: i == correct,
            })
            .collect(),
    };
    Quiz {
        id: Uuid::new_v4(),
        course_id: Uuid::new_v4(),
        teacher_id: Some(Uuid::new_v4()),
        title: "Integration quiz".to_string(),
        time_limit_minutes,
        max_attempts,
        questions: vec![question("first", 0), question("second", 1)],
    }
}

pub fn pick(quiz: &Quiz, question: usize, option: usize) -> AnswerSelection {
    AnswerSelection {
        question_id: quiz.questions[question].id,
        selected_option_id: quiz.questions[question].options[option].id,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryAttemptStore>,
    pub catalog: Arc<FakeCatalog>,
    pub enrollments: Arc<FakeEnrollments>,
    pub verifier: TokenVerifier,
    pub quiz: Quiz,
    pub student: Uuid,
}

impl TestApp {
    pub fn new(quiz: Quiz) -> Self {
        Self::with_policy(quiz, DeadlinePolicy::ClientTrusted, 1000)
    }

    pub fn with_policy(quiz: Quiz, policy: DeadlinePolicy, student_rps: u32) -> Self {
        let store = Arc::new(MemoryAttemptStore::new());
        let catalog = Arc::new(FakeCatalog::default());
        let enrollments = Arc::new(FakeEnrollments::default());
        let verifier = TokenVerifier::new(JWT_SECRET);

        catalog.insert(quiz.clone());
        let student = Uuid::new_v4();
        enrollments.enroll(student, quiz.course_id);

        let state = AppState::from_parts(
            store.clone(),
            catalog.clone(),
            enrollments.clone(),
            verifier.clone(),
            policy,
        );
        let router = build_router(state.clone(), student_rps);

        Self {
            router,
            state,
            store,
            catalog,
            enrollments,
            verifier,
            quiz,
            student,
        }
    }

    pub fn token(&self, user_id: Uuid, role: &str) -> String {
        self.verifier
            .issue(user_id, role, chrono::Duration::minutes(30))
            .unwrap()
    }

    pub fn student_token(&self) -> String {
        self.token(self.student, "student")
    }

    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let req = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    pub async fn start(&self, token: &str) -> (StatusCode, JsonValue) {
        let uri = format!("/api/quizzes/{}/start", self.quiz.id);
        self.send("POST", &uri, Some(token), None).await
    }

    pub async fn event(&self, token: &str, event: &str) -> (StatusCode, JsonValue) {
        let uri = format!("/api/quizzes/{}/event", self.quiz.id);
        self.send("POST", &uri, Some(token), Some(serde_json::json!({ "event": event })))
            .await
    }

    pub async fn submit(&self, token: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        let uri = format!("/api/quizzes/{}/submit", self.quiz.id);
        self.send("POST", &uri, Some(token), Some(body)).await
    }
}
