pub mod attempts;
pub mod health;
pub mod quiz;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::middleware::auth::{require_identity, require_student, require_teacher_or_admin};
use crate::middleware::rate_limit::{rps_middleware, RateLimiter};
use crate::AppState;

/// All HTTP routes. Auth layers wrap the per-student rate limit so it can key on the caller.
pub fn build_router(state: AppState, student_rps: u32) -> Router {
    let verifier = state.verifier.clone();

    let student_api = Router::new()
        .route("/api/quizzes/:quiz_id/start", post(quiz::start_attempt))
        .route("/api/quizzes/:quiz_id/event", post(quiz::record_event))
        .route("/api/quizzes/:quiz_id/submit", post(quiz::submit_quiz))
        .route("/api/quizzes/:quiz_id/status", get(quiz::get_status))
        .route("/api/attempts/my", get(attempts::list_my_attempts))
        .route_layer(from_fn_with_state(
            RateLimiter::new(student_rps),
            rps_middleware,
        ))
        .route_layer(from_fn_with_state(verifier.clone(), require_student));

    let staff_api = Router::new()
        .route("/api/attempts", get(attempts::list_attempts))
        .route(
            "/api/quizzes/:quiz_id/attempts",
            get(attempts::list_quiz_attempts),
        )
        .route_layer(from_fn_with_state(verifier.clone(), require_teacher_or_admin));

    let shared_api = Router::new()
        .route("/api/quizzes/:quiz_id", get(quiz::get_quiz))
        .route_layer(from_fn_with_state(verifier, require_identity));

    Router::new()
        .route("/health", get(health::health))
        .merge(student_api)
        .merge(staff_api)
        .merge(shared_api)
        .with_state(state)
}
