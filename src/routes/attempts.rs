use axum::{
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;

use crate::{
    dto::attempt_dto::{MyAttemptsQuery, QuizAttemptsQuery, StaffAttemptsQuery},
    error::Result,
    middleware::auth::ActorIdentity,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/attempts/my",
    params(
        ("quizId" = Option<Uuid>, Query, description = "Only attempts on this quiz"),
        ("courseId" = Option<Uuid>, Query, description = "Only attempts on quizzes of this course")
    ),
    responses(
        (status = 200, description = "Caller's attempts, newest first, with answers"),
        (status = 400, description = "Malformed filter"),
        (status = 401, description = "Missing or invalid token")
    )
)]
#[axum::debug_handler]
pub async fn list_my_attempts(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    query: std::result::Result<Query<MyAttemptsQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let attempts = state
        .history_service
        .list_for_student(actor.user_id, query.quiz_id, query.course_id)
        .await?;
    Ok(Json(attempts))
}

#[utoipa::path(
    get,
    path = "/api/attempts",
    params(
        ("quizId" = Option<Uuid>, Query, description = "Only attempts on this quiz"),
        ("courseId" = Option<Uuid>, Query, description = "Only attempts on quizzes of this course"),
        ("studentId" = Option<Uuid>, Query, description = "Only this student's attempts")
    ),
    responses(
        (status = 200, description = "Attempts on the caller's courses, newest first, with answers"),
        (status = 400, description = "Malformed filter"),
        (status = 403, description = "Teacher or admin role required")
    )
)]
#[axum::debug_handler]
pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    query: std::result::Result<Query<StaffAttemptsQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Query(query) = query?;
    let attempts = state
        .history_service
        .list_for_staff(&actor, query.quiz_id, query.course_id, query.student_id)
        .await?;
    Ok(Json(attempts))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/attempts",
    params(
        ("quiz_id" = Uuid, Path, description = "Quiz ID"),
        ("studentId" = Option<Uuid>, Query, description = "Only this student's attempts")
    ),
    responses(
        (status = 200, description = "Attempts on the quiz, newest first, with answers"),
        (status = 400, description = "Malformed quiz id or filter"),
        (status = 403, description = "Caller does not teach this course"),
        (status = 404, description = "Quiz not found")
    )
)]
#[axum::debug_handler]
pub async fn list_quiz_attempts(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    query: std::result::Result<Query<QuizAttemptsQuery>, QueryRejection>,
) -> Result<impl IntoResponse> {
    let Path(quiz_id) = path?;
    let Query(query) = query?;
    let attempts = state
        .history_service
        .list_for_quiz(&actor, quiz_id, query.student_id)
        .await?;
    Ok(Json(attempts))
}
