use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::{IntoResponse, Json},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        attempt_dto::{
            RecordEventRequest, RecordEventResponse, StartAttemptResponse, SubmitPayload,
            SubmitQuizRequest, SubmitQuizResponse,
        },
        quiz_dto::PublicQuizView,
    },
    error::Result,
    middleware::auth::ActorIdentity,
    services::integrity_service::ViolationKind,
    AppState,
};

#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}",
    params(
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    responses(
        (status = 200, description = "Quiz without its answer key", body = PublicQuizView),
        (status = 400, description = "Malformed quiz id"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Teacher does not own the course"),
        (status = 404, description = "Quiz not found or student not enrolled")
    )
)]
#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(quiz_id) = path?;
    let quiz = state.history_service.quiz_for_actor(&actor, quiz_id).await?;
    Ok(Json(PublicQuizView::from(&quiz)))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{quiz_id}/start",
    params(
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    responses(
        (status = 200, description = "Attempt started", body = StartAttemptResponse),
        (status = 404, description = "Quiz not found or student not enrolled"),
        (status = 409, description = "Attempt limit reached or an attempt is already active")
    )
)]
#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(quiz_id) = path?;
    let attempt = state
        .admission_service
        .request_attempt(actor.user_id, quiz_id)
        .await?;
    Ok(Json(StartAttemptResponse::from(attempt)))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{quiz_id}/event",
    params(
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    request_body = RecordEventRequest,
    responses(
        (status = 200, description = "Event applied, or final state of a closed attempt", body = RecordEventResponse),
        (status = 400, description = "Invalid event type"),
        (status = 404, description = "No attempt for this quiz")
    )
)]
#[axum::debug_handler]
pub async fn record_event(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    payload: std::result::Result<Json<RecordEventRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Path(quiz_id) = path?;
    let Json(payload) = payload?;
    let kind: ViolationKind = payload.event.parse()?;
    let attempt = state
        .integrity_service
        .record_event(actor.user_id, quiz_id, kind)
        .await?;
    Ok(Json(RecordEventResponse::from(attempt)))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{quiz_id}/submit",
    params(
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    request_body = SubmitQuizRequest,
    responses(
        (status = 200, description = "Attempt graded and closed", body = SubmitQuizResponse),
        (status = 400, description = "Malformed or inconsistent answers"),
        (status = 404, description = "Quiz not found or student not enrolled"),
        (status = 409, description = "Already submitted, attempt limit reached or deadline passed")
    )
)]
#[axum::debug_handler]
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
    payload: std::result::Result<Json<SubmitPayload>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Path(quiz_id) = path?;
    let Json(payload) = payload?;
    let request = SubmitQuizRequest::from(payload);
    request.validate()?;
    let receipt = state
        .submission_service
        .submit(actor.user_id, quiz_id, request.answers)
        .await?;
    Ok(Json(SubmitQuizResponse::from(receipt)))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{quiz_id}/status",
    params(
        ("quiz_id" = Uuid, Path, description = "Quiz ID")
    ),
    responses(
        (status = 200, description = "Current or latest attempt with countdown"),
        (status = 404, description = "No attempt for this quiz")
    )
)]
#[axum::debug_handler]
pub async fn get_status(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorIdentity>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(quiz_id) = path?;
    let status = state.history_service.status(actor.user_id, quiz_id).await?;
    Ok(Json(status))
}
