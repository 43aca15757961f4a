pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use crate::database::{
    attempt_store::PgAttemptStore,
    catalog::{PgEnrollmentDirectory, PgQuizCatalog},
};
use crate::middleware::auth::TokenVerifier;
use crate::services::{
    admission_service::AdmissionService,
    attempt_store::AttemptStore,
    catalog::{EnrollmentDirectory, QuizCatalog},
    history_service::HistoryService,
    integrity_service::IntegrityService,
    submission_service::SubmissionService,
    time_guard::{DeadlinePolicy, TimeGuard},
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub admission_service: AdmissionService,
    pub integrity_service: IntegrityService,
    pub submission_service: SubmissionService,
    pub history_service: HistoryService,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();
        Self::from_parts(
            Arc::new(PgAttemptStore::new(pool.clone())),
            Arc::new(PgQuizCatalog::new(pool.clone())),
            Arc::new(PgEnrollmentDirectory::new(pool)),
            TokenVerifier::new(&config.jwt_secret),
            config.deadline_policy(),
        )
    }

    pub fn from_parts(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn QuizCatalog>,
        enrollments: Arc<dyn EnrollmentDirectory>,
        verifier: TokenVerifier,
        deadline_policy: DeadlinePolicy,
    ) -> Self {
        Self {
            admission_service: AdmissionService::new(
                store.clone(),
                catalog.clone(),
                enrollments.clone(),
            ),
            integrity_service: IntegrityService::new(store.clone()),
            submission_service: SubmissionService::new(
                store.clone(),
                catalog.clone(),
                enrollments.clone(),
                TimeGuard::new(deadline_policy),
            ),
            history_service: HistoryService::new(store, catalog, enrollments),
            verifier,
        }
    }
}
