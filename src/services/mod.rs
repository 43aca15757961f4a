pub mod admission_service;
pub mod attempt_store;
pub mod catalog;
pub mod grading_service;
pub mod history_service;
pub mod integrity_service;
pub mod memory_store;
pub mod submission_service;
pub mod time_guard;
