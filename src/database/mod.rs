pub mod attempt_store;
pub mod catalog;
pub mod pool;
