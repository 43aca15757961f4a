pub mod answer;
pub mod quiz;
pub mod quiz_attempt;
