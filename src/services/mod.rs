pub mod evaluation;
pub mod reporting;
pub mod training;
