pub mod algorithms;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use algorithms::{BalancedSampler, MatrixFactorization, Scorer, TopKRanker};
pub use config::Config;
pub use data::{InteractionStore, PopularityTable};
pub use error::{EvalError, Result};
pub use models::*;
pub use services::evaluation::EvaluationService;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
