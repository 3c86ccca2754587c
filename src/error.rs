use thiserror::Error;

use crate::models::Polarity;

/// Errors raised by sampling, ranking and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{polarity} pool is empty at threshold {threshold}")]
    EmptyPool { polarity: Polarity, threshold: f32 },
    #[error("candidate item set is empty")]
    InsufficientCandidates,
    #[error("metric '{metric}' is not computable: {reason}")]
    MetricNotComputable { metric: &'static str, reason: String },
    #[error("malformed interaction at row {row}: {reason}")]
    MalformedInteraction { row: usize, reason: String },
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EvalError {
    pub fn not_computable(metric: &'static str, reason: impl Into<String>) -> Self {
        EvalError::MetricNotComputable {
            metric,
            reason: reason.into(),
        }
    }

    pub fn malformed(row: usize, reason: impl Into<String>) -> Self {
        EvalError::MalformedInteraction {
            row,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
