use crate::error::EvalError;
use crate::models::RatingFormat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub evaluation: EvaluationConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Ratings at or above this value are positive.
    pub negative_sample_threshold: f32,
    /// Length of each run of indices: one positive slot, then negatives.
    pub num_negative_samples: usize,
    pub rating_format: RatingFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub k: usize,
    pub eval_size: usize,
    /// Users per pass at which the ranker goes parallel.
    pub parallel_threshold: usize,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub embedding_dim: usize,
    pub epochs: usize,
    pub eval_every: usize,
    pub max_batches: usize,
    pub max_rows: Option<usize>,
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig {
                negative_sample_threshold: 3.0,
                num_negative_samples: 4,
                rating_format: RatingFormat::Binary,
            },
            evaluation: EvaluationConfig {
                k: 10,
                eval_size: 100,
                parallel_threshold: 64,
                workers: num_cpus::get(),
            },
            training: TrainingConfig {
                batch_size: 128,
                learning_rate: 5e-4,
                weight_decay: 1e-5,
                embedding_dim: 32,
                epochs: 100,
                eval_every: 1,
                max_batches: 100,
                max_rows: Some(100_000),
                seed: 0,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("RECSYS_EVAL").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        self.sampler.validate()?;
        self.evaluation.validate()?;
        self.training.validate()
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), EvalError> {
        if !self.negative_sample_threshold.is_finite() {
            return Err(EvalError::Configuration(
                "negative_sample_threshold must be finite".to_string(),
            ));
        }
        if self.num_negative_samples == 0 {
            return Err(EvalError::Configuration(
                "num_negative_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), EvalError> {
        crate::utils::validation::validate_k(self.k)?;
        if self.workers == 0 {
            return Err(EvalError::Configuration(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<(), EvalError> {
        if self.batch_size == 0 {
            return Err(EvalError::Configuration("batch_size cannot be zero".to_string()));
        }
        if self.eval_every == 0 {
            return Err(EvalError::Configuration("eval_every cannot be zero".to_string()));
        }
        if self.embedding_dim == 0 {
            return Err(EvalError::Configuration(
                "embedding_dim cannot be zero".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(EvalError::Configuration(
                "learning_rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
