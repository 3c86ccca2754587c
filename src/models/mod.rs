use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type UserId = usize;
pub type ItemId = usize;

pub const METRIC_NDCG: &str = "ndcg";
pub const METRIC_NOVELTY: &str = "novelty";
pub const METRIC_PREDICTION_COVERAGE: &str = "prediction_coverage";
pub const METRIC_CATALOG_COVERAGE: &str = "catalog_coverage";
pub const METRIC_PERSONALIZATION: &str = "personalization";
pub const METRIC_ROC_AUC: &str = "roc_auc";
pub const METRIC_EVAL_LOSS: &str = "eval_loss";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingFormat {
    /// Ratings are thresholded into 1.0 / 0.0 labels.
    Binary,
    /// Ratings are passed through unchanged.
    Rating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::Positive => write!(f, "positive"),
            Polarity::Negative => write!(f, "negative"),
        }
    }
}

/// One example handed to the training loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub label: f32,
}

/// Predicted and reference top-k lists for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRanking {
    pub predicted: Vec<ItemId>,
    pub reference: Vec<ItemId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub metrics: BTreeMap<String, f64>,
    /// Metrics left out of `metrics`, keyed by name, with the reason.
    pub omitted: BTreeMap<String, String>,
    pub k: usize,
    pub num_users: usize,
    pub generated_at: DateTime<Utc>,
}

impl Interaction {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f32) -> Self {
        Self {
            user_id,
            item_id,
            rating,
        }
    }

    pub fn polarity(&self, threshold: f32) -> Polarity {
        if self.rating >= threshold {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }
}

impl RatingFormat {
    pub fn label(&self, rating: f32, threshold: f32) -> f32 {
        match self {
            RatingFormat::Binary => {
                if rating >= threshold {
                    1.0
                } else {
                    0.0
                }
            }
            RatingFormat::Rating => rating,
        }
    }
}

impl EvaluationReport {
    pub fn new(k: usize, num_users: usize) -> Self {
        Self {
            metrics: BTreeMap::new(),
            omitted: BTreeMap::new(),
            k,
            num_users,
            generated_at: Utc::now(),
        }
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }

    pub fn omission_reason(&self, metric: &str) -> Option<&str> {
        self.omitted.get(metric).map(String::as_str)
    }

    pub(crate) fn insert(&mut self, metric: &str, value: f64) {
        self.metrics.insert(metric.to_string(), value);
    }

    pub(crate) fn omit(&mut self, metric: &str, reason: String) {
        self.omitted.insert(metric.to_string(), reason);
    }
}
