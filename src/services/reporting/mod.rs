use crate::models::{EvaluationReport, ItemId, UserId};
use std::sync::Mutex;
use tracing::{info, warn};

/// Receives every evaluation report, unmodified.
pub trait MetricsSink: Send + Sync {
    fn record(&self, step: usize, report: &EvaluationReport);
}

/// Receives the ranked lists of one example user per evaluation pass.
/// Resolving ids to titles or categories is up to the implementor.
pub trait RecommendationDisplay: Send + Sync {
    fn display(&self, user_id: UserId, predicted: &[ItemId], reference: &[ItemId]);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, step: usize, report: &EvaluationReport) {
        for (metric, value) in &report.metrics {
            info!("step {} {} = {:.4}", step, metric, value);
        }
        for (metric, reason) in &report.omitted {
            warn!("step {} {} omitted: {}", step, metric, reason);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDisplay;

impl RecommendationDisplay for TracingDisplay {
    fn display(&self, user_id: UserId, predicted: &[ItemId], reference: &[ItemId]) {
        info!(
            "user {}: predicted {:?}, reference {:?}",
            user_id, predicted, reference
        );
    }
}

/// Keeps every report it receives, serialized as JSON.
#[derive(Debug, Default)]
pub struct JsonSink {
    records: Mutex<Vec<serde_json::Value>>,
}

impl JsonSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<serde_json::Value> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MetricsSink for JsonSink {
    fn record(&self, step: usize, report: &EvaluationReport) {
        let value = match serde_json::to_value(report) {
            Ok(value) => serde_json::json!({ "step": step, "report": value }),
            Err(e) => {
                warn!("Failed to serialize evaluation report: {}", e);
                return;
            }
        };

        match self.records.lock() {
            Ok(mut records) => records.push(value),
            Err(poisoned) => poisoned.into_inner().push(value),
        }
    }
}
