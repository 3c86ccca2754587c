//! One offline evaluation pass: rank, measure, assemble.

use crate::algorithms::{Scorer, TopKRanker};
use crate::config::{EvaluationConfig, SamplerConfig};
use crate::data::{candidate_items, evaluated_users, truth_lookup, PopularityTable};
use crate::error::{EvalError, Result};
use crate::models::*;
use crate::services::reporting::RecommendationDisplay;
use crate::utils::metrics::{binary_cross_entropy, mean_squared_error, MetricsCalculator};
use crate::utils::validation::{validate_interactions, validate_k};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct EvaluationService {
    ranker: TopKRanker,
    rating_format: RatingFormat,
    threshold: f32,
    display: Option<Arc<dyn RecommendationDisplay>>,
}

impl EvaluationService {
    pub fn new(evaluation: &EvaluationConfig, sampler: &SamplerConfig) -> Self {
        Self {
            ranker: TopKRanker::new(evaluation.parallel_threshold),
            rating_format: sampler.rating_format,
            threshold: sampler.negative_sample_threshold,
            display: None,
        }
    }

    pub fn with_display(mut self, display: Arc<dyn RecommendationDisplay>) -> Self {
        self.display = Some(display);
        self
    }

    /// Evaluates `scorer` on a held-out batch.
    ///
    /// Malformed interactions and an empty batch abort the pass. A metric
    /// whose inputs are degenerate is left out of the report, with its
    /// reason recorded, and the other metrics are still computed.
    pub fn evaluate<S: Scorer + ?Sized>(
        &self,
        batch: &[Interaction],
        scorer: &S,
        k: usize,
    ) -> Result<EvaluationReport> {
        validate_k(k)?;
        validate_interactions(batch)?;

        let users = evaluated_users(batch);
        let candidates = candidate_items(batch);
        let truth = truth_lookup(batch);

        let rankings = self.ranker.rank(&users, &candidates, scorer, &truth, k)?;

        if let (Some(display), Some((user_id, ranking))) = (&self.display, rankings.iter().next()) {
            display.display(*user_id, &ranking.predicted, &ranking.reference);
        }

        let mut report = EvaluationReport::new(k, users.len());
        let calculator = MetricsCalculator::new(k);
        let popularity = PopularityTable::from_interactions(batch);

        let predicted: Vec<Vec<ItemId>> = rankings.values().map(|r| r.predicted.clone()).collect();
        let pairs: Vec<(&[ItemId], &[ItemId])> = rankings
            .values()
            .map(|r| (r.predicted.as_slice(), r.reference.as_slice()))
            .collect();
        let (labels, predictions) = relevance_arrays(&rankings, &candidates);

        let outcomes = [
            (METRIC_NDCG, calculator.calculate_mean_ndcg(&pairs)),
            (METRIC_NOVELTY, calculator.calculate_novelty(&predicted, &popularity)),
            (
                METRIC_PREDICTION_COVERAGE,
                calculator.calculate_prediction_coverage(&predicted, candidates.len()),
            ),
            (
                METRIC_CATALOG_COVERAGE,
                calculator.calculate_catalog_coverage(&predicted, candidates.len()),
            ),
            (METRIC_PERSONALIZATION, calculator.calculate_personalization(&predicted)),
            (METRIC_ROC_AUC, calculator.calculate_roc_auc(&labels, &predictions)),
            (METRIC_EVAL_LOSS, self.eval_loss(batch, scorer)),
        ];

        for (metric, outcome) in outcomes {
            match outcome {
                Ok(value) => report.insert(metric, value),
                Err(EvalError::MetricNotComputable { reason, .. }) => {
                    warn!("Metric {} omitted: {}", metric, reason);
                    report.omit(metric, reason);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Evaluated {} users over {} candidates: {} metrics, {} omitted",
            report.num_users,
            candidates.len(),
            report.metrics.len(),
            report.omitted.len()
        );
        debug!("Evaluation report: {:?}", report.metrics);

        Ok(report)
    }

    /// Loss of the scorer on the batch's own `(user, item)` pairs.
    fn eval_loss<S: Scorer + ?Sized>(&self, batch: &[Interaction], scorer: &S) -> Result<f64> {
        let pairs: Vec<(f32, f32)> = batch
            .iter()
            .map(|i| {
                (
                    scorer.score(i.user_id, i.item_id),
                    self.rating_format.label(i.rating, self.threshold),
                )
            })
            .collect();

        if pairs.iter().any(|(prediction, _)| !prediction.is_finite()) {
            return Err(EvalError::not_computable(
                METRIC_EVAL_LOSS,
                "scorer returned a non-finite prediction",
            ));
        }

        let loss = match self.rating_format {
            RatingFormat::Binary => binary_cross_entropy(&pairs),
            RatingFormat::Rating => mean_squared_error(&pairs),
        };
        loss.ok_or_else(|| EvalError::not_computable(METRIC_EVAL_LOSS, "empty batch"))
    }
}

/// Flattens every `(user, candidate)` pair into parallel label/prediction
/// arrays: label is membership in the reference list, prediction is
/// membership in the predicted list.
pub fn relevance_arrays(
    rankings: &BTreeMap<UserId, UserRanking>,
    candidates: &[ItemId],
) -> (Vec<bool>, Vec<bool>) {
    let capacity = rankings.len() * candidates.len();
    let mut labels = Vec::with_capacity(capacity);
    let mut predictions = Vec::with_capacity(capacity);

    for ranking in rankings.values() {
        let reference: HashSet<&ItemId> = ranking.reference.iter().collect();
        let predicted: HashSet<&ItemId> = ranking.predicted.iter().collect();
        for item_id in candidates {
            labels.push(reference.contains(item_id));
            predictions.push(predicted.contains(item_id));
        }
    }

    (labels, predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::Mutex;

    fn service() -> EvaluationService {
        let config = Config::default();
        EvaluationService::new(&config.evaluation, &config.sampler)
    }

    #[derive(Default)]
    struct CapturingDisplay {
        seen: Mutex<Vec<(UserId, Vec<ItemId>, Vec<ItemId>)>>,
    }

    impl RecommendationDisplay for CapturingDisplay {
        fn display(&self, user_id: UserId, predicted: &[ItemId], reference: &[ItemId]) {
            self.seen
                .lock()
                .unwrap()
                .push((user_id, predicted.to_vec(), reference.to_vec()));
        }
    }

    fn batch() -> Vec<Interaction> {
        vec![
            Interaction::new(0, 1, 5.0),
            Interaction::new(0, 3, 4.0),
            Interaction::new(0, 0, 1.0),
            Interaction::new(1, 2, 5.0),
            Interaction::new(1, 4, 3.5),
            Interaction::new(2, 0, 4.0),
            Interaction::new(2, 4, 2.0),
        ]
    }

    #[test]
    fn test_evaluate_reports_all_metrics() {
        let scorer = |user: UserId, item: ItemId| {
            let liked = [(0, 1), (0, 3), (1, 2), (1, 4), (2, 0), (2, 4)];
            if liked.contains(&(user, item)) {
                0.9f32
            } else {
                0.1
            }
        };

        let report = service().evaluate(&batch(), &scorer, 2).unwrap();

        assert_eq!(report.num_users, 3);
        assert_eq!(report.k, 2);
        assert_eq!(report.get(METRIC_NDCG), Some(1.0));
        assert_eq!(report.get(METRIC_PREDICTION_COVERAGE), Some(1.0));
        assert_eq!(report.get(METRIC_ROC_AUC), Some(1.0));
        assert!(report.get(METRIC_NOVELTY).unwrap() > 0.0);
        assert!(report.get(METRIC_PERSONALIZATION).unwrap() > 0.0);
        assert!(report.get(METRIC_EVAL_LOSS).is_some());
        assert!(report.omitted.is_empty());
    }

    #[test]
    fn test_evaluate_empty_batch_fails() {
        let scorer = |_: UserId, _: ItemId| 0.0f32;
        assert_eq!(
            service().evaluate(&[], &scorer, 2).unwrap_err(),
            EvalError::InsufficientCandidates
        );
    }

    #[test]
    fn test_evaluate_malformed_batch_fails() {
        let scorer = |_: UserId, _: ItemId| 0.0f32;
        let mut batch = batch();
        batch.push(Interaction::new(0, 1, f32::NAN));
        assert!(matches!(
            service().evaluate(&batch, &scorer, 2),
            Err(EvalError::MalformedInteraction { row: 7, .. })
        ));
    }

    #[test]
    fn test_single_user_omits_personalization() {
        let scorer = |_: UserId, item: ItemId| item as f32;
        let batch = vec![Interaction::new(4, 0, 5.0), Interaction::new(4, 1, 1.0)];
        let report = service().evaluate(&batch, &scorer, 1).unwrap();

        assert_eq!(report.get(METRIC_PERSONALIZATION), None);
        assert!(report.omission_reason(METRIC_PERSONALIZATION).is_some());
        assert_eq!(report.get(METRIC_NDCG), Some(0.0));
    }

    #[test]
    fn test_nan_scores_omit_eval_loss() {
        let scorer = |_: UserId, _: ItemId| f32::NAN;
        let report = service().evaluate(&batch(), &scorer, 2).unwrap();

        assert_eq!(report.get(METRIC_EVAL_LOSS), None);
        assert!(report.get(METRIC_NDCG).is_some());
    }

    #[test]
    fn test_display_receives_first_user() {
        let display = Arc::new(CapturingDisplay::default());
        let service = service().with_display(display.clone());
        let scorer = |_: UserId, item: ItemId| item as f32;

        service.evaluate(&batch(), &scorer, 2).unwrap();

        let seen = display.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (0, vec![4, 3], vec![1, 3]));
    }

    #[test]
    fn test_relevance_arrays() {
        let mut rankings = BTreeMap::new();
        rankings.insert(
            0,
            UserRanking {
                predicted: vec![1],
                reference: vec![2],
            },
        );
        let (labels, predictions) = relevance_arrays(&rankings, &[1, 2, 3]);

        assert_eq!(labels, vec![false, true, false]);
        assert_eq!(predictions, vec![true, false, false]);
    }
}
