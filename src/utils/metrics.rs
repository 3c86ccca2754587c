use crate::data::PopularityTable;
use crate::error::{EvalError, Result};
use crate::models::{
    ItemId, METRIC_CATALOG_COVERAGE, METRIC_NDCG, METRIC_NOVELTY, METRIC_PERSONALIZATION,
    METRIC_PREDICTION_COVERAGE, METRIC_ROC_AUC,
};
use crate::utils::{mean, set_cosine_similarity};
use rayon::prelude::*;
use std::collections::HashSet;

const LOSS_EPSILON: f32 = 1e-7;

/// Top-k quality metrics over per-user recommendation lists.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    k: usize,
}

impl MetricsCalculator {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// NDCG with binary relevance: an item is relevant when it appears in
    /// `reference`. Zero when nothing is relevant.
    pub fn calculate_ndcg_at_k(&self, predicted: &[ItemId], reference: &[ItemId]) -> f64 {
        let relevant: HashSet<&ItemId> = reference.iter().collect();
        let dcg = self.calculate_dcg(predicted, &relevant);
        let idcg = self.calculate_ideal_dcg(relevant.len());

        if idcg == 0.0 {
            0.0
        } else {
            (dcg / idcg).min(1.0)
        }
    }

    fn calculate_dcg(&self, predicted: &[ItemId], relevant: &HashSet<&ItemId>) -> f64 {
        let mut seen = HashSet::new();
        predicted
            .iter()
            .take(self.k)
            .enumerate()
            .filter(|(_, item_id)| relevant.contains(item_id) && seen.insert(**item_id))
            .map(|(i, _)| discount(i + 1))
            .sum()
    }

    fn calculate_ideal_dcg(&self, num_relevant: usize) -> f64 {
        (1..=num_relevant.min(self.k)).map(discount).sum()
    }

    /// Mean per-user NDCG over `(predicted, reference)` pairs.
    pub fn calculate_mean_ndcg(&self, rankings: &[(&[ItemId], &[ItemId])]) -> Result<f64> {
        let scores: Vec<f64> = rankings
            .iter()
            .map(|(predicted, reference)| self.calculate_ndcg_at_k(predicted, reference))
            .collect();

        mean(&scores).ok_or_else(|| EvalError::not_computable(METRIC_NDCG, "no users evaluated"))
    }

    /// Mean self-information `-log2(count / total)` over every recommended
    /// item. Items missing from the table score `log2(total)`.
    pub fn calculate_novelty(&self, predicted: &[Vec<ItemId>], popularity: &PopularityTable) -> Result<f64> {
        if popularity.is_empty() {
            return Err(EvalError::not_computable(
                METRIC_NOVELTY,
                "popularity table is empty",
            ));
        }

        let total = popularity.total_interactions() as f64;
        let max_self_information = total.log2();

        let self_information: Vec<f64> = predicted
            .iter()
            .flat_map(|list| list.iter())
            .map(|item_id| match popularity.count(*item_id) {
                Some(count) if count > 0 => -(count as f64 / total).log2(),
                _ => max_self_information,
            })
            .collect();

        mean(&self_information)
            .ok_or_else(|| EvalError::not_computable(METRIC_NOVELTY, "no recommended items"))
    }

    /// Share of the catalog that appears in at least one list.
    pub fn calculate_prediction_coverage(&self, predicted: &[Vec<ItemId>], catalog_size: usize) -> Result<f64> {
        coverage(predicted.iter().map(|list| list.as_slice()), catalog_size)
            .ok_or_else(|| EvalError::not_computable(METRIC_PREDICTION_COVERAGE, "catalog is empty"))
    }

    /// Same ratio as prediction coverage, over each list's first `k` items.
    pub fn calculate_catalog_coverage(&self, predicted: &[Vec<ItemId>], catalog_size: usize) -> Result<f64> {
        let window = predicted
            .iter()
            .map(|list| &list[..list.len().min(self.k)]);

        coverage(window, catalog_size)
            .ok_or_else(|| EvalError::not_computable(METRIC_CATALOG_COVERAGE, "catalog is empty"))
    }

    /// `1 - mean pairwise cosine similarity` of the users' binary
    /// recommendation vectors.
    pub fn calculate_personalization(&self, predicted: &[Vec<ItemId>]) -> Result<f64> {
        if predicted.len() < 2 {
            return Err(EvalError::not_computable(
                METRIC_PERSONALIZATION,
                format!("needs at least 2 users, got {}", predicted.len()),
            ));
        }

        let sets: Vec<HashSet<ItemId>> = predicted
            .iter()
            .map(|list| list.iter().copied().collect())
            .collect();

        let similarity_sum: f64 = (0..sets.len())
            .into_par_iter()
            .map(|i| {
                sets[i + 1..]
                    .iter()
                    .map(|other| set_cosine_similarity(&sets[i], other))
                    .sum::<f64>()
            })
            .sum();

        let num_pairs = (sets.len() * (sets.len() - 1) / 2) as f64;
        Ok((1.0 - similarity_sum / num_pairs).clamp(0.0, 1.0))
    }

    /// ROC-AUC of boolean predictions against boolean labels. Both arrays
    /// must hold at least one `true` and one `false`.
    pub fn calculate_roc_auc(&self, labels: &[bool], predictions: &[bool]) -> Result<f64> {
        if labels.len() != predictions.len() {
            return Err(EvalError::not_computable(
                METRIC_ROC_AUC,
                format!(
                    "label/prediction length mismatch: {} vs {}",
                    labels.len(),
                    predictions.len()
                ),
            ));
        }

        for (name, values) in [("labels", labels), ("predictions", predictions)] {
            if !has_both_classes(values) {
                return Err(EvalError::not_computable(
                    METRIC_ROC_AUC,
                    format!("{} contain a single class", name),
                ));
            }
        }

        let points: Vec<(f64, bool)> = predictions
            .iter()
            .zip(labels)
            .map(|(&prediction, &label)| (if prediction { 1.0 } else { 0.0 }, label))
            .collect();

        roc_auc(&points).ok_or_else(|| EvalError::not_computable(METRIC_ROC_AUC, "single class"))
    }
}

fn discount(rank: usize) -> f64 {
    1.0 / ((rank + 1) as f64).log2()
}

fn has_both_classes(values: &[bool]) -> bool {
    values.iter().any(|&v| v) && values.iter().any(|&v| !v)
}

fn coverage<'a>(lists: impl Iterator<Item = &'a [ItemId]>, catalog_size: usize) -> Option<f64> {
    if catalog_size == 0 {
        return None;
    }

    let distinct: HashSet<ItemId> = lists.flat_map(|list| list.iter().copied()).collect();
    Some((distinct.len() as f64 / catalog_size as f64).min(1.0))
}

/// Mann-Whitney ROC-AUC over `(score, label)` points, averaging ranks of
/// tied scores. `None` when either class is missing.
pub fn roc_auc(points: &[(f64, bool)]) -> Option<f64> {
    let n_pos = points.iter().filter(|(_, label)| *label).count();
    let n_neg = points.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut ranked: Vec<(f64, bool)> = points.to_vec();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut sum_rank_pos = 0.0_f64;
    let mut start = 0usize;
    while start < ranked.len() {
        let mut end = start + 1;
        while end < ranked.len() && ranked[end].0 == ranked[start].0 {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 * 0.5;
        let positives = ranked[start..end].iter().filter(|(_, label)| *label).count();
        sum_rank_pos += avg_rank * positives as f64;
        start = end;
    }

    let n_pos_f = n_pos as f64;
    let n_neg_f = n_neg as f64;
    Some((sum_rank_pos - n_pos_f * (n_pos_f + 1.0) * 0.5) / (n_pos_f * n_neg_f))
}

/// Mean binary cross-entropy over `(prediction, label)` pairs.
pub fn binary_cross_entropy(pairs: &[(f32, f32)]) -> Option<f64> {
    let losses: Vec<f64> = pairs
        .iter()
        .map(|&(prediction, label)| {
            let p = prediction.clamp(LOSS_EPSILON, 1.0 - LOSS_EPSILON) as f64;
            let y = label as f64;
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .collect();
    mean(&losses)
}

pub fn mean_squared_error(pairs: &[(f32, f32)]) -> Option<f64> {
    let losses: Vec<f64> = pairs
        .iter()
        .map(|&(prediction, label)| ((prediction - label) as f64).powi(2))
        .collect();
    mean(&losses)
}
