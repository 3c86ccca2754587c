use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

pub mod metrics;
pub mod validation;

/// Cosine similarity of two binary indicator vectors given as their
/// sets of set positions.
pub fn set_cosine_similarity<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot_product = small.iter().filter(|x| large.contains(x)).count() as f64;
    let norm_product = ((a.len() * b.len()) as f64).sqrt();

    (dot_product / norm_product).clamp(0.0, 1.0)
}

/// Descending by score, then ascending by id. NaN scores sort last.
pub fn compare_scored<I: Ord>(a: &(I, f32), b: &(I, f32)) -> Ordering {
    let score = |s: f32| if s.is_nan() { f32::NEG_INFINITY } else { s };
    score(b.1)
        .total_cmp(&score(a.1))
        .then_with(|| a.0.cmp(&b.0))
}

pub fn top_k_by_score<I: Ord + Copy>(scored: impl IntoIterator<Item = (I, f32)>, k: usize) -> Vec<I> {
    let mut indexed_scores: Vec<(I, f32)> = scored.into_iter().collect();

    if k < indexed_scores.len() {
        indexed_scores.select_nth_unstable_by(k, compare_scored);
        indexed_scores.truncate(k);
    }
    indexed_scores.sort_by(compare_scored);

    indexed_scores.into_iter().map(|(id, _)| id).collect()
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
