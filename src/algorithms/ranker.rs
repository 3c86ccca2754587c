use crate::algorithms::Scorer;
use crate::data::TruthLookup;
use crate::error::{EvalError, Result};
use crate::models::{ItemId, UserId, UserRanking};
use crate::utils::top_k_by_score;
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::debug;

/// Builds per-user predicted and reference top-k lists.
#[derive(Debug, Clone)]
pub struct TopKRanker {
    parallel_threshold: usize,
}

impl Default for TopKRanker {
    fn default() -> Self {
        Self::new(64)
    }
}

impl TopKRanker {
    pub fn new(parallel_threshold: usize) -> Self {
        Self { parallel_threshold }
    }

    /// Scores every candidate for every user and keeps the `k` best.
    ///
    /// Ties break by ascending item id, so identical inputs always give
    /// identical lists. When `k` exceeds the number of distinct candidates
    /// the lists are simply shorter than `k`.
    pub fn rank<S: Scorer + ?Sized>(
        &self,
        users: &BTreeSet<UserId>,
        candidate_items: &[ItemId],
        scorer: &S,
        truth: &TruthLookup,
        k: usize,
    ) -> Result<BTreeMap<UserId, UserRanking>> {
        if candidate_items.is_empty() {
            return Err(EvalError::InsufficientCandidates);
        }

        let candidates = dedup_preserving_order(candidate_items);
        debug!(
            "Ranking {} users over {} candidates (k = {})",
            users.len(),
            candidates.len(),
            k
        );

        let rank_user = |&user_id: &UserId| (user_id, rank_one(user_id, &candidates, scorer, truth, k));

        let rankings: BTreeMap<UserId, UserRanking> = if users.len() >= self.parallel_threshold {
            users
                .iter()
                .collect::<Vec<_>>()
                .par_iter()
                .map(|&user_id| rank_user(user_id))
                .collect()
        } else {
            users.iter().map(rank_user).collect()
        };

        Ok(rankings)
    }
}

fn rank_one<S: Scorer + ?Sized>(
    user_id: UserId,
    candidates: &[ItemId],
    scorer: &S,
    truth: &TruthLookup,
    k: usize,
) -> UserRanking {
    let scores = scorer.score_items(user_id, candidates);
    let predicted = top_k_by_score(candidates.iter().copied().zip(scores), k);

    let reference = truth
        .get(&user_id)
        .map(|ratings| top_k_by_score(ratings.iter().map(|(&item, &rating)| (item, rating)), k))
        .unwrap_or_default();

    UserRanking {
        predicted,
        reference,
    }
}

fn dedup_preserving_order(items: &[ItemId]) -> Vec<ItemId> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .copied()
        .filter(|item| seen.insert(*item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::truth_lookup;
    use crate::models::Interaction;

    fn truth() -> TruthLookup {
        truth_lookup(&[
            Interaction::new(0, 1, 5.0),
            Interaction::new(0, 3, 4.0),
            Interaction::new(0, 2, 1.0),
            Interaction::new(1, 4, 2.0),
        ])
    }

    fn users() -> BTreeSet<UserId> {
        [0, 1].into_iter().collect()
    }

    #[test]
    fn test_rank_top_k() {
        let scorer = |_user: UserId, item: ItemId| item as f32;
        let ranker = TopKRanker::default();
        let rankings = ranker
            .rank(&users(), &[0, 1, 2, 3, 4], &scorer, &truth(), 2)
            .unwrap();

        assert_eq!(rankings[&0].predicted, vec![4, 3]);
        assert_eq!(rankings[&0].reference, vec![1, 3]);
        assert_eq!(rankings[&1].reference, vec![4]);
    }

    #[test]
    fn test_rank_truncates_when_k_exceeds_candidates() {
        let scorer = |_user: UserId, _item: ItemId| 0.0f32;
        let rankings = TopKRanker::default()
            .rank(&users(), &[2, 0, 2], &scorer, &truth(), 5)
            .unwrap();

        assert_eq!(rankings[&1].predicted, vec![0, 2]);
    }

    #[test]
    fn test_rank_empty_candidates_fails() {
        let scorer = |_user: UserId, _item: ItemId| 0.0f32;
        assert_eq!(
            TopKRanker::default().rank(&users(), &[], &scorer, &truth(), 2),
            Err(EvalError::InsufficientCandidates)
        );
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let scorer = |user: UserId, item: ItemId| ((user * 7 + item * 13) % 5) as f32;
        let users: BTreeSet<UserId> = (0..50).collect();
        let candidates: Vec<ItemId> = (0..30).collect();
        let truth = TruthLookup::new();

        let sequential = TopKRanker::new(usize::MAX)
            .rank(&users, &candidates, &scorer, &truth, 5)
            .unwrap();
        let parallel = TopKRanker::new(0)
            .rank(&users, &candidates, &scorer, &truth, 5)
            .unwrap();

        assert_eq!(sequential, parallel);
    }
}
