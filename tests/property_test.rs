//! Property-based tests for sampling, ranking and the metric suite.

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use recsys_eval::config::SamplerConfig;
use recsys_eval::data::TruthLookup;
use recsys_eval::utils::metrics::MetricsCalculator;
use recsys_eval::*;

// ── Strategies ────────────────────────────────────────────────────────

/// A recommendation list of distinct items drawn from a small catalog.
fn arb_list(max_len: usize) -> impl Strategy<Value = Vec<ItemId>> {
    prop::collection::hash_set(0_usize..40, 0..=max_len).prop_map(|set| {
        let mut items: Vec<ItemId> = set.into_iter().collect();
        items.sort_unstable();
        items
    })
}

fn arb_lists(max_users: usize) -> impl Strategy<Value = Vec<Vec<ItemId>>> {
    prop::collection::vec(arb_list(10), 2..=max_users)
}

/// Interactions with both ratings above and below 3.0.
fn arb_store() -> impl Strategy<Value = InteractionStore> {
    (
        prop::collection::vec((0_usize..20, 0_usize..20, 3.0_f32..5.0), 1..20),
        prop::collection::vec((0_usize..20, 0_usize..20, 0.0_f32..2.9), 1..20),
    )
        .prop_map(|(positives, negatives)| {
            let interactions = positives
                .into_iter()
                .chain(negatives)
                .map(|(user, item, rating)| Interaction::new(user, item, rating))
                .collect();
            InteractionStore::new(interactions).expect("generated ratings are finite")
        })
}

fn sampler_config(num_negative_samples: usize) -> SamplerConfig {
    SamplerConfig {
        negative_sample_threshold: 3.0,
        num_negative_samples,
        rating_format: RatingFormat::Binary,
    }
}

// ── Sampler ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn sampler_positive_fraction_is_exact(n in 1_usize..10, runs in 1_usize..50) {
        let store = InteractionStore::new(vec![
            Interaction::new(0, 0, 5.0),
            Interaction::new(0, 1, 1.0),
        ]).unwrap();
        let sampler = BalancedSampler::new(&store, &sampler_config(n)).unwrap();

        let m = n * runs;
        let positives = (0..m)
            .filter(|&i| sampler.polarity(i) == Polarity::Positive)
            .count();
        prop_assert_eq!(positives * n, m);
    }

    #[test]
    fn sampler_draws_from_matching_pool(store in arb_store(), n in 1_usize..6, seed in any::<u64>()) {
        let sampler = BalancedSampler::new(&store, &sampler_config(n)).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);

        for index in 0..64 {
            let drawn = sampler.sample(index, &mut rng);
            let polarity = sampler.polarity(index);
            prop_assert_eq!(drawn.polarity(3.0), polarity);
            prop_assert!(sampler.pool(polarity).contains(&drawn));
        }
    }
}

// ── Ranking ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ranking_is_deterministic_and_truncates(
        scores in prop::collection::vec(-1.0_f32..1.0, 1..30),
        k in 1_usize..40,
    ) {
        let table = scores.clone();
        let scorer = move |_: UserId, item: ItemId| table[item];
        let candidates: Vec<ItemId> = (0..scores.len()).collect();
        let users: BTreeSet<UserId> = [0, 1].into_iter().collect();
        let truth = TruthLookup::new();
        let ranker = TopKRanker::default();

        let first = ranker.rank(&users, &candidates, &scorer, &truth, k).unwrap();
        let second = ranker.rank(&users, &candidates, &scorer, &truth, k).unwrap();
        prop_assert_eq!(&first, &second);

        let predicted = &first[&0].predicted;
        prop_assert_eq!(predicted.len(), k.min(candidates.len()));
        for pair in predicted.windows(2) {
            prop_assert!(scores[pair[0]] >= scores[pair[1]]);
        }
    }
}

// ── Metrics ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ndcg_is_bounded(predicted in arb_list(10), reference in arb_list(10), k in 1_usize..12) {
        let ndcg = MetricsCalculator::new(k).calculate_ndcg_at_k(&predicted, &reference);
        prop_assert!((0.0..=1.0).contains(&ndcg), "ndcg {} out of bounds", ndcg);
    }

    #[test]
    fn ndcg_is_one_for_same_set(reference in arb_list(10)) {
        prop_assume!(!reference.is_empty());
        let k = reference.len();
        let mut predicted = reference.clone();
        predicted.reverse();

        let ndcg = MetricsCalculator::new(k).calculate_ndcg_at_k(&predicted, &reference);
        prop_assert!((ndcg - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prediction_coverage_grows_with_users(lists in arb_lists(12)) {
        let calculator = MetricsCalculator::new(10);
        let mut previous = 0.0;

        for users in 1..=lists.len() {
            let coverage = calculator
                .calculate_prediction_coverage(&lists[..users], 40)
                .unwrap();
            prop_assert!(coverage >= previous);
            previous = coverage;
        }
    }

    #[test]
    fn personalization_is_bounded(lists in arb_lists(8)) {
        let value = MetricsCalculator::new(10).calculate_personalization(&lists).unwrap();
        prop_assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn personalization_is_zero_for_identical_lists(list in arb_list(10), users in 2_usize..6) {
        prop_assume!(!list.is_empty());
        let lists = vec![list; users];
        let value = MetricsCalculator::new(10).calculate_personalization(&lists).unwrap();
        prop_assert!(value.abs() < 1e-9);
    }

    #[test]
    fn roc_auc_is_bounded_or_absent(
        pairs in prop::collection::vec((any::<bool>(), any::<bool>()), 1..60),
    ) {
        let labels: Vec<bool> = pairs.iter().map(|(l, _)| *l).collect();
        let predictions: Vec<bool> = pairs.iter().map(|(_, p)| *p).collect();
        let degenerate = |values: &[bool]| {
            values.iter().collect::<HashSet<_>>().len() < 2
        };

        match MetricsCalculator::new(10).calculate_roc_auc(&labels, &predictions) {
            Ok(auc) => prop_assert!((0.0..=1.0).contains(&auc)),
            Err(EvalError::MetricNotComputable { .. }) => {
                prop_assert!(degenerate(&labels) || degenerate(&predictions));
            }
            Err(e) => prop_assert!(false, "unexpected error {}", e),
        }
    }
}
