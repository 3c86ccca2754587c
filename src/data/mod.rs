//! Read-only interaction data and the tables derived from it.

use crate::error::{EvalError, Result};
use crate::models::{Interaction, ItemId, Polarity, UserId};
use crate::utils::validation::{validate_interactions, validate_raw_row};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;

/// Immutable table of validated interactions with dense ids.
#[derive(Debug, Clone, Default)]
pub struct InteractionStore {
    interactions: Vec<Interaction>,
    num_users: usize,
    num_items: usize,
}

/// Interactions split by rating threshold. Every interaction lands in
/// exactly one pool.
#[derive(Debug, Clone)]
pub struct PolarityPartition {
    pub positive: Vec<Interaction>,
    pub negative: Vec<Interaction>,
    pub threshold: f32,
}

/// Occurrence count of each item within one evaluation batch.
#[derive(Debug, Clone, Default)]
pub struct PopularityTable {
    counts: HashMap<ItemId, usize>,
    total: usize,
}

/// Per-user observed ratings, keyed by item.
pub type TruthLookup = HashMap<UserId, HashMap<ItemId, f32>>;

impl InteractionStore {
    pub fn new(interactions: Vec<Interaction>) -> Result<Self> {
        validate_interactions(&interactions)?;

        let num_users = interactions.iter().map(|i| i.user_id + 1).max().unwrap_or(0);
        let num_items = interactions.iter().map(|i| i.item_id + 1).max().unwrap_or(0);

        Ok(Self {
            interactions,
            num_users,
            num_items,
        })
    }

    /// Builds a store from raw `(user, item, rating)` rows, keeping at most
    /// `max_rows` of them.
    pub fn from_raw_rows(rows: &[(i64, i64, f64)], max_rows: Option<usize>) -> Result<Self> {
        let limit = max_rows.unwrap_or(rows.len()).min(rows.len());
        let interactions = rows[..limit]
            .iter()
            .enumerate()
            .map(|(row, &(user_id, item_id, rating))| validate_raw_row(row, user_id, item_id, rating))
            .collect::<Result<Vec<_>>>()?;

        Self::new(interactions)
    }

    /// Random users/items/ratings on a 0.5..=5.0 half-star scale.
    pub fn synthetic<R: Rng + ?Sized>(
        num_users: usize,
        num_items: usize,
        num_interactions: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if num_users == 0 || num_items == 0 {
            return Err(EvalError::Configuration(
                "synthetic store needs at least one user and one item".to_string(),
            ));
        }

        let interactions = (0..num_interactions)
            .map(|_| {
                let user_id = rng.gen_range(0..num_users);
                let item_id = rng.gen_range(0..num_items);
                let rating = rng.gen_range(1..=10) as f32 * 0.5;
                Interaction::new(user_id, item_id, rating)
            })
            .collect();

        Self::new(interactions)
    }

    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    pub fn num_users(&self) -> usize {
        self.num_users
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    /// Randomly splits off `eval_size` interactions as an evaluation batch.
    pub fn split<R: Rng + ?Sized>(&self, eval_size: usize, rng: &mut R) -> Result<(InteractionStore, Vec<Interaction>)> {
        if eval_size > self.interactions.len() {
            return Err(EvalError::Configuration(format!(
                "eval_size {} exceeds store size {}",
                eval_size,
                self.interactions.len()
            )));
        }

        let mut shuffled = self.interactions.clone();
        shuffled.shuffle(rng);
        let train = shuffled.split_off(eval_size);

        Ok((
            InteractionStore {
                interactions: train,
                num_users: self.num_users,
                num_items: self.num_items,
            },
            shuffled,
        ))
    }

    pub fn partition(&self, threshold: f32) -> PolarityPartition {
        PolarityPartition::new(&self.interactions, threshold)
    }
}

impl Deref for InteractionStore {
    type Target = [Interaction];

    fn deref(&self) -> &Self::Target {
        &self.interactions
    }
}

impl PolarityPartition {
    pub fn new(interactions: &[Interaction], threshold: f32) -> Self {
        let (positive, negative): (Vec<Interaction>, Vec<Interaction>) = interactions
            .iter()
            .partition(|i| i.polarity(threshold) == Polarity::Positive);

        Self {
            positive,
            negative,
            threshold,
        }
    }

    pub fn pool(&self, polarity: Polarity) -> &[Interaction] {
        match polarity {
            Polarity::Positive => &self.positive,
            Polarity::Negative => &self.negative,
        }
    }
}

impl PopularityTable {
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let mut counts = HashMap::new();
        for interaction in interactions {
            *counts.entry(interaction.item_id).or_insert(0) += 1;
        }

        Self {
            counts,
            total: interactions.len(),
        }
    }

    pub fn count(&self, item_id: ItemId) -> Option<usize> {
        self.counts.get(&item_id).copied()
    }

    pub fn total_interactions(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Distinct item ids of `interactions` in ascending order.
pub fn candidate_items(interactions: &[Interaction]) -> Vec<ItemId> {
    interactions
        .iter()
        .map(|i| i.item_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn evaluated_users(interactions: &[Interaction]) -> BTreeSet<UserId> {
    interactions.iter().map(|i| i.user_id).collect()
}

/// Observed ratings per user. Repeated `(user, item)` pairs keep the
/// highest rating.
pub fn truth_lookup(interactions: &[Interaction]) -> TruthLookup {
    let mut lookup: TruthLookup = HashMap::new();
    for interaction in interactions {
        let rating = lookup
            .entry(interaction.user_id)
            .or_default()
            .entry(interaction.item_id)
            .or_insert(interaction.rating);
        if interaction.rating > *rating {
            *rating = interaction.rating;
        }
    }
    lookup
}
