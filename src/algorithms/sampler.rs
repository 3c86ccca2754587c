//! Balanced positive/negative sampling over an interaction store.
//!
//! Index `i` is positive when `i % num_negative_samples == 0` and negative
//! otherwise. The interaction returned for that polarity is drawn uniformly
//! with replacement on every call, so revisiting an index in a later epoch
//! usually yields a different interaction.

use crate::config::SamplerConfig;
use crate::data::{InteractionStore, PolarityPartition};
use crate::error::{EvalError, Result};
use crate::models::{Interaction, Polarity, RatingFormat, TrainingExample};
use rand::Rng;
use tracing::info;

#[derive(Debug, Clone)]
pub struct BalancedSampler {
    partition: PolarityPartition,
    num_negative_samples: usize,
    rating_format: RatingFormat,
    len: usize,
}

impl BalancedSampler {
    pub fn new(store: &InteractionStore, config: &SamplerConfig) -> Result<Self> {
        Self::from_interactions(store.interactions(), config)
    }

    pub fn from_interactions(interactions: &[Interaction], config: &SamplerConfig) -> Result<Self> {
        config.validate()?;

        let partition = PolarityPartition::new(interactions, config.negative_sample_threshold);
        for polarity in [Polarity::Positive, Polarity::Negative] {
            if partition.pool(polarity).is_empty() {
                return Err(EvalError::EmptyPool {
                    polarity,
                    threshold: config.negative_sample_threshold,
                });
            }
        }

        info!(
            "Balanced sampler ready: {} positive, {} negative, 1 positive per {} indices",
            partition.positive.len(),
            partition.negative.len(),
            config.num_negative_samples
        );

        Ok(Self {
            partition,
            num_negative_samples: config.num_negative_samples,
            rating_format: config.rating_format,
            len: interactions.len(),
        })
    }

    /// Nominal epoch length: one index per stored interaction.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn num_negative_samples(&self) -> usize {
        self.num_negative_samples
    }

    pub fn pool(&self, polarity: Polarity) -> &[Interaction] {
        self.partition.pool(polarity)
    }

    pub fn polarity(&self, index: usize) -> Polarity {
        if index % self.num_negative_samples == 0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }

    /// Draws an interaction from the pool matching `index`'s polarity.
    pub fn sample<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Interaction {
        let pool = self.partition.pool(self.polarity(index));
        // pools are checked non-empty at construction
        pool[rng.gen_range(0..pool.len())]
    }

    pub fn sample_example<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> TrainingExample {
        let interaction = self.sample(index, rng);
        TrainingExample {
            user_id: interaction.user_id,
            item_id: interaction.item_id,
            label: self
                .rating_format
                .label(interaction.rating, self.partition.threshold),
        }
    }

    /// Uses the calling thread's RNG.
    pub fn sample_thread_local(&self, index: usize) -> Interaction {
        self.sample(index, &mut rand::thread_rng())
    }
}
