pub mod initializer;
pub mod ranker;
pub mod sampler;

pub use ranker::TopKRanker;
pub use sampler::BalancedSampler;

use crate::models::{ItemId, RatingFormat, TrainingExample, UserId};
use crate::utils::metrics::{binary_cross_entropy, mean_squared_error};
use crate::utils::sigmoid;
use nalgebra::DVector;
use rand::Rng;

/// Anything that can score a `(user, item)` pair. Every model architecture
/// plugs into evaluation through this trait.
pub trait Scorer: Send + Sync {
    fn score(&self, user_id: UserId, item_id: ItemId) -> f32;

    fn score_items(&self, user_id: UserId, item_ids: &[ItemId]) -> Vec<f32> {
        item_ids
            .iter()
            .map(|&item_id| self.score(user_id, item_id))
            .collect()
    }
}

impl<F> Scorer for F
where
    F: Fn(UserId, ItemId) -> f32 + Send + Sync,
{
    fn score(&self, user_id: UserId, item_id: ItemId) -> f32 {
        self(user_id, item_id)
    }
}

/// Dot-product matrix factorization over dense ids.
#[derive(Debug, Clone)]
pub struct MatrixFactorization {
    pub user_embeddings: Vec<DVector<f32>>,
    pub item_embeddings: Vec<DVector<f32>>,
    pub embedding_dim: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub rating_format: RatingFormat,
}

impl MatrixFactorization {
    pub fn new<R: Rng + ?Sized>(
        num_users: usize,
        num_items: usize,
        embedding_dim: usize,
        learning_rate: f64,
        weight_decay: f64,
        rating_format: RatingFormat,
        rng: &mut R,
    ) -> Self {
        let mut init = |n: usize| -> Vec<DVector<f32>> {
            (0..n)
                .map(|_| DVector::from_vec(initializer::xavier_uniform(embedding_dim, &mut *rng)))
                .collect()
        };
        let user_embeddings = init(num_users);
        let item_embeddings = init(num_items);

        Self {
            user_embeddings,
            item_embeddings,
            embedding_dim,
            learning_rate,
            weight_decay,
            rating_format,
        }
    }

    fn logit(&self, user_id: UserId, item_id: ItemId) -> Option<f32> {
        let user_emb = self.user_embeddings.get(user_id)?;
        let item_emb = self.item_embeddings.get(item_id)?;
        Some(user_emb.dot(item_emb))
    }

    fn output(&self, logit: f32) -> f32 {
        match self.rating_format {
            RatingFormat::Binary => sigmoid(logit),
            RatingFormat::Rating => logit,
        }
    }

    /// Mean BCE (binary) or MSE (rating) over `examples`.
    pub fn compute_loss(&self, examples: &[TrainingExample]) -> f64 {
        let pairs: Vec<(f32, f32)> = examples
            .iter()
            .filter_map(|e| {
                self.logit(e.user_id, e.item_id)
                    .map(|logit| (self.output(logit), e.label))
            })
            .collect();

        let loss = match self.rating_format {
            RatingFormat::Binary => binary_cross_entropy(&pairs),
            RatingFormat::Rating => mean_squared_error(&pairs),
        };
        loss.unwrap_or(0.0)
    }

    /// One SGD step on a single example. Unknown ids are skipped.
    pub fn sgd_update(&mut self, example: &TrainingExample) {
        let Some(logit) = self.logit(example.user_id, example.item_id) else {
            return;
        };

        // negative logit gradient for both sigmoid+BCE and identity+MSE
        let error = example.label - self.output(logit);
        let lr = self.learning_rate as f32;
        let decay = self.weight_decay as f32;

        let user_emb = self.user_embeddings[example.user_id].clone();
        let item_emb = self.item_embeddings[example.item_id].clone();

        let user_gradient = &item_emb * error - &user_emb * decay;
        let item_gradient = &user_emb * error - &item_emb * decay;

        self.user_embeddings[example.user_id] = &user_emb + &user_gradient * lr;
        self.item_embeddings[example.item_id] = &item_emb + &item_gradient * lr;
    }

    pub fn train(&mut self, examples: &[TrainingExample]) {
        for example in examples {
            self.sgd_update(example);
        }
    }
}

impl Scorer for MatrixFactorization {
    fn score(&self, user_id: UserId, item_id: ItemId) -> f32 {
        self.logit(user_id, item_id)
            .map(|logit| self.output(logit))
            .unwrap_or(f32::NAN)
    }
}
