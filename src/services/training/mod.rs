use crate::algorithms::{BalancedSampler, MatrixFactorization};
use crate::config::Config;
use crate::error::Result;
use crate::models::{EvaluationReport, Interaction, TrainingExample};
use crate::services::evaluation::EvaluationService;
use crate::services::reporting::MetricsSink;
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Drives sampling, SGD updates and periodic evaluation for one run.
pub struct TrainingService {
    config: Arc<Config>,
    evaluator: EvaluationService,
    sinks: Vec<Arc<dyn MetricsSink>>,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub epochs: usize,
    pub examples_seen: usize,
    pub final_loss: f64,
    pub reports: Vec<EvaluationReport>,
}

impl TrainingService {
    pub fn new(config: Arc<Config>, evaluator: EvaluationService) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            evaluator,
            sinks: Vec::new(),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Runs `config.training.epochs` epochs. Every `eval_every` epochs the
    /// model is evaluated on `eval_batch` before training continues.
    pub fn run<R: Rng + ?Sized>(
        &self,
        sampler: &BalancedSampler,
        eval_batch: &[Interaction],
        model: &mut MatrixFactorization,
        rng: &mut R,
    ) -> Result<TrainingSummary> {
        let training = &self.config.training;
        let k = self.config.evaluation.k;
        let mut reports = Vec::new();
        let mut examples_seen = 0;
        let mut final_loss = 0.0;
        let mut step = 0;

        for epoch in 0..training.epochs {
            if epoch % training.eval_every == 0 {
                info!("Running eval at epoch {}", epoch);
                let report = self.evaluator.evaluate(eval_batch, &*model, k)?;
                for sink in &self.sinks {
                    sink.record(step, &report);
                }
                reports.push(report);
            }

            let started = Instant::now();
            let indices: Vec<usize> = (0..sampler.len()).collect();
            for (batch_idx, chunk) in indices.chunks(training.batch_size).enumerate() {
                let batch: Vec<TrainingExample> = chunk
                    .iter()
                    .map(|&index| sampler.sample_example(index, &mut *rng))
                    .collect();

                model.train(&batch);
                final_loss = model.compute_loss(&batch);
                examples_seen += batch.len();
                step += 1;

                info!(
                    "Epoch {:03}, batch {:03}, loss {:.3}",
                    epoch, batch_idx, final_loss
                );

                if batch_idx + 1 >= training.max_batches {
                    break;
                }
            }
            info!("Epoch {} finished in {:?}", epoch, started.elapsed());
        }

        Ok(TrainingSummary {
            epochs: training.epochs,
            examples_seen,
            final_loss,
            reports,
        })
    }
}
