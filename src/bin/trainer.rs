use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use recsys_eval::services::reporting::{TracingDisplay, TracingSink};
use recsys_eval::services::training::TrainingService;
use recsys_eval::{init_tracing, BalancedSampler, Config, EvaluationService, InteractionStore, MatrixFactorization};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Users in the generated interaction store
    #[arg(long, default_value_t = 500)]
    num_users: usize,

    /// Items in the generated interaction store
    #[arg(long, default_value_t = 1000)]
    num_items: usize,

    /// Interactions in the generated interaction store
    #[arg(long, default_value_t = 20_000)]
    num_interactions: usize,

    /// Overrides `training.epochs`
    #[arg(long)]
    epochs: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    std::env::set_var("RUST_LOG", &args.log_level);
    init_tracing();

    info!("Starting recsys-eval trainer");

    let mut config = if std::path::Path::new(&args.config).exists() {
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, using default configuration");
        Config::default()
    };
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    config.validate()?;
    info!("Configuration loaded: {:?}", config);

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.evaluation.workers)
        .build_global()?;

    let mut rng = StdRng::seed_from_u64(config.training.seed);
    let row_cap = config
        .training
        .max_rows
        .unwrap_or(args.num_interactions)
        .min(args.num_interactions);
    let store = InteractionStore::synthetic(args.num_users, args.num_items, row_cap, &mut rng)?;
    info!(
        "Interaction store: {} interactions, {} users, {} items",
        store.len(),
        store.num_users(),
        store.num_items()
    );

    let (train, eval_batch) = store.split(config.evaluation.eval_size, &mut rng)?;
    let sampler = BalancedSampler::new(&train, &config.sampler)?;

    let mut model = MatrixFactorization::new(
        store.num_users(),
        store.num_items(),
        config.training.embedding_dim,
        config.training.learning_rate,
        config.training.weight_decay,
        config.sampler.rating_format,
        &mut rng,
    );

    let config = Arc::new(config);
    let evaluator = EvaluationService::new(&config.evaluation, &config.sampler)
        .with_display(Arc::new(TracingDisplay));
    let service = TrainingService::new(config.clone(), evaluator)?.with_sink(Arc::new(TracingSink));

    let summary = service.run(&sampler, &eval_batch, &mut model, &mut rng)?;

    info!(
        "Training finished: {} epochs, {} examples, final loss {:.4}",
        summary.epochs, summary.examples_seen, summary.final_loss
    );
    if let Some(report) = summary.reports.last() {
        info!("Last evaluation report: {}", serde_json::to_string(report)?);
    }

    Ok(())
}
