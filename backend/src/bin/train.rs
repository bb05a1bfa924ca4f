use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use disaster_service::config::ServiceConfig;
use disaster_service::console::run_session;
use disaster_service::model::ArtifactPaths;
use disaster_service::predictor::{Responder, ZeroProbabilityPolicy};
use disaster_service::training::{TrainingConfig, read_records_from_path, train};

/// Train the disaster classifier from a CSV export and write its artifacts.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// CSV with `Region`, `Country` and `Disaster Type` columns.
    #[arg(env = "TRAINING_DATA")]
    input: PathBuf,

    /// Directory for the artifacts; defaults to the paths in the service config.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    trees: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[arg(long, default_value_t = 0.3)]
    test_size: f64,

    /// Disaster types with fewer records are dropped before training.
    #[arg(long, default_value_t = 2)]
    min_class_count: usize,

    /// Start a prediction session on the new model once it is saved.
    #[arg(short, long)]
    interactive: bool,
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let paths = match &args.output_dir {
        Some(dir) => ArtifactPaths::in_dir(dir),
        None => ServiceConfig::load()?.artifacts,
    };

    let dataset = read_records_from_path(&args.input)?;
    println!(
        "Loaded {} records ({} rows dropped for empty values)",
        dataset.records.len(),
        dataset.rows_dropped
    );

    let config = TrainingConfig {
        test_fraction: args.test_size,
        seed: args.seed,
        n_trees: args.trees,
        min_class_count: args.min_class_count,
        ..TrainingConfig::default()
    };
    let outcome = train(dataset.records, &config)?;
    println!("{}", outcome.report);

    outcome.save(&paths)?;
    println!(
        "Saved model to {}, labels to {}, catalog to {}",
        paths.model.display(),
        paths.encoder.display(),
        paths.catalog.display()
    );

    if args.interactive {
        let (artifact, catalog) = outcome.into_artifact()?;
        run_session(
            &artifact,
            &catalog,
            Responder::new(ZeroProbabilityPolicy::Drop),
            io::stdin().lock(),
            io::stdout().lock(),
        )?;
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Training failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
