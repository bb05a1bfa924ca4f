use std::io;
use std::process::ExitCode;

use clap::Parser;
use disaster_service::config::ServiceConfig;
use disaster_service::console::run_session;
use disaster_service::predictor::{Responder, ZeroProbabilityPolicy};
use disaster_service::state::LoadedArtifacts;

/// Interactive disaster probability lookup.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Also list disaster types with zero probability.
    #[arg(long)]
    show_all: bool,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();

    let config = match ServiceConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid service configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let loaded = match LoadedArtifacts::load(&config.artifacts) {
        Ok(loaded) => loaded,
        Err(e) => {
            log::error!("The model is not trained or could not be loaded: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let policy = if args.show_all {
        ZeroProbabilityPolicy::Keep
    } else {
        ZeroProbabilityPolicy::Drop
    };
    let catalog = loaded.catalog.unwrap_or_default();

    match run_session(
        &loaded.artifact,
        &catalog,
        Responder::new(policy),
        io::stdin().lock(),
        io::stdout().lock(),
    ) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Console session failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
