use std::process::ExitCode;

use clap::Parser;
use disaster_service::config::ServiceConfig;
use disaster_service::model::TrainedArtifact;
use disaster_service::predictor::{Query, Responder, ZeroProbabilityPolicy};
use serde_json::json;
use shared::PredictionResponse;

/// Predict disaster probabilities for one region/country pair and print JSON.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    region: String,
    country: String,

    /// Leave out disaster types with zero probability.
    #[arg(long)]
    drop_zero: bool,
}

fn run(args: &Args) -> Result<PredictionResponse, String> {
    let config = ServiceConfig::load().map_err(|e| e.to_string())?;
    let artifact = TrainedArtifact::load(&config.artifacts).map_err(|e| e.to_string())?;

    let policy = if args.drop_zero {
        ZeroProbabilityPolicy::Drop
    } else {
        ZeroProbabilityPolicy::Keep
    };
    let query = Query::new(&args.region, &args.country);
    Responder::new(policy)
        .respond(Some(&artifact), &query)
        .map(PredictionResponse::from)
        .map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    // stdout carries the JSON result; logs go to stderr and default to warnings only.
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(_) => {
            println!("{}", json!({ "error": "Missing arguments" }));
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(response) => match serde_json::to_string(&response) {
            Ok(body) => {
                println!("{body}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}", json!({ "error": e.to_string() }));
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            println!("{}", json!({ "error": e }));
            ExitCode::FAILURE
        }
    }
}
