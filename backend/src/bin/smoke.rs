use std::process::ExitCode;

use clap::Parser;
use reqwest::{Client, StatusCode};
use shared::{
    ContinentsResponse, CountriesResponse, HealthResponse, ModelInfoResponse, PredictionRequest,
    PredictionResponse,
};
use url::Url;

/// Exercise a running prediction service and report PASS/FAIL per endpoint.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    #[arg(long, env = "SMOKE_BASE_URL", default_value = "http://localhost:8000")]
    base_url: Url,

    #[arg(long, default_value = "Asia")]
    continent: String,

    #[arg(long, default_value = "Asia")]
    region: String,

    #[arg(long, default_value = "Japan")]
    country: String,
}

#[derive(Debug, thiserror::Error)]
enum CheckError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("bad url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("{0}")]
    Assertion(String),
}

struct Smoke {
    client: Client,
    base: Url,
}

impl Smoke {
    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, CheckError> {
        let response = self.client.get(self.base.join(path)?).send().await?;
        if response.status() != StatusCode::OK {
            return Err(CheckError::Status(response.status()));
        }
        Ok(response.json().await?)
    }

    async fn health(&self) -> Result<String, CheckError> {
        let health: HealthResponse = self.get("/api/health").await?;
        Ok(format!(
            "model {}, {} continents, {} countries",
            health.model_status, health.countries_loaded, health.total_countries
        ))
    }

    async fn continents(&self) -> Result<String, CheckError> {
        let body: ContinentsResponse = self.get("/api/continents").await?;
        Ok(body.continents.join(", "))
    }

    async fn countries(&self, continent: &str) -> Result<String, CheckError> {
        let path = format!("/api/countries/{}", urlencoding::encode(continent));
        let body: CountriesResponse = self.get(&path).await?;
        let preview: Vec<&str> = body.countries.iter().take(5).map(String::as_str).collect();
        Ok(format!("{}... ({} total)", preview.join(", "), body.countries.len()))
    }

    async fn predict(&self, region: &str, country: &str) -> Result<String, CheckError> {
        let request = PredictionRequest {
            region: region.to_string(),
            country: country.to_string(),
        };
        let response = self
            .client
            .post(self.base.join("/api/predict-disaster")?)
            .json(&request)
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(CheckError::Status(response.status()));
        }
        let body: PredictionResponse = response.json().await?;
        if body.status != "ok" {
            return Err(CheckError::Assertion(format!("status was {}", body.status)));
        }
        if body
            .predictions
            .windows(2)
            .any(|w| w[0].probability < w[1].probability)
        {
            return Err(CheckError::Assertion("predictions are not sorted".into()));
        }
        let top: Vec<String> = body
            .predictions
            .iter()
            .take(5)
            .map(|p| format!("{}: {:.2}%", p.disaster_type, p.probability * 100.0))
            .collect();
        Ok(format!("{}, {}: {}", body.country, body.region, top.join("; ")))
    }

    async fn model_info(&self) -> Result<String, CheckError> {
        let info: ModelInfoResponse = self.get("/api/model-info").await?;
        Ok(format!("{} ({} disaster types)", info.model_type, info.num_disaster_types))
    }
}

fn report(name: &str, outcome: Result<String, CheckError>) -> bool {
    match outcome {
        Ok(detail) => {
            println!("PASS  {name:<12} {detail}");
            true
        }
        Err(e) => {
            println!("FAIL  {name:<12} {e}");
            false
        }
    }
}

#[actix_web::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let args = Args::parse();
    log::info!("Testing service at {}", args.base_url);

    let smoke = Smoke {
        client: Client::new(),
        base: args.base_url,
    };

    let results = [
        report("health", smoke.health().await),
        report("continents", smoke.continents().await),
        report("countries", smoke.countries(&args.continent).await),
        report("predict", smoke.predict(&args.region, &args.country).await),
        report("model-info", smoke.model_info().await),
    ];
    let passed = results.iter().filter(|ok| **ok).count();
    println!("{passed}/{} checks passed", results.len());

    if passed == results.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
