use chrono::{DateTime, Utc};
use derive_more::From;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Feature columns the classifier is trained on, in pipeline order.
pub const FEATURE_COLUMNS: [&str; 2] = ["Region", "Country"];

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictionRequest {
    pub region: String,
    pub country: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, From)]
pub struct RankedPrediction {
    pub disaster_type: String,
    pub probability: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictionResponse {
    pub status: String,
    pub region: String,
    pub country: String,
    pub predictions: Vec<RankedPrediction>,
}

impl PredictionResponse {
    pub fn ok(region: String, country: String, predictions: Vec<RankedPrediction>) -> Self {
        Self {
            status: "ok".into(),
            region,
            country,
            predictions,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum ModelStatus {
    #[serde(rename = "loaded")]
    #[strum(serialize = "loaded")]
    Loaded,
    #[serde(rename = "not loaded")]
    #[strum(serialize = "not loaded")]
    NotLoaded,
}

impl From<bool> for ModelStatus {
    fn from(loaded: bool) -> Self {
        if loaded {
            ModelStatus::Loaded
        } else {
            ModelStatus::NotLoaded
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ServiceInfo {
    pub service: String,
    pub status: String,
    pub model_loaded: bool,
    pub version: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub model_status: ModelStatus,
    /// Number of continents in the region catalog.
    pub countries_loaded: usize,
    pub total_countries: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ContinentsResponse {
    pub continents: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CountriesResponse {
    pub continent: String,
    pub countries: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub disaster_types: Vec<String>,
    pub num_disaster_types: usize,
    pub features: Vec<String>,
    pub artifact_id: Uuid,
    pub trained_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReloadResponse {
    pub status: String,
    pub model_info: ModelInfoResponse,
    pub total_countries: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn model_status_wire_and_display_forms_agree() {
        let json = serde_json::to_string(&ModelStatus::NotLoaded).unwrap();
        assert_eq!(json, "\"not loaded\"");
        assert_eq!(ModelStatus::NotLoaded.to_string(), "not loaded");
        assert_eq!(ModelStatus::from_str("loaded").unwrap(), ModelStatus::Loaded);
        assert_eq!(ModelStatus::from(true), ModelStatus::Loaded);
    }

    #[test]
    fn ranked_prediction_from_pair() {
        let p = RankedPrediction::from(("Flood".to_string(), 0.25));
        assert_eq!(p.disaster_type, "Flood");
        assert_eq!(p.probability, 0.25);
    }
}
