//! Turns a normalized query and a loaded artifact into ranked predictions.
//!
//! This is the single implementation behind the HTTP API, the one-shot CLI
//! and the console session; they differ only in how they decode the query
//! and render the result.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use shared::{PredictionResponse, RankedPrediction};

use crate::model::TrainedArtifact;
use crate::normalize::normalize;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PredictError {
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("Prediction error: {0}")]
    PredictionFailed(String),
}

/// Whether zero-probability classes are part of a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroProbabilityPolicy {
    #[default]
    Keep,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub region: String,
    pub country: String,
}

impl Query {
    /// Build a query from raw user input, normalized to training conventions.
    pub fn new(region: &str, country: &str) -> Self {
        Self {
            region: normalize(region),
            country: normalize(country),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionResult {
    pub region: String,
    pub country: String,
    pub ranked: Vec<(String, f64)>,
}

impl PredictionResult {
    /// True when nothing is left to show, e.g. an unseen pair under `Drop`.
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

impl From<PredictionResult> for PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        let predictions = result
            .ranked
            .into_iter()
            .map(RankedPrediction::from)
            .collect();
        PredictionResponse::ok(result.region, result.country, predictions)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Responder {
    policy: ZeroProbabilityPolicy,
}

impl Responder {
    pub fn new(policy: ZeroProbabilityPolicy) -> Self {
        Self { policy }
    }

    pub fn respond(
        &self,
        artifact: Option<&TrainedArtifact>,
        query: &Query,
    ) -> Result<PredictionResult, PredictError> {
        let artifact = artifact.ok_or(PredictError::ModelUnavailable)?;
        let classifier = artifact.classifier();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            classifier.predict_probabilities(&query.region, &query.country)
        }));
        let probabilities = match outcome {
            Ok(Ok(p)) => p,
            Ok(Err(e)) => return Err(PredictError::PredictionFailed(e.to_string())),
            Err(payload) => {
                let detail = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "classifier panicked".to_string());
                return Err(PredictError::PredictionFailed(detail));
            }
        };

        let mut ranked = rank(artifact.label_set(), &probabilities)?;
        if self.policy == ZeroProbabilityPolicy::Drop {
            ranked.retain(|(_, p)| *p > 0.0);
        }

        Ok(PredictionResult {
            region: query.region.clone(),
            country: query.country.clone(),
            ranked,
        })
    }
}

/// Pair labels with probabilities and sort descending.
///
/// The sort is stable, so equal probabilities keep label-set order.
pub fn rank(labels: &[String], probabilities: &[f64]) -> Result<Vec<(String, f64)>, PredictError> {
    if labels.len() != probabilities.len() {
        return Err(PredictError::PredictionFailed(format!(
            "classifier returned {} probabilities for {} disaster types",
            probabilities.len(),
            labels.len()
        )));
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
        return Err(PredictError::PredictionFailed(format!(
            "classifier returned a non-finite probability ({bad})"
        )));
    }

    let mut ranked: Vec<(String, f64)> = labels
        .iter()
        .cloned()
        .zip(probabilities.iter().copied())
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactMetadata, LabelEncoder, ModelError, ProbabilityModel};

    #[derive(Debug)]
    struct Fixed(Vec<f64>);

    impl ProbabilityModel for Fixed {
        fn predict_probabilities(&self, _: &str, _: &str) -> Result<Vec<f64>, ModelError> {
            Ok(self.0.clone())
        }
        fn n_classes(&self) -> usize {
            3
        }
        fn model_type(&self) -> String {
            "Fixed".into()
        }
        fn feature_names(&self) -> Vec<String> {
            vec!["Region".into(), "Country".into()]
        }
    }

    #[derive(Debug)]
    struct Panics;

    impl ProbabilityModel for Panics {
        fn predict_probabilities(&self, _: &str, _: &str) -> Result<Vec<f64>, ModelError> {
            panic!("bad input shape")
        }
        fn n_classes(&self) -> usize {
            3
        }
        fn model_type(&self) -> String {
            "Panics".into()
        }
        fn feature_names(&self) -> Vec<String> {
            Vec::new()
        }
    }

    fn artifact(model: impl ProbabilityModel + 'static) -> TrainedArtifact {
        let labels = LabelEncoder::fit(["Drought", "Flood", "Storm"]).unwrap();
        TrainedArtifact::new(Box::new(model), labels, ArtifactMetadata::new(0, 0, None)).unwrap()
    }

    #[test]
    fn ranks_descending_with_stable_ties() {
        let artifact = artifact(Fixed(vec![0.25, 0.5, 0.25]));
        let result = Responder::default()
            .respond(Some(&artifact), &Query::new(" asia", "JAPAN "))
            .unwrap();

        assert_eq!(result.region, "Asia");
        assert_eq!(result.country, "Japan");
        let order: Vec<&str> = result.ranked.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(order, vec!["Flood", "Drought", "Storm"]);
    }

    #[test]
    fn drop_policy_removes_zero_entries() {
        let artifact = artifact(Fixed(vec![0.0, 1.0, 0.0]));
        let query = Query::new("Asia", "Japan");

        let kept = Responder::new(ZeroProbabilityPolicy::Keep)
            .respond(Some(&artifact), &query)
            .unwrap();
        assert_eq!(kept.ranked.len(), 3);

        let dropped = Responder::new(ZeroProbabilityPolicy::Drop)
            .respond(Some(&artifact), &query)
            .unwrap();
        assert_eq!(dropped.ranked, vec![("Flood".to_string(), 1.0)]);
    }

    #[test]
    fn missing_artifact_is_unavailable() {
        let err = Responder::default()
            .respond(None, &Query::new("Asia", "Japan"))
            .unwrap_err();
        assert_eq!(err, PredictError::ModelUnavailable);
    }

    #[test]
    fn shape_mismatch_and_panics_become_failures() {
        let short = artifact(Fixed(vec![1.0]));
        let err = Responder::default()
            .respond(Some(&short), &Query::new("Asia", "Japan"))
            .unwrap_err();
        assert!(matches!(err, PredictError::PredictionFailed(d) if d.contains("1 probabilities")));

        let panicking = artifact(Panics);
        let err = Responder::default()
            .respond(Some(&panicking), &Query::new("Asia", "Japan"))
            .unwrap_err();
        assert_eq!(err, PredictError::PredictionFailed("bad input shape".into()));
    }

    #[test]
    fn rank_rejects_nan() {
        let labels = vec!["A".to_string()];
        assert!(rank(&labels, &[f64::NAN]).is_err());
    }

    #[test]
    fn converts_to_wire_response() {
        let result = PredictionResult {
            region: "Asia".into(),
            country: "Japan".into(),
            ranked: vec![("Flood".into(), 0.75), ("Storm".into(), 0.25)],
        };
        let response = PredictionResponse::from(result);
        assert_eq!(response.status, "ok");
        assert_eq!(response.predictions[0].disaster_type, "Flood");
        assert_eq!(response.predictions[1].probability, 0.25);
    }
}
