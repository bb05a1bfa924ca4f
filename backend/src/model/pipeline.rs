use serde::{Deserialize, Serialize};

use super::encoder::OneHotEncoder;
use super::forest::RandomForest;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// The one capability the prediction path needs from a classifier.
///
/// The returned vector is positionally aligned with the label set the
/// classifier was fitted against.
pub trait ProbabilityModel: std::fmt::Debug + Send + Sync {
    fn predict_probabilities(&self, region: &str, country: &str) -> Result<Vec<f64>, ModelError>;

    fn n_classes(&self) -> usize;

    fn model_type(&self) -> String;

    fn feature_names(&self) -> Vec<String>;
}

/// One-hot preprocessing followed by a random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierPipeline {
    encoder: OneHotEncoder,
    forest: RandomForest,
}

impl ClassifierPipeline {
    pub fn new(encoder: OneHotEncoder, forest: RandomForest) -> Result<Self, ModelError> {
        let pipeline = Self { encoder, forest };
        pipeline.validate()?;
        Ok(pipeline)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.encoder.is_well_formed() {
            return Err(ModelError("one-hot encoder categories are not sorted".into()));
        }
        if self.encoder.n_columns() != self.forest.n_columns() {
            return Err(ModelError(format!(
                "encoder produces {} columns but the forest expects {}",
                self.encoder.n_columns(),
                self.forest.n_columns()
            )));
        }
        self.forest
            .validate()
            .map_err(|e| ModelError(e.to_string()))
    }

    /// Probabilities for one row of raw feature values.
    ///
    /// A row where no value matches a known category carries no information
    /// at all and gets zero for every class.
    pub fn predict_row(&self, values: &[&str]) -> Vec<f64> {
        let active = self.encoder.transform(values);
        if active.is_empty() {
            return vec![0.0; self.forest.n_classes()];
        }
        self.forest.predict_proba(&active)
    }

    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }
}

impl ProbabilityModel for ClassifierPipeline {
    fn predict_probabilities(&self, region: &str, country: &str) -> Result<Vec<f64>, ModelError> {
        if self.encoder.n_features() != 2 {
            return Err(ModelError(format!(
                "pipeline expects {} features, got region and country",
                self.encoder.n_features()
            )));
        }
        Ok(self.predict_row(&[region, country]))
    }

    fn n_classes(&self) -> usize {
        self.forest.n_classes()
    }

    fn model_type(&self) -> String {
        format!(
            "Pipeline(OneHotEncoder({} columns), RandomForestClassifier(n_estimators={}))",
            self.encoder.n_columns(),
            self.forest.n_trees()
        )
    }

    fn feature_names(&self) -> Vec<String> {
        self.encoder
            .feature_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::forest::ForestParams;

    fn rows() -> Vec<Vec<String>> {
        [
            ("Asia", "Japan"),
            ("Asia", "Japan"),
            ("Asia", "India"),
            ("Europe", "Italy"),
            ("Europe", "Italy"),
        ]
        .iter()
        .map(|(r, c)| vec![r.to_string(), c.to_string()])
        .collect()
    }

    fn fitted() -> ClassifierPipeline {
        let rows = rows();
        let encoder = OneHotEncoder::fit(&["Region", "Country"], &rows);
        let samples: Vec<Vec<usize>> = rows
            .iter()
            .map(|r| encoder.transform(&[r[0].as_str(), r[1].as_str()]))
            .collect();
        let targets = vec![0, 0, 1, 1, 1];
        let params = ForestParams {
            n_trees: 8,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&samples, &targets, encoder.n_columns(), 2, params).unwrap();
        ClassifierPipeline::new(encoder, forest).unwrap()
    }

    #[test]
    fn known_row_sums_to_one() {
        let pipeline = fitted();
        let p = pipeline.predict_probabilities("Europe", "Italy").unwrap();
        assert_eq!(p.len(), 2);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unseen_row_is_all_zero() {
        let pipeline = fitted();
        let p = pipeline.predict_probabilities("Mars", "Olympus").unwrap();
        assert_eq!(p, vec![0.0, 0.0]);
    }

    #[test]
    fn describes_itself() {
        let pipeline = fitted();
        assert_eq!(pipeline.feature_names(), vec!["Region", "Country"]);
        assert!(pipeline.model_type().contains("n_estimators=8"));
    }

    #[test]
    fn rejects_mismatched_parts() {
        let pipeline = fitted();
        let smaller = OneHotEncoder::fit(&["Region", "Country"], &rows()[..1]);
        let err = ClassifierPipeline::new(smaller, pipeline.forest().clone()).unwrap_err();
        assert!(err.0.contains("columns"));
    }
}
