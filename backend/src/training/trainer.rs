//! End-to-end training: cleaned records in, persisted artifacts out.

use std::fmt;

use shared::FEATURE_COLUMNS;

use super::dataset::{DisasterRecord, class_distribution, filter_rare_classes};
use super::split::train_test_split;
use crate::catalog::RegionCatalog;
use crate::model::artifact::{LabelMismatch, save_model, write_artifact};
use crate::model::encoder::EncoderError;
use crate::model::forest::ForestError;
use crate::model::{
    ArtifactError, ArtifactMetadata, ArtifactPaths, ClassifierPipeline, ForestParams,
    LabelEncoder, ModelError, OneHotEncoder, RandomForest, StoredClassifier, TrainedArtifact,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub seed: u64,
    pub n_trees: usize,
    pub min_class_count: usize,
    pub min_samples_split: usize,
    pub max_depth: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.3,
            seed: 42,
            n_trees: 100,
            min_class_count: 2,
            min_samples_split: 2,
            max_depth: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("No training records")]
    NoRecords,
    #[error("No disaster type has at least {0} records")]
    NoUsableClasses(usize),
    #[error("test fraction must be between 0 and 1, got {0}")]
    InvalidTestFraction(f64),
    #[error(transparent)]
    Labels(#[from] EncoderError),
    #[error("Forest training failed: {0}")]
    Forest(#[from] ForestError),
    #[error("Invalid pipeline: {0}")]
    Pipeline(#[from] ModelError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub records: usize,
    pub distribution: Vec<(String, usize)>,
    pub dropped_classes: Vec<String>,
    pub n_classes: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub stratified: bool,
    /// `None` when the held-out split is empty.
    pub accuracy: Option<f64>,
    pub n_trees: usize,
    pub avg_depth: f64,
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Disaster type distribution:")?;
        for (name, count) in &self.distribution {
            writeln!(f, "  {name:<30} {count}")?;
        }
        if !self.dropped_classes.is_empty() {
            writeln!(f, "Dropped rare disaster types: {}", self.dropped_classes.join(", "))?;
        }
        writeln!(f, "Using {} disaster types over {} records", self.n_classes, self.records)?;
        if !self.stratified {
            writeln!(f, "Warning: split is not stratified")?;
        }
        writeln!(f, "Training: {}, Test: {}", self.n_train, self.n_test)?;
        writeln!(f, "Forest: {} trees, average depth {:.1}", self.n_trees, self.avg_depth)?;
        match self.accuracy {
            Some(acc) => write!(f, "Accuracy: {:.2}%", acc * 100.0),
            None => write!(f, "Accuracy: n/a (empty test split)"),
        }
    }
}

#[derive(Debug)]
pub struct TrainingOutcome {
    pub pipeline: ClassifierPipeline,
    pub labels: LabelEncoder,
    pub metadata: ArtifactMetadata,
    pub catalog: RegionCatalog,
    pub report: TrainingReport,
}

impl TrainingOutcome {
    /// Write the classifier, label encoder and region catalog.
    pub fn save(&self, paths: &ArtifactPaths) -> Result<(), ArtifactError> {
        let stored = StoredClassifier {
            metadata: self.metadata.clone(),
            pipeline: self.pipeline.clone(),
        };
        save_model(paths, &stored, &self.labels)?;
        write_artifact(&paths.catalog, &self.catalog)
    }

    pub fn into_artifact(self) -> Result<(TrainedArtifact, RegionCatalog), LabelMismatch> {
        let artifact = TrainedArtifact::new(Box::new(self.pipeline), self.labels, self.metadata)?;
        Ok((artifact, self.catalog))
    }
}

fn features(record: &DisasterRecord) -> [&str; 2] {
    [record.region.as_str(), record.country.as_str()]
}

/// First index of the largest value.
fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

pub fn train(records: Vec<DisasterRecord>, config: &TrainingConfig) -> Result<TrainingOutcome, TrainingError> {
    if records.is_empty() {
        return Err(TrainingError::NoRecords);
    }
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return Err(TrainingError::InvalidTestFraction(config.test_fraction));
    }

    let catalog = RegionCatalog::from_pairs(records.iter().map(|r| (r.region.as_str(), r.country.as_str())));
    let distribution = class_distribution(&records);

    let (records, dropped_classes) = filter_rare_classes(records, config.min_class_count);
    if !dropped_classes.is_empty() {
        log::warn!(
            "Dropping {} disaster types with fewer than {} records: {:?}",
            dropped_classes.len(),
            config.min_class_count,
            dropped_classes
        );
    }
    if records.is_empty() {
        return Err(TrainingError::NoUsableClasses(config.min_class_count));
    }

    let labels = LabelEncoder::fit(records.iter().map(|r| r.disaster_type.as_str()))?;
    let targets = records
        .iter()
        .map(|r| labels.encode(&r.disaster_type))
        .collect::<Result<Vec<_>, _>>()?;

    let split = train_test_split(&targets, labels.len(), config.test_fraction, config.seed, true);
    if !split.stratified {
        log::warn!("A disaster type has a single record; falling back to an unstratified split");
    }
    log::info!("Training on {} records, holding out {}", split.train.len(), split.test.len());

    let train_rows: Vec<Vec<String>> = split
        .train
        .iter()
        .map(|&i| features(&records[i]).iter().map(|v| v.to_string()).collect())
        .collect();
    let encoder = OneHotEncoder::fit(&FEATURE_COLUMNS, &train_rows);
    let samples: Vec<Vec<usize>> = split
        .train
        .iter()
        .map(|&i| encoder.transform(&features(&records[i])))
        .collect();
    let train_targets: Vec<usize> = split.train.iter().map(|&i| targets[i]).collect();

    let params = ForestParams {
        n_trees: config.n_trees,
        seed: config.seed,
        min_samples_split: config.min_samples_split,
        max_depth: config.max_depth,
    };
    let forest = RandomForest::fit(&samples, &train_targets, encoder.n_columns(), labels.len(), params)?;
    let pipeline = ClassifierPipeline::new(encoder, forest)?;

    let accuracy = if split.test.is_empty() {
        None
    } else {
        let correct = split
            .test
            .iter()
            .filter(|&&i| argmax(&pipeline.predict_row(&features(&records[i]))) == Some(targets[i]))
            .count();
        Some(correct as f64 / split.test.len() as f64)
    };

    let report = TrainingReport {
        records: records.len(),
        distribution,
        dropped_classes,
        n_classes: labels.len(),
        n_train: split.train.len(),
        n_test: split.test.len(),
        stratified: split.stratified,
        accuracy,
        n_trees: pipeline.forest().n_trees(),
        avg_depth: pipeline.forest().avg_depth(),
    };
    let metadata = ArtifactMetadata::new(report.n_train, report.n_test, accuracy);
    log::info!("Training complete, model id {}", metadata.id);

    Ok(TrainingOutcome {
        pipeline,
        labels,
        metadata,
        catalog,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProbabilityModel;

    fn records() -> Vec<DisasterRecord> {
        let mut records = Vec::new();
        for _ in 0..6 {
            records.push(DisasterRecord::new("Asia", "Japan", "Earthquake"));
            records.push(DisasterRecord::new("Asia", "Philippines", "Storm"));
            records.push(DisasterRecord::new("Europe", "Italy", "Flood"));
        }
        records.push(DisasterRecord::new("Oceania", "Tonga", "Volcanic Activity"));
        records
    }

    fn small() -> TrainingConfig {
        TrainingConfig {
            n_trees: 10,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn trains_on_separable_data() {
        let outcome = train(records(), &small()).unwrap();
        let report = &outcome.report;

        assert_eq!(report.dropped_classes, vec!["Volcanic Activity"]);
        assert_eq!(outcome.labels.classes(), &["Earthquake", "Flood", "Storm"]);
        assert!(report.stratified);
        assert_eq!(report.n_train + report.n_test, 18);
        assert_eq!(report.accuracy, Some(1.0));

        let p = outcome.pipeline.predict_probabilities("Europe", "Italy").unwrap();
        assert_eq!(argmax(&p), Some(1));
    }

    #[test]
    fn catalog_includes_rare_class_rows() {
        let outcome = train(records(), &small()).unwrap();
        assert!(outcome.catalog.contains("Oceania", "Tonga"));
        assert_eq!(outcome.catalog.total_countries(), 4);
    }

    #[test]
    fn same_seed_same_model() {
        let a = train(records(), &small()).unwrap();
        let b = train(records(), &small()).unwrap();
        assert_eq!(a.pipeline, b.pipeline);
    }

    #[test]
    fn only_rare_classes_is_an_error() {
        let records = vec![
            DisasterRecord::new("Asia", "Japan", "Earthquake"),
            DisasterRecord::new("Europe", "Italy", "Flood"),
        ];
        let err = train(records, &small()).unwrap_err();
        assert!(matches!(err, TrainingError::NoUsableClasses(2)));
    }

    #[test]
    fn saved_outcome_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let outcome = train(records(), &small()).unwrap();
        outcome.save(&paths).unwrap();

        let loaded = TrainedArtifact::load(&paths).unwrap();
        assert_eq!(loaded.label_set(), outcome.labels.classes());
        assert_eq!(
            loaded.classifier().predict_probabilities("Asia", "Japan").unwrap(),
            outcome.pipeline.predict_row(&["Asia", "Japan"])
        );
    }

    #[test]
    fn argmax_takes_first_maximum() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn report_renders_accuracy() {
        let outcome = train(records(), &small()).unwrap();
        let text = outcome.report.to_string();
        assert!(text.contains("Accuracy: 100.00%"));
        assert!(text.contains("Dropped rare disaster types: Volcanic Activity"));
    }
}
