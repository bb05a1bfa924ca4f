//! Persisted model artifacts.
//!
//! Every artifact file is a JSON envelope around its payload:
//!
//! ```text
//! {"kind": "label_encoder", "format_version": 1, "sha256": "<hex>", "payload": {...}}
//! ```
//!
//! The checksum covers the exact payload bytes, so a truncated or edited
//! file is reported as corrupt instead of loading as a different model.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use shared::ModelInfoResponse;
use uuid::Uuid;

use super::encoder::LabelEncoder;
use super::pipeline::{ClassifierPipeline, ProbabilityModel};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Artifact {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("Failed to write artifact {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ArtifactError {
    fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// A value that can be stored as an artifact file.
pub trait Persisted: Serialize + DeserializeOwned {
    const KIND: &'static str;

    /// Structural checks run after a successful deserialize.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    kind: &'a str,
    format_version: u32,
    sha256: String,
    payload: &'a RawValue,
}

#[derive(Deserialize)]
struct Envelope {
    kind: String,
    format_version: u32,
    sha256: String,
    payload: Box<RawValue>,
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

pub fn write_artifact<T: Persisted>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let payload = RawValue::from_string(serde_json::to_string(value)?)?;
    let envelope = EnvelopeRef {
        kind: T::KIND,
        format_version: FORMAT_VERSION,
        sha256: checksum(payload.get().as_bytes()),
        payload: &payload,
    };
    let bytes = serde_json::to_vec(&envelope)?;

    let write_err = |source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    // Readers never observe a half-written file.
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(write_err)?;
    fs::rename(&tmp, path).map_err(write_err)?;

    log::info!("Wrote {} artifact to {}", T::KIND, path.display());
    Ok(())
}

pub fn read_artifact<T: Persisted>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ArtifactError::NotFound(path.to_path_buf()),
        _ => ArtifactError::corrupt(path, format!("unreadable: {e}")),
    })?;

    let envelope: Envelope = serde_json::from_slice(&bytes)
        .map_err(|e| ArtifactError::corrupt(path, format!("not an artifact envelope: {e}")))?;

    if envelope.kind != T::KIND {
        return Err(ArtifactError::corrupt(
            path,
            format!("expected a {} artifact, found {}", T::KIND, envelope.kind),
        ));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(ArtifactError::corrupt(
            path,
            format!("unsupported format version {}", envelope.format_version),
        ));
    }
    let actual = checksum(envelope.payload.get().as_bytes());
    if actual != envelope.sha256 {
        return Err(ArtifactError::corrupt(
            path,
            format!("checksum mismatch (expected {}, got {actual})", envelope.sha256),
        ));
    }

    let value: T = serde_json::from_str(envelope.payload.get())
        .map_err(|e| ArtifactError::corrupt(path, format!("payload does not match {}: {e}", T::KIND)))?;
    value
        .validate()
        .map_err(|reason| ArtifactError::corrupt(path, reason))?;
    Ok(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub encoder: PathBuf,
    pub catalog: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(Path::new("artifacts"))
    }
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            model: dir.join("disaster_model.json"),
            encoder: dir.join("label_encoder.json"),
            catalog: dir.join("region_catalog.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub id: Uuid,
    pub trained_at: DateTime<Utc>,
    pub n_train: usize,
    pub n_test: usize,
    pub accuracy: Option<f64>,
}

impl ArtifactMetadata {
    pub fn new(n_train: usize, n_test: usize, accuracy: Option<f64>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trained_at: Utc::now(),
            n_train,
            n_test,
            accuracy,
        }
    }
}

/// Classifier artifact as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredClassifier {
    pub metadata: ArtifactMetadata,
    pub pipeline: ClassifierPipeline,
}

impl Persisted for StoredClassifier {
    const KIND: &'static str = "classifier_pipeline";

    fn validate(&self) -> Result<(), String> {
        self.pipeline.validate().map_err(|e| e.to_string())
    }
}

impl Persisted for LabelEncoder {
    const KIND: &'static str = "label_encoder";

    fn validate(&self) -> Result<(), String> {
        if self.is_well_formed() {
            Ok(())
        } else {
            Err("classes must be non-empty, sorted and distinct".into())
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("classifier was fitted on {classifier} classes but the label encoder has {labels}")]
pub struct LabelMismatch {
    pub classifier: usize,
    pub labels: usize,
}

/// A loaded classifier together with the labels it was fitted against.
#[derive(Debug)]
pub struct TrainedArtifact {
    classifier: Box<dyn ProbabilityModel>,
    labels: LabelEncoder,
    metadata: ArtifactMetadata,
}

impl TrainedArtifact {
    pub fn new(
        classifier: Box<dyn ProbabilityModel>,
        labels: LabelEncoder,
        metadata: ArtifactMetadata,
    ) -> Result<Self, LabelMismatch> {
        if classifier.n_classes() != labels.len() {
            return Err(LabelMismatch {
                classifier: classifier.n_classes(),
                labels: labels.len(),
            });
        }
        Ok(Self {
            classifier,
            labels,
            metadata,
        })
    }

    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        log::info!(
            "Loading model from {} and labels from {}",
            paths.model.display(),
            paths.encoder.display()
        );
        let stored: StoredClassifier = read_artifact(&paths.model)?;
        let labels: LabelEncoder = read_artifact(&paths.encoder)?;
        Self::new(Box::new(stored.pipeline), labels, stored.metadata)
            .map_err(|e| ArtifactError::corrupt(&paths.encoder, e.to_string()))
    }

    pub fn classifier(&self) -> &dyn ProbabilityModel {
        self.classifier.as_ref()
    }

    pub fn label_set(&self) -> &[String] {
        self.labels.classes()
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    pub fn model_info(&self) -> ModelInfoResponse {
        ModelInfoResponse {
            model_type: self.classifier.model_type(),
            disaster_types: self.labels.classes().to_vec(),
            num_disaster_types: self.labels.len(),
            features: self.classifier.feature_names(),
            artifact_id: self.metadata.id,
            trained_at: self.metadata.trained_at,
        }
    }
}

/// Write the classifier and label encoder to their configured paths.
pub fn save_model(
    paths: &ArtifactPaths,
    stored: &StoredClassifier,
    labels: &LabelEncoder,
) -> Result<(), ArtifactError> {
    write_artifact(&paths.model, stored)?;
    write_artifact(&paths.encoder, labels)
}
