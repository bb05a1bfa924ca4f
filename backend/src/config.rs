use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::ArtifactPaths;
use crate::predictor::ZeroProbabilityPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/service.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid YAML in config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub artifacts: ArtifactPaths,
    pub predictions: PredictionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub zero_probabilities: ZeroProbabilityPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            workers: None,
        }
    }
}

impl ServiceConfig {
    /// File named by `SERVICE_CONFIG` (or the default path), then the
    /// process environment on top.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var("SERVICE_CONFIG").ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let mut config = if explicit.is_none() && !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            Self::default()
        } else {
            Self::from_file(&path)?
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&config_str)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: port.clone(),
            })?;
        }
        if let Some(model) = lookup("MODEL_PATH") {
            self.artifacts.model = model.into();
        }
        if let Some(encoder) = lookup("ENCODER_PATH") {
            self.artifacts.encoder = encoder.into();
        }
        if let Some(catalog) = lookup("CATALOG_PATH") {
            self.artifacts.catalog = catalog.into();
        }
        if let Some(flag) = lookup("DROP_ZERO_PROBABILITIES") {
            self.predictions.zero_probabilities = match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => ZeroProbabilityPolicy::Drop,
                "0" | "false" | "no" => ZeroProbabilityPolicy::Keep,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "DROP_ZERO_PROBABILITIES",
                        value: flag,
                    });
                }
            };
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
