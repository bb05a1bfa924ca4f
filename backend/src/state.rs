use std::sync::Arc;

use actix_web::web;
use tokio::sync::{Mutex, RwLock};

use crate::catalog::RegionCatalog;
use crate::model::artifact::read_artifact;
use crate::model::{ArtifactError, ArtifactPaths, TrainedArtifact};
use crate::predictor::{Responder, ZeroProbabilityPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("Artifact loader failed: {0}")]
    Blocking(String),
}

/// Everything loaded from disk in one reload.
pub struct LoadedArtifacts {
    pub artifact: TrainedArtifact,
    /// `None` when the catalog could not be read; the model is still usable.
    pub catalog: Option<RegionCatalog>,
}

impl LoadedArtifacts {
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        let artifact = TrainedArtifact::load(paths)?;
        let catalog = match read_artifact::<RegionCatalog>(&paths.catalog) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                log::warn!("Region catalog unavailable: {}", e);
                None
            }
        };
        Ok(Self { artifact, catalog })
    }
}

/// What request handlers read: the model and the catalog built alongside it.
#[derive(Debug, Clone, Default)]
pub struct Published {
    pub artifact: Option<Arc<TrainedArtifact>>,
    pub catalog: Arc<RegionCatalog>,
}

/// Shared state handed to every request handler.
///
/// The model and catalog are published together under one lock; a reload
/// builds a complete replacement before swapping it in, so readers see
/// either the old pair or the new one, never a mix.
pub struct ServiceContext {
    paths: ArtifactPaths,
    responder: Responder,
    published: RwLock<Published>,
    reload_lock: Mutex<()>,
}

impl ServiceContext {
    pub fn new(paths: ArtifactPaths, policy: ZeroProbabilityPolicy) -> Self {
        Self {
            paths,
            responder: Responder::new(policy),
            published: RwLock::new(Published::default()),
            reload_lock: Mutex::new(()),
        }
    }

    /// Load artifacts from the configured paths and publish them.
    ///
    /// A missing or unreadable catalog publishes an empty one. On a model
    /// failure the previously published state stays in place.
    pub async fn reload(&self) -> Result<(Arc<TrainedArtifact>, Arc<RegionCatalog>), ReloadError> {
        let _guard = self.reload_lock.lock().await;

        let paths = self.paths.clone();
        let loaded = web::block(move || LoadedArtifacts::load(&paths))
            .await
            .map_err(|e| ReloadError::Blocking(e.to_string()))??;

        let artifact = Arc::new(loaded.artifact);
        let catalog = Arc::new(loaded.catalog.unwrap_or_default());
        *self.published.write().await = Published {
            artifact: Some(artifact.clone()),
            catalog: catalog.clone(),
        };

        log::info!(
            "Published model {} with {} disaster types and {} continents",
            artifact.metadata().id,
            artifact.label_set().len(),
            catalog.len()
        );
        Ok((artifact, catalog))
    }

    /// The model and catalog as one consistent pair.
    pub async fn published(&self) -> Published {
        self.published.read().await.clone()
    }

    pub async fn artifact(&self) -> Option<Arc<TrainedArtifact>> {
        self.published.read().await.artifact.clone()
    }

    pub async fn is_model_loaded(&self) -> bool {
        self.published.read().await.artifact.is_some()
    }

    pub async fn catalog(&self) -> Arc<RegionCatalog> {
        self.published.read().await.catalog.clone()
    }

    pub fn responder(&self) -> Responder {
        self.responder
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }
}
