pub mod artifact;
pub mod encoder;
pub mod forest;
pub mod pipeline;
pub mod tree;

pub use artifact::{
    ArtifactError, ArtifactMetadata, ArtifactPaths, StoredClassifier, TrainedArtifact,
};
pub use encoder::{LabelEncoder, OneHotEncoder};
pub use forest::{ForestParams, RandomForest};
pub use pipeline::{ClassifierPipeline, ModelError, ProbabilityModel};
