pub mod dataset;
pub mod split;
pub mod trainer;

pub use dataset::{CleanedDataset, DatasetError, DisasterRecord, read_records, read_records_from_path};
pub use split::{TrainTestSplit, train_test_split};
pub use trainer::{TrainingConfig, TrainingError, TrainingOutcome, TrainingReport, train};
