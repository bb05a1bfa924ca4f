use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EncoderError {
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
    #[error("Class index {index} out of range for {len} classes")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Label encoder has no classes")]
    Empty,
}

/// Bidirectional mapping between disaster-type names and class indices.
///
/// Classes are kept sorted, so index order is also alphabetical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<'a, I>(labels: I) -> Result<Self, EncoderError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(str::to_string).collect();
        classes.sort();
        classes.dedup();
        if classes.is_empty() {
            return Err(EncoderError::Empty);
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn encode(&self, label: &str) -> Result<usize, EncoderError> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| EncoderError::UnknownLabel(label.to_string()))
    }

    pub fn decode(&self, index: usize) -> Result<&str, EncoderError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(EncoderError::IndexOutOfRange {
                index,
                len: self.classes.len(),
            })
    }

    /// Loaded encoders must still be sorted and duplicate-free.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.classes.is_empty() && self.classes.windows(2).all(|w| w[0] < w[1])
    }
}

/// One-hot layout for categorical feature columns.
///
/// Every (feature, category) pair owns one column. A sample is represented
/// by the set of its active columns; a category not seen at fit time has no
/// column and contributes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    features: Vec<FeatureCategories>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FeatureCategories {
    name: String,
    offset: usize,
    categories: Vec<String>,
}

impl OneHotEncoder {
    /// `rows` holds one value per feature, in the same order as `feature_names`.
    pub fn fit(feature_names: &[&str], rows: &[Vec<String>]) -> Self {
        let mut features = Vec::with_capacity(feature_names.len());
        let mut offset = 0;

        for (i, name) in feature_names.iter().enumerate() {
            let mut categories: Vec<String> = rows.iter().filter_map(|r| r.get(i).cloned()).collect();
            categories.sort();
            categories.dedup();
            let width = categories.len();
            features.push(FeatureCategories {
                name: name.to_string(),
                offset,
                categories,
            });
            offset += width;
        }

        Self { features }
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn n_columns(&self) -> usize {
        self.features.iter().map(|f| f.categories.len()).sum()
    }

    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Active column indices for one sample. Unknown values are skipped.
    pub fn transform(&self, values: &[&str]) -> Vec<usize> {
        self.features
            .iter()
            .zip(values)
            .filter_map(|(feature, value)| {
                feature
                    .categories
                    .binary_search_by(|c| c.as_str().cmp(value))
                    .ok()
                    .map(|pos| feature.offset + pos)
            })
            .collect()
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        let mut expected_offset = 0;
        for feature in &self.features {
            if feature.offset != expected_offset
                || !feature.categories.windows(2).all(|w| w[0] < w[1])
            {
                return false;
            }
            expected_offset += feature.categories.len();
        }
        true
    }
}
