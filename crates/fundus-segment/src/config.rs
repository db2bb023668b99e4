use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{error::SegmentError, labels::ClassLabels};

/// Default number of neighbours voting on a pixel label.
pub const DEFAULT_N_NEIGHBORS: usize = 3;

/// Default side length of the prototype swatches.
pub const DEFAULT_SWATCH_SIZE: usize = 20;

fn default_n_neighbors() -> usize {
    DEFAULT_N_NEIGHBORS
}

fn default_swatch_size() -> usize {
    DEFAULT_SWATCH_SIZE
}

/// Configuration of a [`RegionClassifier`](crate::classifier::RegionClassifier).
///
/// Can be read from JSON, e.g.
///
/// ```json
/// {
///     "root": "data/train",
///     "annotations": "data/annotations.txt",
///     "masks_dir": "data/masks",
///     "labels": { "0": 0, "1": 0, "2": 1, "3": 1 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Directory holding the annotated training images.
    pub root: PathBuf,
    /// Annotation file.
    pub annotations: PathBuf,
    /// Directory holding the `<stem>.png` masks of the images to classify.
    pub masks_dir: PathBuf,
    /// Class index to label map. Empty means every class keeps its index as label.
    #[serde(default)]
    pub labels: BTreeMap<usize, i32>,
    /// Number of neighbours voting on a pixel label.
    #[serde(default = "default_n_neighbors")]
    pub n_neighbors: usize,
    /// Side length of the prototype swatches.
    #[serde(default = "default_swatch_size")]
    pub swatch_size: usize,
}

impl ClassifierConfig {
    /// Create a configuration with default labels and parameters.
    pub fn new(
        root: impl Into<PathBuf>,
        annotations: impl Into<PathBuf>,
        masks_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            annotations: annotations.into(),
            masks_dir: masks_dir.into(),
            labels: BTreeMap::new(),
            n_neighbors: DEFAULT_N_NEIGHBORS,
            swatch_size: DEFAULT_SWATCH_SIZE,
        }
    }

    /// Replace the class label map.
    pub fn with_labels(mut self, labels: impl IntoIterator<Item = (usize, i32)>) -> Self {
        self.labels = labels.into_iter().collect();
        self
    }

    /// Read a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SegmentError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration from a JSON string.
    pub fn from_json_str(text: &str) -> Result<Self, SegmentError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The validated class labels for annotations with `object_count` classes.
    pub fn class_labels(&self, object_count: usize) -> Result<ClassLabels, SegmentError> {
        let labels = if self.labels.is_empty() {
            ClassLabels::identity(object_count)
        } else {
            ClassLabels::new(self.labels.clone())
        };

        labels.validate(object_count)?;
        Ok(labels)
    }
}
