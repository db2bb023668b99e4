#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Annotation file parsing into per-class rectangles.
pub mod annotation;

/// Prototype-based pixel classification of fundus photographs.
pub mod classifier;

/// Classifier configuration, loadable from JSON.
pub mod config;

/// Error types for the segmentation module.
pub mod error;

/// k-nearest-neighbour classification in color space.
pub mod knn;

/// Class index to label mapping.
pub mod labels;

/// Reading images together with their region-of-interest masks.
pub mod masked;

/// Per-class average color prototypes.
pub mod prototype;

pub use crate::annotation::{read_annotations, AnnotationSet, Rectangle};
pub use crate::classifier::{RegionClassifier, SegmentationMap};
pub use crate::config::ClassifierConfig;
pub use crate::error::SegmentError;
pub use crate::labels::{ClassLabels, BACKGROUND_LABEL};
pub use crate::masked::MaskedImage;
pub use crate::prototype::{Prototype, PrototypeBuilder, PrototypeSet};
