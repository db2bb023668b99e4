use std::path::PathBuf;

use fundus_image::ImageError;
use fundus_io::IoError;

/// Errors raised while parsing annotations, building prototypes or classifying images.
#[derive(thiserror::Error, Debug)]
pub enum SegmentError {
    /// A line of the annotation file could not be parsed.
    #[error("{source_name}:{line}: {message}")]
    Parse {
        /// Name of the annotation source, usually its path.
        source_name: String,
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A record declares a different object count than the first record.
    #[error("{source_name}:{line}: expected {expected} objects per image, found {found}")]
    InconsistentObjectCount {
        /// Name of the annotation source, usually its path.
        source_name: String,
        /// 1-based line number.
        line: usize,
        /// Object count declared by the first record.
        expected: usize,
        /// Object count declared by the offending record.
        found: usize,
    },

    /// An image could not be read or decoded.
    #[error("failed to load image {}: {source}", .path.display())]
    ImageLoad {
        /// Path of the image.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: IoError,
    },

    /// A mask could not be read or decoded.
    #[error("failed to load mask {}: {source}", .path.display())]
    MaskLoad {
        /// Path of the mask.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: IoError,
    },

    /// There are no annotated images to average over.
    #[error("the annotation set contains no images")]
    EmptyDataset,

    /// The number of images supplied does not match the annotation records.
    #[error("expected {expected} images, got {found}")]
    ImageCountMismatch {
        /// Number of annotation records.
        expected: usize,
        /// Number of images supplied.
        found: usize,
    },

    /// The mask and the image do not have the same number of rows.
    #[error("rows don't match between mask ({mask_rows}) and image ({image_rows})")]
    ShapeMismatch {
        /// Rows of the image.
        image_rows: usize,
        /// Rows of the mask.
        mask_rows: usize,
    },

    /// A class index has no label assigned.
    #[error("no label assigned to class {0}")]
    MissingClassLabel(usize),

    /// A label is assigned to a class the annotations do not define.
    #[error("label assigned to class {index} but the annotations define {object_count} classes")]
    UnknownClassIndex {
        /// The class index.
        index: usize,
        /// Number of classes in the annotations.
        object_count: usize,
    },

    /// A class uses the label reserved for the background.
    #[error("class {index} uses the reserved background label {label}")]
    ReservedLabel {
        /// The class index.
        index: usize,
        /// The reserved label.
        label: i32,
    },

    /// The classifier needs more training samples than it was given.
    #[error("cannot use {k} neighbors with {samples} training samples")]
    NotEnoughSamples {
        /// Requested number of neighbours.
        k: usize,
        /// Number of training samples.
        samples: usize,
    },

    /// The number of training samples and labels differ.
    #[error("got {samples} training samples but {labels} labels")]
    SampleLabelMismatch {
        /// Number of training samples.
        samples: usize,
        /// Number of labels.
        labels: usize,
    },

    /// A class region has zero rows or columns.
    #[error("class {class_index} has an empty region in {image}")]
    EmptyRegion {
        /// The class index.
        class_index: usize,
        /// The image the region belongs to.
        image: String,
    },

    /// A class region does not fit inside its image.
    #[error("region {rect:?} of class {class_index} lies outside image {image} ({width}x{height})")]
    RegionOutOfBounds {
        /// The class index.
        class_index: usize,
        /// The image the region belongs to.
        image: String,
        /// The offending rectangle.
        rect: crate::annotation::Rectangle,
        /// Width of the image.
        width: usize,
        /// Height of the image.
        height: usize,
    },

    /// The configuration could not be read.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Generic file error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic image error.
    #[error(transparent)]
    Image(#[from] ImageError),
}
