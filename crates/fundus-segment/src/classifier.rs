use std::{cell::OnceCell, collections::BTreeMap, ops::Deref, path::Path};

use fundus_image::Image;
use fundus_imgproc::draw::fill_where;
use fundus_io::functional::read_image_any_rgb8;

use crate::{
    annotation::{read_annotations, AnnotationSet},
    config::ClassifierConfig,
    error::SegmentError,
    knn::KNeighborsClassifier,
    labels::ClassLabels,
    masked::{read_mask, MaskRescale, MaskedImage},
    prototype::{PrototypeBuilder, PrototypeSet},
};

/// Per-pixel labels of a classified image.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentationMap(Image<i32, 1>);

impl SegmentationMap {
    /// Wrap a label image.
    pub fn new(labels: Image<i32, 1>) -> Self {
        Self(labels)
    }

    /// Label of the pixel at `row`, `col`.
    pub fn label_at(&self, row: usize, col: usize) -> Option<i32> {
        self.0.get([row, col, 0]).copied()
    }

    /// Number of pixels carrying `label`.
    pub fn count(&self, label: i32) -> usize {
        self.0.as_slice().iter().filter(|&&l| l == label).count()
    }

    /// Number of pixels per label, for every label present.
    pub fn counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for &label in self.0.as_slice() {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Copy of `image` with every pixel of `label` painted in `color`.
    pub fn overlay(
        &self,
        image: &Image<u8, 3>,
        label: i32,
        color: [u8; 3],
    ) -> Result<Image<u8, 3>, SegmentError> {
        let mut out = image.clone();
        fill_where(&mut out, &self.0, |&l| l == label, color)?;
        Ok(out)
    }

    /// The underlying label image.
    pub fn into_image(self) -> Image<i32, 1> {
        self.0
    }
}

impl Deref for SegmentationMap {
    type Target = Image<i32, 1>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Segments fundus photographs by assigning every pixel the label voted by
/// its nearest class prototypes in color space.
///
/// The annotations are parsed when the classifier is created. The
/// prototypes are computed from the training images on first use and kept
/// for the lifetime of the classifier. The cache is not synchronized, so a
/// classifier cannot be shared between threads.
///
/// # Example
///
/// ```no_run
/// use fundus_segment::{ClassifierConfig, RegionClassifier};
///
/// let config = ClassifierConfig::new("data/train", "data/annotations.txt", "data/masks")
///     .with_labels([(0, 0), (1, 0), (2, 1), (3, 1)]);
///
/// let classifier = RegionClassifier::new(config).unwrap();
/// let map = classifier.classify("data/test/01_test.jpg").unwrap();
/// println!("drusen pixels: {}", map.count(0));
/// ```
#[derive(Debug)]
pub struct RegionClassifier {
    config: ClassifierConfig,
    annotations: AnnotationSet,
    labels: ClassLabels,
    prototypes: OnceCell<PrototypeSet>,
}

impl RegionClassifier {
    /// Parse the annotation file of `config` and validate its class labels.
    pub fn new(config: ClassifierConfig) -> Result<Self, SegmentError> {
        let annotations = read_annotations(&config.annotations)?;
        Self::from_annotations(config, annotations)
    }

    /// Create a classifier from already parsed annotations.
    ///
    /// The training images are still read from `config.root`.
    pub fn from_annotations(
        config: ClassifierConfig,
        annotations: AnnotationSet,
    ) -> Result<Self, SegmentError> {
        let labels = config.class_labels(annotations.object_count())?;

        Ok(Self {
            config,
            annotations,
            labels,
            prototypes: OnceCell::new(),
        })
    }

    /// The configuration.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// The parsed annotations.
    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    /// The validated class labels.
    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }

    /// The prototypes, built from the training images on the first call.
    pub fn prototypes(&self) -> Result<&PrototypeSet, SegmentError> {
        if let Some(prototypes) = self.prototypes.get() {
            return Ok(prototypes);
        }

        let prototypes = PrototypeBuilder::new(&self.annotations, &self.labels)
            .build_from_dir(&self.config.root)?;

        Ok(self.prototypes.get_or_init(|| prototypes))
    }

    /// Read an image and its mask from the masks directory, then classify it.
    pub fn classify(&self, image_path: impl AsRef<Path>) -> Result<SegmentationMap, SegmentError> {
        let path = image_path.as_ref();
        let image = read_image_any_rgb8(path).map_err(|source| SegmentError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        let mask = read_mask(&self.config.masks_dir, path)?;

        let map = self.classify_image(image, mask)?;
        log::info!("classified {}", path.display());

        Ok(map)
    }

    /// Mask and classify an already decoded image.
    ///
    /// # Errors
    ///
    /// Fails with [`SegmentError::ShapeMismatch`] if the image and the mask
    /// have a different number of rows. A mask differing only in columns is
    /// rescaled to the image width.
    pub fn classify_image(
        &self,
        image: Image<u8, 3>,
        mask: Image<u8, 1>,
    ) -> Result<SegmentationMap, SegmentError> {
        let masked = MaskedImage::new(image, mask, MaskRescale::ColumnsOnly)?;
        self.classify_masked(&masked)
    }

    /// Classify every pixel of a masked image.
    pub fn classify_masked(&self, masked: &MaskedImage<3>) -> Result<SegmentationMap, SegmentError> {
        let knn = self.fit()?;
        let labels = knn.predict_image(masked.image())?;

        log::debug!(
            "predicted {} pixels with {} neighbours",
            labels.size().area(),
            knn.n_neighbors()
        );

        Ok(SegmentationMap(labels))
    }

    fn fit(&self) -> Result<KNeighborsClassifier<3>, SegmentError> {
        let prototypes = self.prototypes()?;

        let samples = prototypes
            .colors()
            .into_iter()
            .map(|c| c.map(f32::from))
            .collect();

        let mut knn = KNeighborsClassifier::new(self.config.n_neighbors);
        knn.fit(samples, prototypes.labels())?;
        Ok(knn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::parse_annotations;
    use fundus_imgproc::draw::draw_filled_rect;
    use fundus_io::png::write_image_png_rgb8;

    const YELLOW: [u8; 3] = [230, 210, 60];
    const RED: [u8; 3] = [150, 40, 20];

    #[test]
    fn segmentation_map_queries() -> Result<(), SegmentError> {
        let map = SegmentationMap::new(Image::new([3, 2].into(), vec![0, 1, 1, -1, 1, 0])?);

        assert_eq!(map.label_at(0, 1), Some(1));
        assert_eq!(map.label_at(1, 0), Some(-1));
        assert_eq!(map.label_at(2, 0), None);
        assert_eq!(map.count(1), 3);
        assert_eq!(map.count(7), 0);
        assert_eq!(map.counts(), BTreeMap::from([(-1, 1), (0, 2), (1, 3)]));
        assert_eq!(map.rows(), 2);
        Ok(())
    }

    #[test]
    fn overlay_paints_one_label() -> Result<(), SegmentError> {
        let map = SegmentationMap::new(Image::new([2, 1].into(), vec![0, 1])?);
        let image = Image::<u8, 3>::from_size_val([2, 1].into(), 50)?;

        let overlay = map.overlay(&image, 1, [255, 0, 0])?;
        assert_eq!(overlay.as_slice(), &[50, 50, 50, 255, 0, 0]);
        Ok(())
    }

    #[test]
    fn prototypes_are_cached() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_dir = tempfile::tempdir()?;

        let mut image = Image::<u8, 3>::from_size_pixel([8, 4].into(), RED)?;
        draw_filled_rect(&mut image, 0, 0, 4, 4, YELLOW);
        write_image_png_rgb8(tmp_dir.path().join("train.png"), &image)?;

        let annotations = parse_annotations("train.png 2 0 0 4 4 4 0 4 4".as_bytes(), "inline")?;
        let config = ClassifierConfig::new(tmp_dir.path(), "unused.txt", tmp_dir.path());
        let classifier = RegionClassifier::from_annotations(config, annotations)?;

        let first = classifier.prototypes()?.clone();
        assert_eq!(first.colors(), vec![YELLOW, RED, [0, 0, 0]]);

        // the training image is not read again
        std::fs::remove_file(tmp_dir.path().join("train.png"))?;
        assert_eq!(classifier.prototypes()?, &first);
        Ok(())
    }

    #[test]
    fn invalid_labels_fail_at_construction() -> Result<(), SegmentError> {
        let annotations = parse_annotations("a.png 2 0 0 4 4 4 0 4 4".as_bytes(), "inline")?;
        let config = ClassifierConfig::new("train", "unused.txt", "masks").with_labels([(0, 0)]);

        let res = RegionClassifier::from_annotations(config, annotations);
        assert!(matches!(res, Err(SegmentError::MissingClassLabel(1))));
        Ok(())
    }
}
