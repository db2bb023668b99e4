use std::path::Path;

use fundus_image::{Image, ImageError, ImageSize};
use fundus_imgproc::{
    core::channel_mean,
    crop::crop_region,
    resize::{resize_fast, InterpolationMode},
};
use fundus_io::functional::read_image_any_rgb8;
use serde::{Deserialize, Serialize};

use crate::{
    annotation::{AnnotationSet, Rectangle},
    error::SegmentError,
    labels::{ClassLabels, BACKGROUND_LABEL},
};

/// A representative color standing in for a semantic class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prototype {
    /// Classifier label of the class.
    pub label: i32,
    /// Mean color, in the channel order of the decoded images.
    pub color: [u8; 3],
}

impl Prototype {
    /// The synthetic black prototype matching masked-out pixels.
    pub fn background() -> Self {
        Self {
            label: BACKGROUND_LABEL,
            color: [0, 0, 0],
        }
    }
}

/// Class prototypes in class index order, followed by the background prototype.
///
/// Deserialization rejects a list that does not end with [`Prototype::background`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPrototypeSet")]
pub struct PrototypeSet {
    prototypes: Vec<Prototype>,
}

#[derive(Deserialize)]
struct RawPrototypeSet {
    prototypes: Vec<Prototype>,
}

impl TryFrom<RawPrototypeSet> for PrototypeSet {
    type Error = String;

    fn try_from(raw: RawPrototypeSet) -> Result<Self, Self::Error> {
        match raw.prototypes.last() {
            Some(last) if *last == Prototype::background() => Ok(Self {
                prototypes: raw.prototypes,
            }),
            _ => Err("the last prototype must be the black background".to_string()),
        }
    }
}

impl PrototypeSet {
    /// Create a set from the class prototypes; the background prototype is appended.
    pub fn new(class_prototypes: Vec<Prototype>) -> Self {
        let mut prototypes = class_prototypes;
        prototypes.push(Prototype::background());
        Self { prototypes }
    }

    /// Number of prototypes, background included.
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Never true for a set built by [`PrototypeSet::new`] or deserialized.
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// All prototypes, background last.
    pub fn as_slice(&self) -> &[Prototype] {
        &self.prototypes
    }

    /// Prototypes of the annotated classes only.
    pub fn class_prototypes(&self) -> &[Prototype] {
        match self.prototypes.split_last() {
            Some((_background, classes)) => classes,
            None => &[],
        }
    }

    /// Prototype colors, background last.
    pub fn colors(&self) -> Vec<[u8; 3]> {
        self.prototypes.iter().map(|p| p.color).collect()
    }

    /// Prototype labels, background last.
    pub fn labels(&self) -> Vec<i32> {
        self.prototypes.iter().map(|p| p.label).collect()
    }

    /// Render every class prototype as a `size x size` solid image.
    pub fn swatches(&self, size: usize) -> Result<Vec<Image<u8, 3>>, ImageError> {
        self.class_prototypes()
            .iter()
            .map(|p| Image::from_size_pixel([size, size].into(), p.color))
            .collect()
    }
}

/// Computes per-class color prototypes from annotated training images.
pub struct PrototypeBuilder<'a> {
    annotations: &'a AnnotationSet,
    labels: &'a ClassLabels,
}

impl<'a> PrototypeBuilder<'a> {
    /// Create a builder over parsed annotations and the class label mapping.
    pub fn new(annotations: &'a AnnotationSet, labels: &'a ClassLabels) -> Self {
        Self {
            annotations,
            labels,
        }
    }

    /// The size every crop of a class is resized to: the largest rows and
    /// cols seen for that class across the dataset.
    pub fn canonical_sizes(&self) -> Result<Vec<ImageSize>, SegmentError> {
        (0..self.annotations.object_count())
            .map(|class_index| {
                let (rows, cols) = self
                    .annotations
                    .class_rectangles(class_index)
                    .fold((0, 0), |(rows, cols), r| {
                        (rows.max(r.rows()), cols.max(r.cols()))
                    });

                if rows == 0 || cols == 0 {
                    return Err(SegmentError::EmptyRegion {
                        class_index,
                        image: self.annotations.source_name().to_string(),
                    });
                }

                Ok(ImageSize {
                    width: cols,
                    height: rows,
                })
            })
            .collect()
    }

    /// Build the prototypes reading every annotated image from `root`.
    ///
    /// Images are decoded one at a time and dropped once their crops are accumulated.
    pub fn build_from_dir(&self, root: impl AsRef<Path>) -> Result<PrototypeSet, SegmentError> {
        let root = root.as_ref();
        let images = self.annotations.files().map(|file| {
            let path = root.join(file);
            read_image_any_rgb8(&path).map_err(|source| SegmentError::ImageLoad { path, source })
        });

        self.build_from_images(images)
    }

    /// Build the prototypes from a sequence of decoded images, one per
    /// annotation record, in record order.
    pub fn build_from_images<I>(&self, images: I) -> Result<PrototypeSet, SegmentError>
    where
        I: IntoIterator<Item = Result<Image<u8, 3>, SegmentError>>,
    {
        if self.annotations.is_empty() {
            return Err(SegmentError::EmptyDataset);
        }

        self.labels.validate(self.annotations.object_count())?;

        let sizes = self.canonical_sizes()?;
        let mut accumulators = sizes
            .iter()
            .map(|size| vec![0f64; size.area() * 3])
            .collect::<Vec<_>>();

        let records = self.annotations.records();
        let mut n_images = 0;
        for image in images {
            let (Some(record), Some(rects)) = (
                records.get(n_images),
                self.annotations.rectangles().get(n_images),
            ) else {
                return Err(SegmentError::ImageCountMismatch {
                    expected: records.len(),
                    found: n_images + 1,
                });
            };
            let image = image?;

            for (class_index, (rect, size)) in rects.iter().zip(&sizes).enumerate() {
                let resized = crop_and_resize(&image, rect, *size, class_index, &record.image_path)?;

                accumulators[class_index]
                    .iter_mut()
                    .zip(resized.as_slice())
                    .for_each(|(acc, &v)| *acc += v as f64);
            }

            log::debug!("accumulated class regions of {}", record.image_path);
            n_images += 1;
        }

        if n_images != self.annotations.len() {
            return Err(SegmentError::ImageCountMismatch {
                expected: self.annotations.len(),
                found: n_images,
            });
        }

        let class_prototypes = accumulators
            .into_iter()
            .zip(sizes)
            .enumerate()
            .map(|(class_index, (acc, size))| {
                let color = average_color(acc, size, n_images)?;
                let label = self.labels.label(class_index)?;
                log::debug!("class {class_index} (label {label}) prototype color {color:?}");
                Ok(Prototype { label, color })
            })
            .collect::<Result<Vec<_>, SegmentError>>()?;

        let prototypes = PrototypeSet::new(class_prototypes);
        log::info!(
            "built {} prototypes from {} images",
            prototypes.len(),
            n_images
        );

        Ok(prototypes)
    }
}

fn crop_and_resize(
    image: &Image<u8, 3>,
    rect: &Rectangle,
    size: ImageSize,
    class_index: usize,
    image_name: &str,
) -> Result<Image<u8, 3>, SegmentError> {
    if rect.size().is_empty() {
        return Err(SegmentError::EmptyRegion {
            class_index,
            image: image_name.to_string(),
        });
    }

    let crop = crop_region(image, rect.col_min, rect.row_min, rect.size()).map_err(|e| match e {
        ImageError::InvalidCropRegion(..) => SegmentError::RegionOutOfBounds {
            class_index,
            image: image_name.to_string(),
            rect: *rect,
            width: image.width(),
            height: image.height(),
        },
        e => e.into(),
    })?;

    let mut resized = Image::from_size_val(size, 0u8)?;
    resize_fast(&crop, &mut resized, InterpolationMode::Bilinear)?;

    Ok(resized)
}

// pixel-wise average over images, rounded, then the spatial mean per channel, rounded again
fn average_color(acc: Vec<f64>, size: ImageSize, n_images: usize) -> Result<[u8; 3], SegmentError> {
    let n = n_images as f64;
    let averaged = acc.into_iter().map(|s| (s / n).round_ties_even()).collect();
    let averaged = Image::<f64, 3>::new(size, averaged)?;

    let mean = channel_mean(&averaged)?;
    Ok(mean.map(|m| m.round_ties_even().clamp(0.0, 255.0) as u8))
}
