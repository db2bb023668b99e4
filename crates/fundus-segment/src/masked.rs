use std::path::{Path, PathBuf};

use fundus_image::Image;
use fundus_imgproc::{
    core::apply_mask,
    resize::{resize_fast, InterpolationMode},
    threshold::threshold_binary,
};
use fundus_io::{
    functional::{read_image_any_mono8, read_image_any_rgb8},
    IoError,
};

use crate::error::SegmentError;

/// Foreground value of a binarized mask.
pub const MASK_FOREGROUND: u8 = 255;

/// Path of the mask belonging to an image: `masks_dir/<image stem>.png`.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use fundus_segment::masked::mask_path;
///
/// let path = mask_path("masks", "train/01_test.tif");
/// assert_eq!(path, Path::new("masks/01_test.png"));
/// ```
pub fn mask_path(masks_dir: impl AsRef<Path>, image_path: impl AsRef<Path>) -> PathBuf {
    let mut name = image_path
        .as_ref()
        .file_stem()
        .unwrap_or_default()
        .to_os_string();
    name.push(".png");
    masks_dir.as_ref().join(name)
}

/// How a mask whose size differs from its image is brought to the image size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MaskRescale {
    /// Rescale the mask in both dimensions.
    #[default]
    Any,
    /// The row counts must already agree; only the columns are rescaled.
    ColumnsOnly,
}

/// An image with every pixel outside its region-of-interest mask set to zero.
#[derive(Clone, Debug)]
pub struct MaskedImage<const C: usize> {
    image: Image<u8, C>,
    mask: Image<u8, 1>,
}

impl<const C: usize> MaskedImage<C> {
    /// Mask an image.
    ///
    /// The mask is rescaled to the image size with bilinear interpolation
    /// if needed and binarized: zero stays background, any other value
    /// becomes [`MASK_FOREGROUND`]. A blended edge pixel is therefore kept.
    ///
    /// # Errors
    ///
    /// With [`MaskRescale::ColumnsOnly`], fails with
    /// [`SegmentError::ShapeMismatch`] when the row counts differ.
    pub fn new(
        image: Image<u8, C>,
        mask: Image<u8, 1>,
        rescale: MaskRescale,
    ) -> Result<Self, SegmentError> {
        if rescale == MaskRescale::ColumnsOnly && image.rows() != mask.rows() {
            return Err(SegmentError::ShapeMismatch {
                image_rows: image.rows(),
                mask_rows: mask.rows(),
            });
        }

        let mask = if mask.size() != image.size() {
            log::debug!(
                "rescaling mask from {} to {}",
                mask.size(),
                image.size()
            );
            let mut resized = Image::from_size_val(image.size(), 0u8)?;
            resize_fast(&mask, &mut resized, InterpolationMode::Bilinear)?;
            resized
        } else {
            mask
        };

        let mut binary = Image::from_size_val(mask.size(), 0u8)?;
        threshold_binary(&mask, &mut binary, 0, MASK_FOREGROUND)?;

        let mut masked = Image::from_size_val(image.size(), 0u8)?;
        apply_mask(&image, &binary, &mut masked)?;

        Ok(Self {
            image: masked,
            mask: binary,
        })
    }

    /// The masked image.
    pub fn image(&self) -> &Image<u8, C> {
        &self.image
    }

    /// The binarized mask, with the size of the image.
    pub fn mask(&self) -> &Image<u8, 1> {
        &self.mask
    }

    /// Split into the masked image and the binarized mask.
    pub fn into_parts(self) -> (Image<u8, C>, Image<u8, 1>) {
        (self.image, self.mask)
    }

    fn read_with(
        root: &Path,
        file: &Path,
        masks_dir: &Path,
        rescale: MaskRescale,
        read: impl Fn(&Path) -> Result<Image<u8, C>, IoError>,
    ) -> Result<Self, SegmentError> {
        let path = root.join(file);
        let image = read(&path).map_err(|source| SegmentError::ImageLoad { path, source })?;
        let mask = read_mask(masks_dir, file)?;

        Self::new(image, mask, rescale)
    }
}

impl MaskedImage<3> {
    /// Read `root/file` as a color image and mask it with `masks_dir/<stem>.png`.
    ///
    /// # Errors
    ///
    /// [`SegmentError::ImageLoad`] or [`SegmentError::MaskLoad`] name the
    /// file that could not be read.
    pub fn read_rgb8(
        root: impl AsRef<Path>,
        file: impl AsRef<Path>,
        masks_dir: impl AsRef<Path>,
    ) -> Result<Self, SegmentError> {
        Self::read_rgb8_with(root, file, masks_dir, MaskRescale::Any)
    }

    /// Like [`MaskedImage::read_rgb8`] with an explicit rescale policy.
    pub fn read_rgb8_with(
        root: impl AsRef<Path>,
        file: impl AsRef<Path>,
        masks_dir: impl AsRef<Path>,
        rescale: MaskRescale,
    ) -> Result<Self, SegmentError> {
        Self::read_with(
            root.as_ref(),
            file.as_ref(),
            masks_dir.as_ref(),
            rescale,
            |p| read_image_any_rgb8(p),
        )
    }
}

impl MaskedImage<1> {
    /// Read `root/file` as a grayscale image and mask it with `masks_dir/<stem>.png`.
    pub fn read_mono8(
        root: impl AsRef<Path>,
        file: impl AsRef<Path>,
        masks_dir: impl AsRef<Path>,
    ) -> Result<Self, SegmentError> {
        Self::read_with(
            root.as_ref(),
            file.as_ref(),
            masks_dir.as_ref(),
            MaskRescale::Any,
            |p| read_image_any_mono8(p),
        )
    }
}

/// Read the mask of an image as mono8.
pub fn read_mask(
    masks_dir: impl AsRef<Path>,
    image_path: impl AsRef<Path>,
) -> Result<Image<u8, 1>, SegmentError> {
    let masks_dir = masks_dir.as_ref();
    if !masks_dir.is_dir() {
        return Err(SegmentError::MaskLoad {
            path: masks_dir.to_path_buf(),
            source: IoError::FileDoesNotExist(masks_dir.to_path_buf()),
        });
    }

    let path = mask_path(masks_dir, image_path);
    read_image_any_mono8(&path).map_err(|source| SegmentError::MaskLoad { path, source })
}
