use std::path::Path;

use fundus_image::{Image, ImageSize};

use crate::error::IoError;

// decode any supported format through the image crate, reading the file via mmap
fn read_image_any_impl(file_path: &Path) -> Result<image::DynamicImage, IoError> {
    // verify the file exists
    if !file_path.exists() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    // open the file and map it to memory
    let file = std::fs::File::open(file_path)?;
    let mmap = unsafe { memmap2::Mmap::map(&file)? };

    // decode the data directly from memory
    let img = image::ImageReader::new(std::io::Cursor::new(&mmap[..]))
        .with_guessed_format()?
        .decode()?;

    Ok(img)
}

/// Reads an image from the given file path as a three channel (rgb8) image.
///
/// The method tries to read from any image format supported by the image crate
/// and converts the decoded pixels to 8-bit RGB.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// An RGB image with three channels.
///
/// # Example
///
/// ```no_run
/// use fundus_image::Image;
/// use fundus_io::functional as F;
///
/// let image: Image<u8, 3> = F::read_image_any_rgb8("fundus/01_train.jpg").unwrap();
/// assert_eq!(image.num_channels(), 3);
/// ```
pub fn read_image_any_rgb8(file_path: impl AsRef<Path>) -> Result<Image<u8, 3>, IoError> {
    let img = read_image_any_impl(file_path.as_ref())?;

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    Ok(Image::new(size, img.into_rgb8().into_raw())?)
}

/// Reads an image from the given file path as a single channel (mono8) image.
///
/// Color images are converted to luma by the decoder.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// A grayscale image with a single channel.
pub fn read_image_any_mono8(file_path: impl AsRef<Path>) -> Result<Image<u8, 1>, IoError> {
    let img = read_image_any_impl(file_path.as_ref())?;

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    Ok(Image::new(size, img.into_luma8().into_raw())?)
}
