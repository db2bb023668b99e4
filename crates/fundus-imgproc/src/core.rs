use fundus_image::{Image, ImageError};

use crate::parallel;

/// Compute the mean value of every channel of an image.
///
/// # Arguments
///
/// * `image` - The input image.
///
/// # Returns
///
/// The per-channel mean, in channel order.
///
/// # Errors
///
/// Returns [`ImageError::EmptyImage`] if the image has no pixels.
///
/// # Example
///
/// ```
/// use fundus_image::{Image, ImageSize};
/// use fundus_imgproc::core::channel_mean;
///
/// let image = Image::<u8, 3>::new(
///     ImageSize {
///         width: 2,
///         height: 2,
///     },
///     vec![0, 1, 2, 253, 254, 255, 128, 129, 130, 64, 65, 66],
/// ).unwrap();
///
/// let mean = channel_mean(&image).unwrap();
///
/// assert_eq!(mean, [111.25, 112.25, 113.25]);
/// ```
pub fn channel_mean<T, const C: usize>(image: &Image<T, C>) -> Result<[f64; C], ImageError>
where
    T: Copy + Into<f64>,
{
    if image.size().is_empty() {
        return Err(ImageError::EmptyImage);
    }

    let sum = image
        .as_slice()
        .chunks_exact(C)
        .fold([0f64; C], |mut sum, pixel| {
            for (s, &v) in sum.iter_mut().zip(pixel) {
                *s += v.into();
            }
            sum
        });

    let n = image.size().area() as f64;
    Ok(sum.map(|s| s / n))
}

/// Zero every pixel of an image where the mask is zero.
///
/// The mask is a single channel image where the value 0 is considered as
/// background and any other value as foreground.
///
/// # Arguments
///
/// * `src` - The input image.
/// * `mask` - The mask, with the same size as `src`.
/// * `dst` - The output image, with the same size as `src`.
///
/// # Example
///
/// ```
/// use fundus_image::{Image, ImageSize};
/// use fundus_imgproc::core::apply_mask;
///
/// let image = Image::<u8, 3>::new(
///     ImageSize {
///         width: 2,
///         height: 2,
///     },
///     vec![0, 1, 2, 253, 254, 255, 128, 129, 130, 64, 65, 66],
/// ).unwrap();
///
/// let mask = Image::<u8, 1>::new(
///     ImageSize {
///         width: 2,
///         height: 2,
///     },
///     vec![255, 0, 255, 0],
/// ).unwrap();
///
/// let mut output = Image::<u8, 3>::from_size_val(image.size(), 0).unwrap();
///
/// apply_mask(&image, &mask, &mut output).unwrap();
///
/// assert_eq!(output.as_slice(), &[0, 1, 2, 0, 0, 0, 128, 129, 130, 0, 0, 0]);
/// ```
pub fn apply_mask<T, const C: usize>(
    src: &Image<T, C>,
    mask: &Image<u8, 1>,
    dst: &mut Image<T, C>,
) -> Result<(), ImageError>
where
    T: Copy + Default + Send + Sync,
{
    if src.size() != mask.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            mask.width(),
            mask.height(),
        ));
    }

    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
        ));
    }

    parallel::par_iter_rows_masked(src, mask, dst, |src_pixel, &msk, dst_pixel| {
        if msk != 0 {
            dst_pixel.copy_from_slice(src_pixel);
        } else {
            dst_pixel.fill(T::default());
        }
    });

    Ok(())
}
