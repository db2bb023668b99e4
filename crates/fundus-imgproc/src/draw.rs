use rayon::prelude::*;

use fundus_image::{Image, ImageError};

/// Fill an axis-aligned rectangle of an image inplace with a solid color.
///
/// The rectangle is clipped to the image bounds.
///
/// # Arguments
///
/// * `img` - The image to draw on.
/// * `x` - The column of the top-left corner.
/// * `y` - The row of the top-left corner.
/// * `width` - The width of the rectangle.
/// * `height` - The height of the rectangle.
/// * `color` - The color of the rectangle as an array of `C` elements.
pub fn draw_filled_rect<const C: usize>(
    img: &mut Image<u8, C>,
    x: usize,
    y: usize,
    width: usize,
    height: usize,
    color: [u8; C],
) {
    let cols = img.cols();
    let x_end = x.saturating_add(width).min(cols);
    let y_end = y.saturating_add(height).min(img.rows());
    if x >= x_end || y >= y_end {
        return;
    }

    for row in img.as_slice_mut().chunks_exact_mut(C * cols).take(y_end).skip(y) {
        row[x * C..x_end * C]
            .chunks_exact_mut(C)
            .for_each(|pixel| pixel.copy_from_slice(&color));
    }
}

/// Paint every pixel whose label satisfies `predicate` with a solid color.
///
/// # Arguments
///
/// * `img` - The image to paint on, inplace.
/// * `labels` - A single channel map with the same size as `img`.
/// * `predicate` - Selects the labels to paint.
/// * `color` - The color as an array of `C` elements.
///
/// # Example
///
/// ```
/// use fundus_image::Image;
/// use fundus_imgproc::draw::fill_where;
///
/// let mut image = Image::<u8, 3>::from_size_val([2, 1].into(), 10).unwrap();
/// let labels = Image::<i32, 1>::new([2, 1].into(), vec![0, 1]).unwrap();
///
/// fill_where(&mut image, &labels, |&l| l == 1, [255, 0, 0]).unwrap();
/// assert_eq!(image.as_slice(), &[10, 10, 10, 255, 0, 0]);
/// ```
pub fn fill_where<T, const C: usize, L>(
    img: &mut Image<T, C>,
    labels: &Image<L, 1>,
    predicate: impl Fn(&L) -> bool + Send + Sync,
    color: [T; C],
) -> Result<(), ImageError>
where
    T: Copy + Send + Sync,
    L: Send + Sync,
{
    if img.size() != labels.size() {
        return Err(ImageError::InvalidImageSize(
            img.width(),
            img.height(),
            labels.width(),
            labels.height(),
        ));
    }

    let cols = img.cols();
    if cols == 0 {
        return Ok(());
    }

    img.as_slice_mut()
        .par_chunks_exact_mut(C * cols)
        .zip(labels.as_slice().par_chunks_exact(cols))
        .for_each(|(img_row, label_row)| {
            img_row
                .chunks_exact_mut(C)
                .zip(label_row)
                .filter(|(_, label)| predicate(label))
                .for_each(|(pixel, _)| pixel.copy_from_slice(&color));
        });

    Ok(())
}
