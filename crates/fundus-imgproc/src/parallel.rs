use rayon::prelude::*;

use fundus_image::Image;

/// Apply a function to each value in the image in parallel.
pub fn par_iter_rows_val<T1, const C1: usize, T2, const C2: usize>(
    src: &Image<T1, C1>,
    dst: &mut Image<T2, C2>,
    f: impl Fn(&T1, &mut T2) + Send + Sync,
) where
    T1: Send + Sync,
    T2: Send + Sync,
{
    let cols = src.cols();
    if cols == 0 {
        return;
    }

    src.as_slice()
        .par_chunks_exact(C1 * cols)
        .zip(dst.as_slice_mut().par_chunks_exact_mut(C2 * cols))
        .for_each(|(src_chunk, dst_chunk)| {
            src_chunk
                .iter()
                .zip(dst_chunk.iter_mut())
                .for_each(|(src_val, dst_val)| {
                    f(src_val, dst_val);
                });
        });
}

/// Apply a function to each pixel in the image in parallel together with
/// the value of a single channel mask at the same location.
pub fn par_iter_rows_masked<T, const C: usize, M>(
    src: &Image<T, C>,
    mask: &Image<M, 1>,
    dst: &mut Image<T, C>,
    f: impl Fn(&[T], &M, &mut [T]) + Send + Sync,
) where
    T: Send + Sync,
    M: Send + Sync,
{
    let cols = src.cols();
    if cols == 0 {
        return;
    }

    src.as_slice()
        .par_chunks_exact(C * cols)
        .zip(mask.as_slice().par_chunks_exact(cols))
        .zip(dst.as_slice_mut().par_chunks_exact_mut(C * cols))
        .for_each(|((src_chunk, mask_chunk), dst_chunk)| {
            src_chunk
                .chunks_exact(C)
                .zip(mask_chunk.iter())
                .zip(dst_chunk.chunks_exact_mut(C))
                .for_each(|((src_pixel, mask_val), dst_pixel)| {
                    f(src_pixel, mask_val, dst_pixel);
                });
        });
}
