use std::collections::BTreeMap;

use fundus_image::Image;
use rayon::prelude::*;

use crate::error::SegmentError;

/// A k-nearest-neighbour classifier over `D`-dimensional feature vectors.
///
/// Neighbours are ranked by euclidean distance, with ties broken by the
/// order the training samples were given in. The most frequent label among
/// the `k` nearest wins; when several labels share the top vote count the
/// smallest one is returned.
///
/// # Example
///
/// ```
/// use fundus_segment::knn::KNeighborsClassifier;
///
/// let mut knn = KNeighborsClassifier::<3>::new(1);
/// knn.fit(vec![[0.0, 0.0, 0.0], [255.0, 255.0, 255.0]], vec![0, 1]).unwrap();
///
/// assert_eq!(knn.predict_one(&[10.0, 20.0, 5.0]).unwrap(), 0);
/// assert_eq!(knn.predict_one(&[200.0, 240.0, 250.0]).unwrap(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct KNeighborsClassifier<const D: usize> {
    n_neighbors: usize,
    samples: Vec<[f32; D]>,
    labels: Vec<i32>,
}

impl<const D: usize> KNeighborsClassifier<D> {
    /// Create an unfitted classifier voting among `n_neighbors` neighbours.
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            samples: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Number of neighbours taking part in the vote.
    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Number of training samples.
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Store the training samples and their labels.
    ///
    /// # Errors
    ///
    /// Fails if the sample and label counts differ, or if there are fewer
    /// samples than neighbours (or no neighbours at all).
    pub fn fit(&mut self, samples: Vec<[f32; D]>, labels: Vec<i32>) -> Result<(), SegmentError> {
        if samples.len() != labels.len() {
            return Err(SegmentError::SampleLabelMismatch {
                samples: samples.len(),
                labels: labels.len(),
            });
        }

        check_neighbors(self.n_neighbors, samples.len())?;

        self.samples = samples;
        self.labels = labels;

        Ok(())
    }

    /// Predict the label of a single feature vector.
    pub fn predict_one(&self, query: &[f32; D]) -> Result<i32, SegmentError> {
        check_neighbors(self.n_neighbors, self.samples.len())?;
        let mut scratch = Vec::with_capacity(self.samples.len());
        Ok(self.vote(query, &mut scratch))
    }

    /// Predict the label of every feature vector, preserving their order.
    pub fn predict(&self, queries: &[[f32; D]]) -> Result<Vec<i32>, SegmentError> {
        check_neighbors(self.n_neighbors, self.samples.len())?;

        let n = self.samples.len();
        Ok(queries
            .par_iter()
            .map_init(|| Vec::with_capacity(n), |scratch, q| self.vote(q, scratch))
            .collect())
    }

    /// Predict a label for every pixel of an image, using the pixel values as features.
    ///
    /// The result is a single channel label map with the size of the image.
    pub fn predict_image(&self, image: &Image<u8, D>) -> Result<Image<i32, 1>, SegmentError> {
        check_neighbors(self.n_neighbors, self.samples.len())?;

        let n = self.samples.len();
        let labels = image
            .as_slice()
            .par_chunks_exact(D)
            .map_init(
                || Vec::with_capacity(n),
                |scratch, pixel| {
                    let mut query = [0f32; D];
                    query
                        .iter_mut()
                        .zip(pixel)
                        .for_each(|(q, &p)| *q = p as f32);
                    self.vote(&query, scratch)
                },
            )
            .collect::<Vec<_>>();

        Ok(Image::new(image.size(), labels)?)
    }

    // the caller guarantees 0 < k <= n
    fn vote(&self, query: &[f32; D], scratch: &mut Vec<(f32, usize)>) -> i32 {
        scratch.clear();
        scratch.extend(
            self.samples
                .iter()
                .enumerate()
                .map(|(i, s)| (squared_distance(query, s), i)),
        );
        scratch.sort_unstable_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut votes = BTreeMap::new();
        for &(_, i) in &scratch[..self.n_neighbors] {
            *votes.entry(self.labels[i]).or_insert(0usize) += 1;
        }

        // ascending label order, so only a strictly larger count replaces the winner
        let mut best = (self.labels[scratch[0].1], 0);
        for (&label, &count) in &votes {
            if count > best.1 {
                best = (label, count);
            }
        }

        best.0
    }
}

fn check_neighbors(k: usize, samples: usize) -> Result<(), SegmentError> {
    if k == 0 || k > samples {
        return Err(SegmentError::NotEnoughSamples { k, samples });
    }
    Ok(())
}

fn squared_distance<const D: usize>(a: &[f32; D], b: &[f32; D]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted(k: usize, samples: Vec<[f32; 3]>, labels: Vec<i32>) -> KNeighborsClassifier<3> {
        let mut knn = KNeighborsClassifier::new(k);
        knn.fit(samples, labels).expect("valid training set");
        knn
    }

    #[test]
    fn nearest_neighbor() -> Result<(), SegmentError> {
        let knn = fitted(
            1,
            vec![[0.0, 0.0, 0.0], [100.0, 0.0, 0.0], [0.0, 100.0, 0.0]],
            vec![5, 6, 7],
        );

        assert_eq!(knn.predict_one(&[90.0, 10.0, 0.0])?, 6);
        assert_eq!(knn.predict_one(&[0.0, 60.0, 0.0])?, 7);
        assert_eq!(knn.predict_one(&[1.0, 1.0, 1.0])?, 5);
        Ok(())
    }

    #[test]
    fn majority_vote() -> Result<(), SegmentError> {
        let knn = fitted(
            3,
            vec![[0.0; 3], [1.0; 3], [2.0; 3], [3.0; 3]],
            vec![1, 0, 1, 0],
        );

        // nearest three: samples 0, 1, 2 -> labels 1, 0, 1
        assert_eq!(knn.predict_one(&[0.5, 0.5, 0.5])?, 1);
        // nearest three: samples 3, 2, 1 -> labels 0, 1, 0
        assert_eq!(knn.predict_one(&[3.0, 3.0, 3.0])?, 0);
        Ok(())
    }

    #[test]
    fn vote_tie_picks_smallest_label() -> Result<(), SegmentError> {
        let knn = fitted(
            3,
            vec![[0.0; 3], [10.0; 3], [20.0; 3]],
            vec![9, 4, 2],
        );

        // every label gets one vote
        assert_eq!(knn.predict_one(&[0.0; 3])?, 2);
        Ok(())
    }

    #[test]
    fn distance_tie_uses_training_order() -> Result<(), SegmentError> {
        let knn = fitted(1, vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]], vec![8, 3]);

        // equidistant from both samples, the first one wins
        assert_eq!(knn.predict_one(&[1.0, 0.0, 0.0])?, 8);
        Ok(())
    }

    #[test]
    fn predict_preserves_order() -> Result<(), SegmentError> {
        let knn = fitted(1, vec![[0.0; 3], [255.0; 3]], vec![0, 1]);

        let queries = vec![[250.0; 3], [3.0; 3], [200.0; 3], [100.0; 3]];
        assert_eq!(knn.predict(&queries)?, vec![1, 0, 1, 0]);
        Ok(())
    }

    #[test]
    fn predict_image_matches_predict_one() -> Result<(), SegmentError> {
        let knn = fitted(
            3,
            vec![[0.0; 3], [200.0, 40.0, 40.0], [40.0, 200.0, 40.0], [250.0, 250.0, 0.0]],
            vec![-1, 0, 1, 0],
        );

        let data = (0..4 * 3 * 3).map(|v| (v * 37 % 256) as u8).collect();
        let image = Image::<u8, 3>::new([4, 3].into(), data)?;

        let labels = knn.predict_image(&image)?;
        assert_eq!(labels.size(), image.size());

        for (pixel, &label) in image.as_slice().chunks_exact(3).zip(labels.as_slice()) {
            let query = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
            assert_eq!(knn.predict_one(&query)?, label);
        }
        Ok(())
    }

    #[test]
    fn too_many_neighbors() {
        let mut knn = KNeighborsClassifier::<3>::new(3);
        let res = knn.fit(vec![[0.0; 3], [1.0; 3]], vec![0, 1]);
        assert!(matches!(
            res,
            Err(SegmentError::NotEnoughSamples { k: 3, samples: 2 })
        ));
    }

    #[test]
    fn zero_neighbors() {
        let mut knn = KNeighborsClassifier::<3>::new(0);
        let res = knn.fit(vec![[0.0; 3]], vec![0]);
        assert!(matches!(res, Err(SegmentError::NotEnoughSamples { k: 0, .. })));
    }

    #[test]
    fn label_count_mismatch() {
        let mut knn = KNeighborsClassifier::<3>::new(1);
        let res = knn.fit(vec![[0.0; 3], [1.0; 3]], vec![0]);
        assert!(matches!(
            res,
            Err(SegmentError::SampleLabelMismatch {
                samples: 2,
                labels: 1
            })
        ));
    }

    #[test]
    fn unfitted_predict_fails() {
        let knn = KNeighborsClassifier::<3>::new(3);
        assert!(knn.predict_one(&[0.0; 3]).is_err());
    }
}
