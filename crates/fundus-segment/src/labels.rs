use std::collections::BTreeMap;

use crate::error::SegmentError;

/// Label of the synthetic black background prototype.
pub const BACKGROUND_LABEL: i32 = -1;

/// Explicit mapping from annotation class index to classifier label.
///
/// Several classes may share a label, e.g. two annotated drusen regions and
/// two background regions per image.
///
/// # Example
///
/// ```
/// use fundus_segment::labels::ClassLabels;
///
/// let labels = ClassLabels::from_iter([(0, 0), (1, 0), (2, 1), (3, 1)]);
/// labels.validate(4).unwrap();
/// assert_eq!(labels.label(2).unwrap(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassLabels(BTreeMap<usize, i32>);

impl ClassLabels {
    /// Create a mapping from an explicit map.
    pub fn new(labels: BTreeMap<usize, i32>) -> Self {
        Self(labels)
    }

    /// Map every class index `i` in `0..object_count` to label `i`.
    pub fn identity(object_count: usize) -> Self {
        (0..object_count).map(|i| (i, i as i32)).collect()
    }

    /// Label assigned to a class.
    pub fn label(&self, class_index: usize) -> Result<i32, SegmentError> {
        self.0
            .get(&class_index)
            .copied()
            .ok_or(SegmentError::MissingClassLabel(class_index))
    }

    /// Number of mapped classes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no class is mapped.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(class_index, label)` pairs in class order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, i32)> + '_ {
        self.0.iter().map(|(&k, &v)| (k, v))
    }

    /// Check that the mapping covers exactly the classes `0..object_count`
    /// and does not use the background label.
    pub fn validate(&self, object_count: usize) -> Result<(), SegmentError> {
        if let Some((&index, _)) = self.0.range(object_count..).next() {
            return Err(SegmentError::UnknownClassIndex {
                index,
                object_count,
            });
        }

        for index in 0..object_count {
            let label = self.label(index)?;
            if label == BACKGROUND_LABEL {
                return Err(SegmentError::ReservedLabel { index, label });
            }
        }

        Ok(())
    }
}

impl FromIterator<(usize, i32)> for ClassLabels {
    fn from_iter<I: IntoIterator<Item = (usize, i32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
