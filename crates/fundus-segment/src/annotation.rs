use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use fundus_image::ImageSize;
use serde::{Deserialize, Serialize};

use crate::error::SegmentError;

/// An axis-aligned rectangle in image-array coordinates.
///
/// Rows index the image height and columns the image width, so a rectangle
/// can be used directly to slice a decoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rectangle {
    /// First row covered by the rectangle.
    pub row_min: usize,
    /// First column covered by the rectangle.
    pub col_min: usize,
    /// Row one past the last row covered by the rectangle.
    pub row_max: usize,
    /// Column one past the last column covered by the rectangle.
    pub col_max: usize,
}

impl Rectangle {
    /// Build a rectangle from the `x, y, dx, dy` layout written by annotation tools.
    ///
    /// Annotation tools store points as `x` (column) and `y` (row), so the
    /// coordinates are flipped into row/column order.
    ///
    /// # Example
    ///
    /// ```
    /// use fundus_segment::annotation::Rectangle;
    ///
    /// let rect = Rectangle::from_xywh(5, 2, 10, 4);
    /// assert_eq!((rect.row_min, rect.col_min, rect.row_max, rect.col_max), (2, 5, 6, 15));
    /// assert_eq!(rect.to_xywh(), [5, 2, 10, 4]);
    /// ```
    ///
    /// Extents reaching past `usize::MAX` are clamped; use
    /// [`Rectangle::checked_from_xywh`] to reject them instead.
    pub fn from_xywh(x: usize, y: usize, dx: usize, dy: usize) -> Self {
        Self {
            row_min: y,
            col_min: x,
            row_max: y.saturating_add(dy),
            col_max: x.saturating_add(dx),
        }
    }

    /// Like [`Rectangle::from_xywh`], returning `None` if `x + dx` or `y + dy` overflows.
    pub fn checked_from_xywh(x: usize, y: usize, dx: usize, dy: usize) -> Option<Self> {
        Some(Self {
            row_min: y,
            col_min: x,
            row_max: y.checked_add(dy)?,
            col_max: x.checked_add(dx)?,
        })
    }

    /// Recover the `x, y, dx, dy` layout of the rectangle.
    pub fn to_xywh(&self) -> [usize; 4] {
        [self.col_min, self.row_min, self.cols(), self.rows()]
    }

    /// Swap the roles of rows and columns.
    ///
    /// Converts between a pair of `(x, y)` points and the row/column representation.
    pub fn flip(&self) -> Self {
        Self {
            row_min: self.col_min,
            col_min: self.row_min,
            row_max: self.col_max,
            col_max: self.row_max,
        }
    }

    /// Number of rows covered.
    pub fn rows(&self) -> usize {
        self.row_max.saturating_sub(self.row_min)
    }

    /// Number of columns covered.
    pub fn cols(&self) -> usize {
        self.col_max.saturating_sub(self.col_min)
    }

    /// Extent of the rectangle as an image size.
    pub fn size(&self) -> ImageSize {
        ImageSize {
            width: self.cols(),
            height: self.rows(),
        }
    }
}

/// One line of the annotation file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotationRecord {
    /// Image file name, relative to the training image directory.
    pub image_path: String,
    /// Number of annotated objects, one per semantic class.
    pub object_count: usize,
    /// `x, y, dx, dy` per object, in annotation tool order.
    pub raw_coordinates: Vec<usize>,
}

impl AnnotationRecord {
    /// Convert the raw coordinates into one rectangle per object.
    pub fn rectangles(&self) -> Vec<Rectangle> {
        self.raw_coordinates
            .chunks_exact(4)
            .map(|c| Rectangle::from_xywh(c[0], c[1], c[2], c[3]))
            .collect()
    }
}

/// Parsed annotation file.
///
/// Holds one row of rectangles per image. Rectangle `i` of every row belongs
/// to the same semantic class.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationSet {
    source_name: String,
    object_count: usize,
    records: Vec<AnnotationRecord>,
    rectangles: Vec<Vec<Rectangle>>,
}

impl AnnotationSet {
    /// Name of the source the annotations were read from.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Number of objects (classes) annotated in every image.
    pub fn object_count(&self) -> usize {
        self.object_count
    }

    /// Number of annotated images.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no image is annotated.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The parsed records, in file order.
    pub fn records(&self) -> &[AnnotationRecord] {
        &self.records
    }

    /// Image file names, in file order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.image_path.as_str())
    }

    /// The rectangle table with shape `(len, object_count)`.
    pub fn rectangles(&self) -> &[Vec<Rectangle>] {
        &self.rectangles
    }

    /// Rectangle of class `class_index` in every image, in file order.
    pub fn class_rectangles(&self, class_index: usize) -> impl Iterator<Item = &Rectangle> {
        self.rectangles
            .iter()
            .filter_map(move |row| row.get(class_index))
    }
}

/// Read an annotation file.
///
/// # Arguments
///
/// * `path` - The path to the annotation file.
///
/// # Returns
///
/// The parsed annotations. See [`parse_annotations`] for the format.
pub fn read_annotations(path: impl AsRef<Path>) -> Result<AnnotationSet, SegmentError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let annotations = parse_annotations(BufReader::new(file), path.display().to_string())?;

    log::info!(
        "parsed {} annotated images with {} objects each from {}",
        annotations.len(),
        annotations.object_count(),
        path.display()
    );

    Ok(annotations)
}

/// Parse annotations from a reader.
///
/// Every non-blank line holds `<image> <object_count> <x1> <y1> <dx1> <dy1> ...`
/// separated by whitespace. The object count of the first line applies to the
/// whole file.
///
/// # Arguments
///
/// * `reader` - The source of the annotation text.
/// * `source_name` - Name used in error messages.
///
/// # Errors
///
/// Any malformed line fails the whole parse.
///
/// # Example
///
/// ```
/// use fundus_segment::annotation::parse_annotations;
///
/// let text = "a.jpg 2 0 0 10 10 5 5 10 10\nb.jpg 2 0 0 8 8 5 5 7 7\n";
/// let annotations = parse_annotations(text.as_bytes(), "inline").unwrap();
///
/// assert_eq!(annotations.len(), 2);
/// assert_eq!(annotations.object_count(), 2);
/// assert_eq!(annotations.rectangles()[1][1].to_xywh(), [5, 5, 7, 7]);
/// ```
pub fn parse_annotations(
    reader: impl BufRead,
    source_name: impl Into<String>,
) -> Result<AnnotationSet, SegmentError> {
    let source_name = source_name.into();
    let mut object_count = None;
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_number = idx + 1;

        if line.trim().is_empty() {
            continue;
        }

        let record = parse_record(&line, &source_name, line_number)?;

        let expected = *object_count.get_or_insert(record.object_count);
        if record.object_count != expected {
            return Err(SegmentError::InconsistentObjectCount {
                source_name,
                line: line_number,
                expected,
                found: record.object_count,
            });
        }

        records.push(record);
    }

    let rectangles = records.iter().map(|r| r.rectangles()).collect();

    Ok(AnnotationSet {
        source_name,
        object_count: object_count.unwrap_or(0),
        records,
        rectangles,
    })
}

/// Parse a single line: IMAGE, OBJECT_COUNT, X[0], Y[0], DX[0], DY[0], ...
fn parse_record(
    line: &str,
    source_name: &str,
    line_number: usize,
) -> Result<AnnotationRecord, SegmentError> {
    let parse_error = |message: String| SegmentError::Parse {
        source_name: source_name.to_string(),
        line: line_number,
        message,
    };

    // split the line into parts by whitespace
    let parts = line.split_whitespace().collect::<Vec<_>>();

    if parts.len() < 2 {
        return Err(parse_error(format!(
            "expected an image name and an object count, found {} fields",
            parts.len()
        )));
    }

    let object_count = parts[1]
        .parse::<usize>()
        .map_err(|e| parse_error(format!("invalid object count '{}': {}", parts[1], e)))?;

    let expected = object_count
        .checked_mul(4)
        .ok_or_else(|| parse_error(format!("object count {} is too large", object_count)))?;

    let coordinates = &parts[2..];
    if coordinates.len() != expected {
        return Err(parse_error(format!(
            "expected {} coordinates for {} objects, found {}",
            expected,
            object_count,
            coordinates.len()
        )));
    }

    let raw_coordinates = coordinates
        .iter()
        .map(|s| {
            s.parse::<usize>()
                .map_err(|e| parse_error(format!("invalid coordinate '{}': {}", s, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // every rectangle must end inside the addressable range
    for (i, c) in raw_coordinates.chunks_exact(4).enumerate() {
        if Rectangle::checked_from_xywh(c[0], c[1], c[2], c[3]).is_none() {
            return Err(parse_error(format!(
                "rectangle {} ({} {} {} {}) overflows the coordinate range",
                i, c[0], c[1], c[2], c[3]
            )));
        }
    }

    Ok(AnnotationRecord {
        image_path: parts[0].to_string(),
        object_count,
        raw_coordinates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_IMAGES: &str = "\
image_a.jpg 2 0 0 10 10 5 5 10 10
image_b.jpg 2 0 0 8 8 5 5 7 7
";

    #[test]
    fn parse_two_images() -> Result<(), SegmentError> {
        let annotations = parse_annotations(TWO_IMAGES.as_bytes(), "inline")?;

        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations.object_count(), 2);
        assert_eq!(
            annotations.files().collect::<Vec<_>>(),
            vec!["image_a.jpg", "image_b.jpg"]
        );

        let table = annotations.rectangles();
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|row| row.len() == 2));

        assert_eq!(
            table[0][1],
            Rectangle {
                row_min: 5,
                col_min: 5,
                row_max: 15,
                col_max: 15
            }
        );
        assert_eq!(
            table[1][0],
            Rectangle {
                row_min: 0,
                col_min: 0,
                row_max: 8,
                col_max: 8
            }
        );

        for rect in table.iter().flatten() {
            assert!(rect.row_max >= rect.row_min);
            assert!(rect.col_max >= rect.col_min);
        }

        Ok(())
    }

    #[test]
    fn coordinate_flip_is_row_col() {
        let rect = Rectangle::from_xywh(3, 7, 4, 2);
        assert_eq!(rect.row_min, 7);
        assert_eq!(rect.col_min, 3);
        assert_eq!(rect.row_max, 9);
        assert_eq!(rect.col_max, 7);
        assert_eq!(rect.size(), ImageSize { width: 4, height: 2 });
    }

    #[test]
    fn coordinate_flip_recovers_original() {
        for &(x, y, dx, dy) in &[(0, 0, 0, 0), (1, 2, 3, 4), (640, 480, 13, 0), (0, 9, 0, 9)] {
            assert_eq!(Rectangle::from_xywh(x, y, dx, dy).to_xywh(), [x, y, dx, dy]);
        }
    }

    #[test]
    fn flip_swaps_rows_and_cols() {
        let rect = Rectangle::from_xywh(3, 7, 4, 2);
        let flipped = rect.flip();
        assert_eq!(flipped.rows(), rect.cols());
        assert_eq!(flipped.cols(), rect.rows());
        assert_eq!(flipped.flip(), rect);
    }

    #[test]
    fn class_rectangles_selects_column() -> Result<(), SegmentError> {
        let annotations = parse_annotations(TWO_IMAGES.as_bytes(), "inline")?;
        let rows = annotations
            .class_rectangles(0)
            .map(|r| r.rows())
            .collect::<Vec<_>>();
        assert_eq!(rows, vec![10, 8]);
        Ok(())
    }

    #[test]
    fn blank_lines_are_skipped() -> Result<(), SegmentError> {
        let text = "\nimage_a.jpg 1 0 0 2 2\n\n   \nimage_b.jpg 1 1 1 2 2\n";
        let annotations = parse_annotations(text.as_bytes(), "inline")?;
        assert_eq!(annotations.len(), 2);
        Ok(())
    }

    #[test]
    fn empty_input() -> Result<(), SegmentError> {
        let annotations = parse_annotations("".as_bytes(), "inline")?;
        assert!(annotations.is_empty());
        assert_eq!(annotations.object_count(), 0);
        Ok(())
    }

    #[test]
    fn wrong_token_count_fails() {
        let text = "image_a.jpg 2 0 0 10 10 5 5 10\n";
        let res = parse_annotations(text.as_bytes(), "ann.txt");
        match res {
            Err(SegmentError::Parse {
                source_name, line, ..
            }) => {
                assert_eq!(source_name, "ann.txt");
                assert_eq!(line, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_integer_coordinate_fails() {
        let text = "image_a.jpg 1 0 0 2 2\nimage_b.jpg 1 0 zero 2 2\n";
        let res = parse_annotations(text.as_bytes(), "ann.txt");
        assert!(matches!(res, Err(SegmentError::Parse { line: 2, .. })));
    }

    #[test]
    fn negative_coordinate_fails() {
        let text = "image_a.jpg 1 0 0 -2 2\n";
        let res = parse_annotations(text.as_bytes(), "ann.txt");
        assert!(matches!(res, Err(SegmentError::Parse { line: 1, .. })));
    }

    #[test]
    fn huge_object_count_fails() {
        let text = "a.png 4611686018427387904 0 0 1 1\n";
        let res = parse_annotations(text.as_bytes(), "ann.txt");
        assert!(matches!(res, Err(SegmentError::Parse { line: 1, .. })));
    }

    #[test]
    fn overflowing_extent_fails() {
        let text = "a.png 1 0 0 1 1\na.png 1 0 18446744073709551615 1 1\n";
        let res = parse_annotations(text.as_bytes(), "ann.txt");
        assert!(matches!(res, Err(SegmentError::Parse { line: 2, .. })));

        assert_eq!(Rectangle::checked_from_xywh(usize::MAX, 0, 1, 0), None);
        let clamped = Rectangle::from_xywh(0, usize::MAX, 0, 1);
        assert!(clamped.row_max >= clamped.row_min);
    }

    #[test]
    fn missing_object_count_fails() {
        let res = parse_annotations("image_a.jpg\n".as_bytes(), "ann.txt");
        assert!(matches!(res, Err(SegmentError::Parse { line: 1, .. })));
    }

    #[test]
    fn inconsistent_object_count_fails() {
        let text = "image_a.jpg 1 0 0 2 2\nimage_b.jpg 2 0 0 2 2 1 1 1 1\n";
        let res = parse_annotations(text.as_bytes(), "ann.txt");
        assert!(matches!(
            res,
            Err(SegmentError::InconsistentObjectCount {
                line: 2,
                expected: 1,
                found: 2,
                ..
            })
        ));
    }

    #[test]
    fn read_annotations_from_file() -> Result<(), SegmentError> {
        let tmp_dir = tempfile::tempdir()?;
        let path = tmp_dir.path().join("annotations.txt");
        std::fs::write(&path, TWO_IMAGES)?;

        let annotations = read_annotations(&path)?;
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations.source_name(), path.display().to_string());
        Ok(())
    }

    #[test]
    fn read_annotations_missing_file() {
        let res = read_annotations("does/not/exist.txt");
        assert!(matches!(res, Err(SegmentError::Io(_))));
    }
}
