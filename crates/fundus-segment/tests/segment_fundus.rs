use std::path::{Path, PathBuf};

use fundus_image::{Image, ImageSize};
use fundus_imgproc::draw::draw_filled_rect;
use fundus_io::png::{write_image_png_gray8, write_image_png_rgb8};
use fundus_segment::{
    ClassifierConfig, MaskedImage, RegionClassifier, SegmentError, BACKGROUND_LABEL,
};

const DRUSEN_A: [u8; 3] = [230, 210, 60];
const DRUSEN_B: [u8; 3] = [220, 200, 70];
const TISSUE_A: [u8; 3] = [150, 40, 20];
const TISSUE_B: [u8; 3] = [140, 50, 30];

const DRUSEN_LABEL: i32 = 0;
const TISSUE_LABEL: i32 = 1;

type TestResult = Result<(), Box<dyn std::error::Error>>;

struct Dataset {
    _dir: tempfile::TempDir,
    config: ClassifierConfig,
    target: PathBuf,
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// two training images with four vertical bands, one class per band
fn write_dataset(n_neighbors: usize) -> Result<Dataset, Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let root = dir.path().join("train");
    let masks_dir = dir.path().join("masks");
    let test_dir = dir.path().join("test");
    for d in [&root, &masks_dir, &test_dir] {
        std::fs::create_dir(d)?;
    }

    let mut lines = String::new();
    for name in ["01_train.png", "02_train.png"] {
        let mut image = Image::<u8, 3>::from_size_val([40, 10].into(), 0)?;
        for (i, color) in [DRUSEN_A, DRUSEN_B, TISSUE_A, TISSUE_B].into_iter().enumerate() {
            draw_filled_rect(&mut image, 10 * i, 0, 10, 10, color);
        }
        write_image_png_rgb8(root.join(name), &image)?;

        lines.push_str(&format!(
            "{name} 4 0 0 10 10 10 0 10 10 20 0 10 10 30 0 10 10\n"
        ));
    }

    let annotations = dir.path().join("annotations.txt");
    std::fs::write(&annotations, lines)?;

    // left half close to drusen, right half close to tissue
    let mut target = Image::<u8, 3>::from_size_pixel([20, 10].into(), [148, 42, 22])?;
    draw_filled_rect(&mut target, 0, 0, 10, 10, [228, 208, 62]);
    let target_path = test_dir.join("03_test.png");
    write_image_png_rgb8(&target_path, &target)?;

    // the two bottom rows are outside the region of interest
    let mut mask = Image::<u8, 1>::from_size_val([20, 10].into(), 0)?;
    draw_filled_rect(&mut mask, 0, 0, 20, 8, [1]);
    write_image_png_gray8(masks_dir.join("03_test.png"), &mask)?;

    let mut config = ClassifierConfig::new(&root, &annotations, &masks_dir).with_labels([
        (0, DRUSEN_LABEL),
        (1, DRUSEN_LABEL),
        (2, TISSUE_LABEL),
        (3, TISSUE_LABEL),
    ]);
    config.n_neighbors = n_neighbors;

    Ok(Dataset {
        _dir: dir,
        config,
        target: target_path,
    })
}

#[test]
fn prototypes_from_training_images() -> TestResult {
    init_logger();
    let dataset = write_dataset(3)?;
    let classifier = RegionClassifier::new(dataset.config)?;

    let prototypes = classifier.prototypes()?;
    assert_eq!(prototypes.len(), 5);
    assert_eq!(
        prototypes.colors(),
        vec![DRUSEN_A, DRUSEN_B, TISSUE_A, TISSUE_B, [0, 0, 0]]
    );
    assert_eq!(prototypes.labels(), vec![0, 0, 1, 1, BACKGROUND_LABEL]);
    Ok(())
}

#[test]
fn classify_with_three_neighbors() -> TestResult {
    init_logger();
    let dataset = write_dataset(3)?;
    let classifier = RegionClassifier::new(dataset.config)?;

    let map = classifier.classify(&dataset.target)?;
    assert_eq!(map.rows(), 10);
    assert_eq!(map.cols(), 20);

    assert_eq!(map.label_at(0, 0), Some(DRUSEN_LABEL));
    assert_eq!(map.label_at(7, 9), Some(DRUSEN_LABEL));
    assert_eq!(map.label_at(0, 10), Some(TISSUE_LABEL));
    assert_eq!(map.count(DRUSEN_LABEL), 80);

    // black masked pixels have two tissue prototypes among their three nearest
    assert_eq!(map.label_at(9, 0), Some(TISSUE_LABEL));
    assert_eq!(map.count(TISSUE_LABEL), 120);
    assert_eq!(map.count(BACKGROUND_LABEL), 0);
    Ok(())
}

#[test]
fn classify_with_nearest_prototype() -> TestResult {
    init_logger();
    let dataset = write_dataset(1)?;
    let classifier = RegionClassifier::new(dataset.config)?;

    let map = classifier.classify(&dataset.target)?;
    assert_eq!(map.count(DRUSEN_LABEL), 80);
    assert_eq!(map.count(TISSUE_LABEL), 80);
    assert_eq!(map.count(BACKGROUND_LABEL), 40);
    assert_eq!(map.label_at(8, 15), Some(BACKGROUND_LABEL));
    Ok(())
}

#[test]
fn classification_is_deterministic() -> TestResult {
    let dataset = write_dataset(3)?;
    let first = RegionClassifier::new(dataset.config.clone())?.classify(&dataset.target)?;
    let second = RegionClassifier::new(dataset.config)?.classify(&dataset.target)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn mask_rows_must_match() -> TestResult {
    let dataset = write_dataset(3)?;
    let classifier = RegionClassifier::new(dataset.config)?;

    let image = Image::<u8, 3>::from_size_val([50, 100].into(), 100)?;
    let mask = Image::<u8, 1>::from_size_val([50, 99].into(), 255)?;
    let res = classifier.classify_image(image, mask);
    assert!(matches!(
        res,
        Err(SegmentError::ShapeMismatch {
            image_rows: 100,
            mask_rows: 99
        })
    ));

    let image = Image::<u8, 3>::from_size_val([50, 100].into(), 100)?;
    let mask = Image::<u8, 1>::from_size_val([64, 100].into(), 255)?;
    let map = classifier.classify_image(image, mask)?;
    assert_eq!(map.size(), ImageSize::from([50, 100]));
    Ok(())
}

#[test]
fn missing_mask_is_reported() -> TestResult {
    let dataset = write_dataset(3)?;
    let masks_dir = dataset.config.masks_dir.clone();
    let classifier = RegionClassifier::new(dataset.config)?;

    std::fs::remove_file(masks_dir.join("03_test.png"))?;
    match classifier.classify(&dataset.target) {
        Err(SegmentError::MaskLoad { path, .. }) => assert_eq!(path, masks_dir.join("03_test.png")),
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[test]
fn missing_training_image_is_reported() -> TestResult {
    let dataset = write_dataset(3)?;
    std::fs::remove_file(dataset.config.root.join("02_train.png"))?;
    let classifier = RegionClassifier::new(dataset.config)?;

    let res = classifier.classify(&dataset.target);
    assert!(matches!(res, Err(SegmentError::ImageLoad { ref path, .. }) if path.ends_with("02_train.png")));
    Ok(())
}

#[test]
fn masked_reader_matches_classifier_input() -> TestResult {
    let dataset = write_dataset(3)?;
    let dir = dataset.target.parent().unwrap_or(Path::new("."));

    let masked = MaskedImage::read_rgb8(dir, "03_test.png", &dataset.config.masks_dir)?;
    assert_eq!(masked.image().pixel(0, 0), Some(&[228u8, 208, 62][..]));
    assert_eq!(masked.image().pixel(9, 19), Some(&[0u8, 0, 0][..]));
    assert_eq!(masked.mask().as_slice().iter().filter(|&&m| m == 0).count(), 40);
    Ok(())
}

#[test]
fn config_from_json_file() -> TestResult {
    let dataset = write_dataset(3)?;
    let path = dataset.target.with_file_name("config.json");
    std::fs::write(&path, serde_json::to_string(&dataset.config)?)?;

    let classifier = RegionClassifier::new(ClassifierConfig::from_json_file(&path)?)?;
    assert_eq!(classifier.annotations().len(), 2);
    assert_eq!(classifier.labels().label(3)?, TISSUE_LABEL);
    Ok(())
}
