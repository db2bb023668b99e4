use argh::FromArgs;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use fundus::io::png::write_image_png_rgb8;
use fundus::segment::{
    masked::MaskRescale, ClassifierConfig, MaskedImage, RegionClassifier,
};

// overlay colors, cycled over the labels
const PALETTE: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [255, 0, 255],
    [0, 255, 255],
];

#[derive(FromArgs)]
/// Segment a fundus photograph with class prototypes learned from annotated images
struct Args {
    /// path to the image to segment
    #[argh(positional)]
    image_path: PathBuf,

    /// path to a JSON classifier configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// directory with the annotated training images
    #[argh(option)]
    root: Option<PathBuf>,

    /// path to the annotation file
    #[argh(option)]
    annotations: Option<PathBuf>,

    /// directory with the region-of-interest masks
    #[argh(option)]
    masks_dir: Option<PathBuf>,

    /// class labels as comma separated `class=label` pairs, e.g. 0=0,1=0,2=1,3=1
    #[argh(option)]
    labels: Option<String>,

    /// number of neighbours voting on a pixel label
    #[argh(option, short = 'k')]
    n_neighbors: Option<usize>,

    /// directory to write the results to
    #[argh(option, short = 'o', default = "PathBuf::from(\"output\")")]
    output_dir: PathBuf,
}

fn parse_labels(text: &str) -> Result<Vec<(usize, i32)>, Box<dyn std::error::Error>> {
    text.split(',')
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| -> Result<(usize, i32), Box<dyn std::error::Error>> {
            let (class, label) = pair
                .split_once('=')
                .ok_or_else(|| format!("invalid label pair '{pair}', expected class=label"))?;
            Ok((class.trim().parse()?, label.trim().parse()?))
        })
        .collect()
}

fn build_config(args: &Args) -> Result<ClassifierConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ClassifierConfig::from_json_file(path)?,
        None => {
            let (Some(root), Some(annotations), Some(masks_dir)) =
                (&args.root, &args.annotations, &args.masks_dir)
            else {
                return Err("either --config or --root, --annotations and --masks-dir are required".into());
            };
            ClassifierConfig::new(root, annotations, masks_dir)
        }
    };

    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    if let Some(annotations) = &args.annotations {
        config.annotations = annotations.clone();
    }
    if let Some(masks_dir) = &args.masks_dir {
        config.masks_dir = masks_dir.clone();
    }
    if let Some(labels) = &args.labels {
        config = config.with_labels(parse_labels(labels)?);
    }
    if let Some(k) = args.n_neighbors {
        config.n_neighbors = k;
    }

    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Args = argh::from_env();
    let config = build_config(&args)?;

    std::fs::create_dir_all(&args.output_dir)?;

    let classifier = RegionClassifier::new(config)?;

    // dump the class prototypes for inspection
    let prototypes = classifier.prototypes()?;
    for (i, swatch) in prototypes
        .swatches(classifier.config().swatch_size)?
        .iter()
        .enumerate()
    {
        write_image_png_rgb8(args.output_dir.join(format!("swatches_{i}.png")), swatch)?;
    }

    let file_name = args
        .image_path
        .file_name()
        .ok_or_else(|| format!("invalid image path {}", args.image_path.display()))?;
    let image_dir = args.image_path.parent().unwrap_or(Path::new("."));

    let masked = MaskedImage::read_rgb8_with(
        image_dir,
        file_name,
        &classifier.config().masks_dir,
        MaskRescale::ColumnsOnly,
    )?;
    write_image_png_rgb8(args.output_dir.join("masked.png"), masked.image())?;

    let now = std::time::Instant::now();
    let map = classifier.classify_masked(&masked)?;
    log::info!("classification took {:?}", now.elapsed());

    let labels = prototypes.labels().into_iter().collect::<BTreeSet<_>>();
    for (label, color) in labels.iter().zip(PALETTE.iter().cycle()) {
        let overlay = map.overlay(masked.image(), *label, *color)?;
        write_image_png_rgb8(args.output_dir.join(format!("overlay_{label}.png")), &overlay)?;
    }

    println!("label\tpixels");
    for (label, count) in map.counts() {
        println!("{label}\t{count}");
    }

    println!("Results written to {}", args.output_dir.display());

    Ok(())
}
