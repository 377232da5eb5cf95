use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::SplitArgs;
use crate::error::ConvertError;
use crate::io::read_and_parse_json;
use crate::types::IMG_FORMATS;
use crate::utils::{
    create_progress_bar, ensure_directory, infer_image_format, list_files_with_extension,
};

/// Which JSON files go to which split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    pub train: Vec<PathBuf>,
    pub val: Vec<PathBuf>,
}

/// Where the image of a copied record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    File,
    Embedded,
    Missing,
}

/// Shuffle the files with a seeded RNG and move the first
/// `floor(len * val_size)` of them into the validation split.
pub fn split_files(mut files: Vec<PathBuf>, val_size: f64, seed: u64) -> SplitPlan {
    // listing order is platform dependent, the shuffle must not be
    files.sort();
    let mut rng = StdRng::seed_from_u64(seed);
    files.shuffle(&mut rng);

    let val_count = ((files.len() as f64 * val_size) as usize).min(files.len());
    let train = files.split_off(val_count);

    SplitPlan { train, val: files }
}

/// The image sitting next to `json_path` with the same stem, trying the
/// supported extensions in order.
pub fn find_image_file(json_path: &Path) -> Option<PathBuf> {
    IMG_FORMATS
        .iter()
        .map(|ext| json_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

/// Copy one JSON file and its image into the split's directories.
pub fn copy_record(
    json_path: &Path,
    jsons_dir: &Path,
    images_dir: &Path,
) -> Result<ImageSource, ConvertError> {
    let file_name = json_path.file_name().ok_or_else(|| {
        ConvertError::io(
            json_path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let json_output_path = jsons_dir.join(file_name);
    fs::copy(json_path, &json_output_path).map_err(|e| ConvertError::io(json_path, e))?;

    if let Some(image_path) = find_image_file(json_path) {
        let image_output_path = images_dir.join(image_path.file_name().unwrap_or(file_name));
        fs::copy(&image_path, &image_output_path).map_err(|e| ConvertError::io(&image_path, e))?;
        return Ok(ImageSource::File);
    }

    // Fall back to the base64 image embedded in the LabelMe document
    let document = read_and_parse_json(json_path)?;
    match document.image_data.filter(|data| !data.is_empty()) {
        Some(image_data) => {
            let image_bytes = base64::decode(&image_data).map_err(|e| {
                ConvertError::io(
                    json_path,
                    std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                )
            })?;
            let image_extension = infer_image_format(&image_bytes).unwrap_or("png");
            let image_output_path = images_dir
                .join(file_name)
                .with_extension(image_extension);
            let mut file =
                File::create(&image_output_path).map_err(|e| ConvertError::io(&image_output_path, e))?;
            file.write_all(&image_bytes)
                .map_err(|e| ConvertError::io(&image_output_path, e))?;
            Ok(ImageSource::Embedded)
        }
        None => Ok(ImageSource::Missing),
    }
}

/// Copy every file of one split in parallel, returning the JSON files whose
/// image could not be found or copied.
fn copy_split(files: &[PathBuf], jsons_dir: &Path, images_dir: &Path, label: &str) -> Vec<PathBuf> {
    let pb = create_progress_bar(files.len() as u64, label);
    let missing: Vec<PathBuf> = files
        .par_iter()
        .filter_map(|json_path| {
            let result = copy_record(json_path, jsons_dir, images_dir);
            pb.inc(1);
            match result {
                Ok(ImageSource::Missing) => Some(json_path.clone()),
                Ok(_) => None,
                Err(e) => {
                    log::error!("Failed to copy {}: {}", json_path.display(), e);
                    Some(json_path.clone())
                }
            }
        })
        .collect();
    pb.finish_with_message(format!("{} copy complete", label));
    missing
}

/// Shuffle the raw LabelMe files and lay them out as
/// `<work>/{image,jsons}/{train,val}`.
pub fn run_split(args: &SplitArgs) -> Result<SplitPlan, Box<dyn std::error::Error>> {
    if !args.json_dir.is_dir() {
        return Err(format!("Source directory not found: {}", args.json_dir.display()).into());
    }

    let json_files = list_files_with_extension(&args.json_dir, "json")?;
    if json_files.is_empty() {
        return Err(format!("No JSON files found in {}", args.json_dir.display()).into());
    }
    info!("Found {} JSON annotation files.", json_files.len());

    let plan = split_files(json_files, args.val_size, args.seed);
    info!("Train files: {}", plan.train.len());
    info!("Val files: {}", plan.val.len());

    let work_dir = args.dirs.work_dir();
    let mut missing_images = Vec::new();
    for (split, files) in [("train", &plan.train), ("val", &plan.val)] {
        let images_dir = ensure_directory(&work_dir.join("image").join(split))?;
        let jsons_dir = ensure_directory(&work_dir.join("jsons").join(split))?;
        let label = if split == "train" { "Train" } else { "Val" };
        for json_path in copy_split(files, &jsons_dir, &images_dir, label) {
            missing_images.push((split, json_path));
        }
    }

    info!("Dataset split complete: {}", work_dir.display());
    if !missing_images.is_empty() {
        warn!("The following JSON files have no matching image:");
        for (split, json_path) in &missing_images {
            warn!("  [{}] {}", split, json_path.display());
        }
    }

    Ok(plan)
}
