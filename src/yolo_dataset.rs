use indicatif::ProgressBar;
use log::{error, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::config::{ConvertArgs, PoseConfig};
use crate::io::{assign_label_paths, collect_json_files, convert_json_file, create_dataset_yaml};
use crate::types::ProcessingStats;
use crate::utils::{create_progress_bar, ensure_directory};

/// Splits converted by the `convert` stage, in processing order.
pub const SPLITS: [&str; 2] = ["train", "val"];

/// Convert a batch of LabelMe files in parallel. Label names are assigned
/// up front in list order; a failing record is logged and counted and never
/// stops the batch.
pub fn process_annotations_in_parallel(
    json_files: &[PathBuf],
    labels_dir: &Path,
    config: &PoseConfig,
    pb: &ProgressBar,
) -> ProcessingStats {
    assign_label_paths(json_files, labels_dir)
        .into_par_iter()
        .fold(ProcessingStats::new, |mut stats, (json_path, label_path)| {
            let result = label_path
                .and_then(|label_path| convert_json_file(&json_path, &label_path, config));
            match result {
                Ok(encoded) => stats.record_success(encoded.lines.len(), encoded.unmatched_boxes),
                Err(e) => {
                    error!("Failed to convert {}: {}", json_path.display(), e);
                    stats.record_failure();
                }
            }
            pb.inc(1);
            stats
        })
        .reduce(ProcessingStats::new, ProcessingStats::merge)
}

/// Convert `<work>/jsons/<split>` into `<work>/label/<split>`.
/// Returns `None` when the split has no JSON directory.
pub fn process_split(
    work_dir: &Path,
    split: &str,
    config: &PoseConfig,
) -> std::io::Result<Option<ProcessingStats>> {
    let json_dir = work_dir.join("jsons").join(split);
    if !json_dir.is_dir() {
        error!("JSON directory not found: {}", json_dir.display());
        return Ok(None);
    }
    let labels_dir = ensure_directory(&work_dir.join("label").join(split))?;

    let json_files = collect_json_files(&json_dir);
    if json_files.is_empty() {
        warn!("No JSON files found in {}", json_dir.display());
        return Ok(Some(ProcessingStats::new()));
    }
    info!("Found {} JSON files in {}", json_files.len(), json_dir.display());

    let pb = create_progress_bar(json_files.len() as u64, split);
    let stats = process_annotations_in_parallel(&json_files, &labels_dir, config, &pb);
    pb.finish_with_message(format!("{} conversion complete", split));

    Ok(Some(stats))
}

/// Main conversion pipeline: every split, then dataset.yaml
pub fn process_dataset(args: &ConvertArgs) -> Result<ProcessingStats, Box<dyn std::error::Error>> {
    let work_dir = args.dirs.work_dir();
    if !work_dir.is_dir() {
        return Err(format!("Working directory not found: {}", work_dir.display()).into());
    }

    let config = args.to_pose_config();
    info!(
        "Converting with classes {:?}, {} keypoints, polygon labels {:?}",
        config.sorted_class_names(),
        config.keypoint_count,
        config.polygon_labels
    );

    let mut total = ProcessingStats::new();
    for split in SPLITS {
        info!("Processing {} split...", split);
        if let Some(stats) = process_split(&work_dir, split, &config)? {
            stats.print_summary(split);
            total = total.merge(stats);
        }
    }

    info!("Creating dataset.yaml file...");
    match create_dataset_yaml(&work_dir, &config, &SPLITS) {
        Ok(path) => info!("Wrote {}", path.display()),
        Err(e) => return Err(format!("Failed to create dataset.yaml: {}", e).into()),
    }

    info!("Conversion process completed successfully.");
    Ok(total)
}
