use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Default number of keypoints carried by each pose polygon.
pub const DEFAULT_KEYPOINT_COUNT: usize = 6;

/// Prepare a YOLO-pose dataset from LabelMe box + polygon annotations.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Shuffle LabelMe JSON files and copy them with their images into train/val
    Split(SplitArgs),
    /// Convert the split LabelMe JSON files into YOLO-pose label files
    Convert(ConvertArgs),
    /// Append an already labelled img/txt folder to the train split
    Merge(MergeArgs),
}

/// Location of the working dataset tree, shared by every stage.
#[derive(clap::Args, Debug, Clone)]
pub struct DatasetDirs {
    /// Dataset root directory
    #[arg(long = "dataset_root", default_value = "./buff_hit")]
    pub dataset_root: PathBuf,

    /// Working directory under the root holding image/, jsons/ and label/
    #[arg(long = "input_dir", default_value = "imgs")]
    pub input_dir: String,
}

impl DatasetDirs {
    pub fn work_dir(&self) -> PathBuf {
        self.dataset_root.join(&self.input_dir)
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct SplitArgs {
    #[command(flatten)]
    pub dirs: DatasetDirs,

    /// Directory containing the raw LabelMe JSON files and their images
    #[arg(short = 'd', long = "json_dir")]
    pub json_dir: PathBuf,

    /// Proportion of the dataset to use for validation
    #[arg(long = "val_size", default_value_t = 0.2, value_parser = validate_size)]
    pub val_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 123)]
    pub seed: u64,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ConvertArgs {
    #[command(flatten)]
    pub dirs: DatasetDirs,

    /// Number of keypoints, i.e. the vertex count of an eligible polygon
    #[arg(long = "keypoints", default_value_t = DEFAULT_KEYPOINT_COUNT, value_parser = validate_keypoints)]
    pub keypoints: usize,

    /// Polygon labels accepted as keypoint polygons
    #[arg(long = "polygon_labels", value_delimiter = ',', default_values = ["poly", "ploy"])]
    pub polygon_labels: Vec<String>,

    /// Ordered box label list; the class id of a label is its position
    #[arg(value_delimiter = ',', default_values = ["buff"])]
    pub label_list: Vec<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MergeArgs {
    #[command(flatten)]
    pub dirs: DatasetDirs,

    /// Folder holding img/ and txt/ subdirectories to merge into the train split
    #[arg(short = 's', long = "source_dir")]
    pub source_dir: PathBuf,
}

/// Everything the associator and encoder need to know, passed explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseConfig {
    pub class_map: HashMap<String, usize>,
    pub keypoint_count: usize,
    pub polygon_labels: Vec<String>,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            class_map: HashMap::from([("buff".to_string(), 0)]),
            keypoint_count: DEFAULT_KEYPOINT_COUNT,
            polygon_labels: vec!["poly".to_string(), "ploy".to_string()],
        }
    }
}

impl PoseConfig {
    /// Build a config whose class ids follow the order of `labels`.
    /// Repeated labels are ignored after their first occurrence, so ids stay
    /// contiguous.
    pub fn from_label_list(
        labels: &[String],
        keypoint_count: usize,
        polygon_labels: Vec<String>,
    ) -> Self {
        let mut class_map = HashMap::with_capacity(labels.len());
        for label in labels {
            if class_map.contains_key(label) {
                log::warn!("Duplicate label '{}' in label list ignored", label);
                continue;
            }
            let next_id = class_map.len();
            class_map.insert(label.clone(), next_id);
        }
        Self {
            class_map,
            keypoint_count,
            polygon_labels,
        }
    }

    pub fn class_id(&self, label: &str) -> Option<usize> {
        self.class_map.get(label).copied()
    }

    pub fn is_polygon_label(&self, label: &str) -> bool {
        self.polygon_labels.iter().any(|alias| alias == label)
    }

    /// Class names sorted by id, as written into dataset.yaml.
    pub fn sorted_class_names(&self) -> Vec<(usize, &str)> {
        let mut names: Vec<_> = self
            .class_map
            .iter()
            .map(|(label, id)| (*id, label.as_str()))
            .collect();
        names.sort();
        names
    }
}

impl ConvertArgs {
    pub fn to_pose_config(&self) -> PoseConfig {
        PoseConfig::from_label_list(
            &self.label_list,
            self.keypoints,
            self.polygon_labels.clone(),
        )
    }
}

// Validate that the size is between 0.0 and 1.0
pub(crate) fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

fn validate_keypoints(s: &str) -> Result<usize, String> {
    match usize::from_str(s) {
        Ok(val) if val > 0 => Ok(val),
        _ => Err("KEYPOINTS must be a positive integer".to_string()),
    }
}
