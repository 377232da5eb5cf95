//! LabelMe to YOLO-pose converter
//!
//! This library turns LabelMe annotations made of bounding boxes and
//! fixed-size keypoint polygons into YOLO-pose label files, and provides the
//! split and merge stages around that conversion.

pub mod config;
pub mod conversion;
pub mod dataset;
pub mod error;
pub mod io;
pub mod merge;
pub mod types;
pub mod utils;
pub mod yolo_dataset;

// Re-export commonly used types and functions
pub use config::{Args, Command, PoseConfig};
pub use conversion::{associate, encode, Association, EncodedRecord};
pub use dataset::run_split;
pub use error::ConvertError;
pub use merge::run_merge;
pub use types::{AnnotationRecord, BoundingBox, LabelmeDocument, Polygon, ProcessingStats, Shape};
pub use yolo_dataset::process_dataset;
