use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::error::ConvertError;

// Supported image formats, in lookup priority order
pub const IMG_FORMATS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "dng", "mpo", "tif", "tiff", "webp", "pfm",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

// A shape entry exactly as LabelMe stores it
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LabelmeShape {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default = "default_shape_type")]
    pub shape_type: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn default_shape_type() -> String {
    "polygon".to_string()
}

// One LabelMe JSON document
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LabelmeDocument {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub flags: Option<HashMap<String, bool>>,
    #[serde(default)]
    pub shapes: Vec<LabelmeShape>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub image_data: Option<String>,
    pub image_height: u32,
    pub image_width: u32,
}

/// An axis-aligned box given by two opposite corners in any order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub label: String,
    pub corner_a: (f64, f64),
    pub corner_b: (f64, f64),
}

impl BoundingBox {
    /// `(min_x, min_y, max_x, max_y)`, independent of corner order.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        let (ax, ay) = self.corner_a;
        let (bx, by) = self.corner_b;
        (ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
    }

    pub fn center(&self) -> (f64, f64) {
        let (x_min, y_min, x_max, y_max) = self.extent();
        ((x_min + x_max) / 2.0, (y_min + y_max) / 2.0)
    }

    /// Closed-interval containment test.
    pub fn contains(&self, (x, y): (f64, f64)) -> bool {
        let (x_min, y_min, x_max, y_max) = self.extent();
        x_min <= x && x <= x_max && y_min <= y && y <= y_max
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub label: String,
    pub vertices: Vec<(f64, f64)>,
}

impl Polygon {
    /// Arithmetic mean of the vertices, `None` for an empty polygon.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        if self.vertices.is_empty() {
            return None;
        }
        let n = self.vertices.len() as f64;
        let (sum_x, sum_y) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
        Some((sum_x / n, sum_y / n))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    BoundingBox(BoundingBox),
    Polygon(Polygon),
}

/// One labelled image, reduced to what keypoint encoding needs.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub image_width: u32,
    pub image_height: u32,
    pub shapes: Vec<Shape>,
}

impl AnnotationRecord {
    pub fn boxes(&self) -> impl Iterator<Item = &BoundingBox> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::BoundingBox(bbox) => Some(bbox),
            Shape::Polygon(_) => None,
        })
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        self.shapes.iter().filter_map(|shape| match shape {
            Shape::Polygon(polygon) => Some(polygon),
            Shape::BoundingBox(_) => None,
        })
    }
}

impl TryFrom<LabelmeDocument> for AnnotationRecord {
    type Error = ConvertError;

    fn try_from(document: LabelmeDocument) -> Result<Self, Self::Error> {
        if document.image_width == 0 || document.image_height == 0 {
            return Err(ConvertError::InvalidDimensions {
                width: document.image_width,
                height: document.image_height,
            });
        }

        let mut shapes = Vec::with_capacity(document.shapes.len());
        for shape in document.shapes {
            match shape.shape_type.as_str() {
                "rectangle" => {
                    if shape.points.len() < 2 {
                        return Err(ConvertError::MalformedRectangle {
                            label: shape.label,
                            count: shape.points.len(),
                        });
                    }
                    shapes.push(Shape::BoundingBox(BoundingBox {
                        corner_a: shape.points[0],
                        corner_b: shape.points[1],
                        label: shape.label,
                    }));
                }
                "polygon" => shapes.push(Shape::Polygon(Polygon {
                    label: shape.label,
                    vertices: shape.points,
                })),
                other => log::debug!("Skipping '{}' shape of type {}", shape.label, other),
            }
        }

        Ok(AnnotationRecord {
            image_width: document.image_width,
            image_height: document.image_height,
            shapes,
        })
    }
}

// Struct to hold per-split conversion statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    pub total_files_processed: usize,
    pub successful_conversions: usize,
    pub empty_label_files: usize,
    pub unmatched_boxes: usize,
    pub failed_conversions: usize,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine two partial tallies, used as the rayon reduce step.
    pub fn merge(mut self, other: Self) -> Self {
        self.total_files_processed += other.total_files_processed;
        self.successful_conversions += other.successful_conversions;
        self.empty_label_files += other.empty_label_files;
        self.unmatched_boxes += other.unmatched_boxes;
        self.failed_conversions += other.failed_conversions;
        self
    }

    pub fn record_success(&mut self, lines: usize, unmatched: usize) {
        self.total_files_processed += 1;
        self.successful_conversions += 1;
        if lines == 0 {
            self.empty_label_files += 1;
        }
        self.unmatched_boxes += unmatched;
    }

    pub fn record_failure(&mut self) {
        self.total_files_processed += 1;
        self.failed_conversions += 1;
    }

    pub fn print_summary(&self, split: &str) {
        log::info!("=== {} Summary ===", split);
        log::info!("Total files processed: {}", self.total_files_processed);
        log::info!("Successful conversions: {}", self.successful_conversions);
        log::info!("Empty label files: {}", self.empty_label_files);
        log::info!("Failed conversions: {}", self.failed_conversions);

        if self.unmatched_boxes > 0 {
            log::warn!(
                "{} boxes had no matching keypoint polygon and were zero-filled",
                self.unmatched_boxes
            );
        }
    }
}
