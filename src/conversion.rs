//! Box-to-polygon keypoint association and YOLO-pose line encoding.

use std::fmt;

use crate::config::PoseConfig;
use crate::types::{AnnotationRecord, BoundingBox, Polygon};

/// Visibility flag written for every keypoint taken from a matched polygon.
pub const VISIBLE: u8 = 2;

/// Result of looking for the keypoint polygon of a single box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Association<'a> {
    Matched(&'a Polygon),
    Unmatched,
}

/// The YOLO-pose label lines of one record, one per qualifying box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedRecord {
    pub lines: Vec<String>,
    /// Boxes written with zero-filled keypoints.
    pub unmatched_boxes: usize,
}

impl EncodedRecord {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for EncodedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Polygons of a record that may carry keypoints: accepted label and exactly
/// `keypoint_count` vertices.
pub fn eligible_polygons<'a>(
    record: &'a AnnotationRecord,
    config: &PoseConfig,
) -> Vec<&'a Polygon> {
    record
        .polygons()
        .filter(|polygon| {
            config.is_polygon_label(&polygon.label)
                && polygon.vertices.len() == config.keypoint_count
        })
        .collect()
}

/// Pick the polygon whose centroid lies inside `bbox` and is closest (in
/// Manhattan distance) to the box center. The first of equally close
/// polygons wins. A polygon may be matched by several boxes.
pub fn associate<'a>(bbox: &BoundingBox, polygons: &[&'a Polygon]) -> Association<'a> {
    let (cx, cy) = bbox.center();
    let mut best: Option<(&Polygon, f64)> = None;

    for &polygon in polygons {
        let Some(centroid) = polygon.centroid() else {
            continue;
        };
        if !bbox.contains(centroid) {
            continue;
        }
        let distance = (centroid.0 - cx).abs() + (centroid.1 - cy).abs();
        if best.map_or(true, |(_, min_distance)| distance < min_distance) {
            best = Some((polygon, distance));
        }
    }

    match best {
        Some((polygon, _)) => Association::Matched(polygon),
        None => Association::Unmatched,
    }
}

/// Encode every box whose label is in the class map as one YOLO-pose line.
/// Boxes with unknown labels are left out; a record without qualifying boxes
/// encodes to no lines.
pub fn encode(record: &AnnotationRecord, config: &PoseConfig) -> EncodedRecord {
    let polygons = eligible_polygons(record, config);
    let width = record.image_width as f64;
    let height = record.image_height as f64;
    let mut encoded = EncodedRecord::default();

    for bbox in record.boxes() {
        let class_id = match config.class_id(&bbox.label) {
            Some(class_id) => class_id,
            None => continue,
        };

        let (x_min, y_min, x_max, y_max) = bbox.extent();
        let x_center = (x_min + x_max) / 2.0 / width;
        let y_center = (y_min + y_max) / 2.0 / height;
        let box_width = (x_max - x_min) / width;
        let box_height = (y_max - y_min) / height;

        let mut line = String::with_capacity(40 + config.keypoint_count * 20);
        line.push_str(&format!(
            "{} {:.5} {:.5} {:.5} {:.5}",
            class_id, x_center, y_center, box_width, box_height
        ));

        match associate(bbox, &polygons) {
            Association::Matched(polygon) => {
                for &(x, y) in &polygon.vertices {
                    line.push_str(&format!(" {:.5} {:.5} {}", x / width, y / height, VISIBLE));
                }
            }
            Association::Unmatched => {
                encoded.unmatched_boxes += 1;
                for _ in 0..config.keypoint_count {
                    line.push_str(" 0 0 0");
                }
            }
        }

        encoded.lines.push(line);
    }

    encoded
}
