use jwalk::WalkDir;
use log::warn;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::config::PoseConfig;
use crate::conversion::{encode, EncodedRecord};
use crate::error::ConvertError;
use crate::types::{AnnotationRecord, LabelmeDocument};
use crate::utils::sanitized_stem;

/// Read and parse a single LabelMe JSON file, streaming from the file handle.
pub fn read_and_parse_json(path: &Path) -> Result<LabelmeDocument, ConvertError> {
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ConvertError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// The `*.json` files directly inside `dir`, sorted so batches are listed
/// deterministically. Subdirectories are not searched.
pub fn collect_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut json_files: Vec<PathBuf> = WalkDir::new(dir)
        .skip_hidden(false)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_type().is_file() && e.path().extension().is_some_and(|ext| ext == "json")
        })
        .map(|e| e.path())
        .collect();
    json_files.sort();
    json_files
}

/// Write `contents` to `path` through a temporary file in the same directory,
/// so the label file is either fully written or absent.
pub fn write_label_file(path: &Path, contents: &str) -> Result<(), ConvertError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let temp = NamedTempFile::new_in(dir).map_err(|e| ConvertError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        writer
            .write_all(contents.as_bytes())
            .and_then(|_| writer.flush())
            .map_err(|e| ConvertError::io(temp.path(), e))?;
    }
    temp.persist(path).map_err(|e| ConvertError::io(path, e.error))?;
    Ok(())
}

/// `<stem>.txt` for a LabelMe file; only the final `.json` is replaced, so
/// dots inside the stem are kept.
pub fn label_file_name(json_path: &Path) -> Result<String, ConvertError> {
    sanitized_stem(json_path)
        .map(|stem| format!("{}.txt", stem))
        .ok_or_else(|| {
            ConvertError::io(
                json_path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "file name is not valid UTF-8",
                ),
            )
        })
}

/// Map every JSON file to its label file in `labels_dir`.
///
/// Runs sequentially over the given order, so when two files map to the same
/// label name the earlier one keeps it and the later one gets
/// `DuplicateOutput`, independent of how the parallel stage is scheduled.
pub fn assign_label_paths(
    json_files: &[PathBuf],
    labels_dir: &Path,
) -> Vec<(PathBuf, Result<PathBuf, ConvertError>)> {
    let mut claimed = HashSet::with_capacity(json_files.len());
    json_files
        .iter()
        .map(|json_path| {
            let label_path = label_file_name(json_path).and_then(|name| {
                let label_path = labels_dir.join(&name);
                if claimed.insert(name) {
                    Ok(label_path)
                } else {
                    Err(ConvertError::DuplicateOutput { path: label_path })
                }
            });
            (json_path.clone(), label_path)
        })
        .collect()
}

/// Convert one LabelMe file into the label file at `label_path`.
pub fn convert_json_file(
    json_path: &Path,
    label_path: &Path,
    config: &PoseConfig,
) -> Result<EncodedRecord, ConvertError> {
    let document = read_and_parse_json(json_path)?;
    let record = AnnotationRecord::try_from(document)?;
    let encoded = encode(&record, config);

    if encoded.is_empty() {
        warn!(
            "No recognized boxes in {}, writing an empty label file",
            json_path.display()
        );
    } else if encoded.unmatched_boxes > 0 {
        warn!(
            "{}: {} box(es) without a matching keypoint polygon",
            json_path.display(),
            encoded.unmatched_boxes
        );
    }

    write_label_file(label_path, &encoded.to_string())?;
    Ok(encoded)
}

/// Create the dataset.yaml file for pose training
pub fn create_dataset_yaml(
    work_dir: &Path,
    config: &PoseConfig,
    splits: &[&str],
) -> std::io::Result<PathBuf> {
    let dataset_yaml_path = work_dir.join("dataset.yaml");
    let mut dataset_yaml = BufWriter::new(File::create(&dataset_yaml_path)?);
    let absolute_path = fs::canonicalize(work_dir)?;

    let mut yaml_content = format!("path: {}\n", absolute_path.to_string_lossy());
    for split in splits {
        yaml_content.push_str(&format!("{}: image/{}\n", split, split));
    }
    yaml_content.push_str(&format!("\nkpt_shape: [{}, 3]\n", config.keypoint_count));
    yaml_content.push_str("\nnames:\n");
    for (id, label) in config.sorted_class_names() {
        yaml_content.push_str(&format!("    {}: {}\n", id, label));
    }

    dataset_yaml.write_all(yaml_content.as_bytes())?;
    dataset_yaml.flush()?;
    Ok(dataset_yaml_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "5.2.1",
        "flags": {},
        "shapes": [
            {"label": "buff", "points": [[50, 50], [10, 10]], "group_id": null,
             "description": "", "shape_type": "rectangle", "flags": {}},
            {"label": "ploy", "points": [[28, 30], [32, 30], [29, 28], [31, 32], [29, 32], [31, 28]],
             "group_id": null, "description": "", "shape_type": "polygon", "flags": {}}
        ],
        "imagePath": "0001.jpg",
        "imageData": null,
        "imageHeight": 100,
        "imageWidth": 100
    }"#;

    #[test]
    fn test_convert_json_file_writes_label() {
        let temp_dir = tempfile::tempdir().unwrap();
        let json_path = temp_dir.path().join("0001.json");
        fs::write(&json_path, SAMPLE).unwrap();
        let labels_dir = temp_dir.path().join("labels");
        fs::create_dir(&labels_dir).unwrap();

        let label_path = labels_dir.join(label_file_name(&json_path).unwrap());
        let encoded = convert_json_file(&json_path, &label_path, &PoseConfig::default()).unwrap();

        assert_eq!(encoded.lines.len(), 1);
        let written = fs::read_to_string(labels_dir.join("0001.txt")).unwrap();
        assert!(written.starts_with("0 0.30000 0.30000 0.40000 0.40000 0.28000 0.30000 2"));
        assert!(written.ends_with(" 2\n"));
        // no temporary files are left behind
        assert_eq!(fs::read_dir(&labels_dir).unwrap().count(), 1);
    }

    #[test]
    fn test_dotted_stems_keep_separate_label_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let labels_dir = temp_dir.path().join("labels");
        fs::create_dir(&labels_dir).unwrap();
        let json_files: Vec<PathBuf> = ["frame.001.json", "frame.002.json"]
            .iter()
            .map(|name| temp_dir.path().join(name))
            .collect();
        for json_path in &json_files {
            fs::write(json_path, SAMPLE).unwrap();
        }

        for (json_path, label_path) in assign_label_paths(&json_files, &labels_dir) {
            convert_json_file(&json_path, &label_path.unwrap(), &PoseConfig::default()).unwrap();
        }

        let mut names: Vec<_> = fs::read_dir(&labels_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["frame.001.txt", "frame.002.txt"]);
    }

    #[test]
    fn test_colliding_label_name_goes_to_first_file() {
        let labels_dir = Path::new("labels");
        // both sanitize to "ab"; "a:b.json" sorts first
        let json_files = vec![PathBuf::from("a:b.json"), PathBuf::from("ab.json")];

        let assigned = assign_label_paths(&json_files, labels_dir);
        assert_eq!(assigned[0].1.as_ref().unwrap(), &labels_dir.join("ab.txt"));
        assert!(matches!(
            assigned[1].1,
            Err(ConvertError::DuplicateOutput { .. })
        ));

        let reversed: Vec<_> = json_files.iter().rev().cloned().collect();
        let assigned = assign_label_paths(&reversed, labels_dir);
        assert!(assigned[0].1.is_ok());
        assert!(assigned[1].1.is_err());
    }

    #[test]
    fn test_malformed_json_writes_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let json_path = temp_dir.path().join("broken.json");
        fs::write(&json_path, r#"{"shapes": [], "imageHeight": 10}"#).unwrap();
        let labels_dir = temp_dir.path().join("labels");
        fs::create_dir(&labels_dir).unwrap();

        let label_path = labels_dir.join("broken.txt");
        let result = convert_json_file(&json_path, &label_path, &PoseConfig::default());
        assert!(matches!(result, Err(ConvertError::Parse { .. })));
        assert!(!labels_dir.join("broken.txt").exists());
    }

    #[test]
    fn test_collect_json_files_skips_subdirectories() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        fs::write(temp_dir.path().join("b.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("nested/a.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("a.jpg"), "").unwrap();

        let files = collect_json_files(temp_dir.path());
        assert_eq!(files, vec![temp_dir.path().join("b.json")]);
    }

    #[test]
    fn test_create_dataset_yaml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = create_dataset_yaml(temp_dir.path(), &PoseConfig::default(), &["train", "val"])
            .unwrap();
        let yaml_content = fs::read_to_string(path).unwrap();

        assert!(yaml_content.contains("path:"));
        assert!(yaml_content.contains("train: image/train"));
        assert!(yaml_content.contains("val: image/val"));
        assert!(yaml_content.contains("kpt_shape: [6, 3]"));
        assert!(yaml_content.contains("names:"));
        assert!(yaml_content.contains("0: buff"));
    }
}
