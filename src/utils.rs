use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

/// Helper function to infer image format from image bytes
pub fn infer_image_format(image_bytes: &[u8]) -> Option<&'static str> {
    if image_bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if image_bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("png")
    } else if image_bytes.starts_with(b"BM") {
        Some("bmp")
    } else if image_bytes.starts_with(&[0x47, 0x49, 0x46]) {
        Some("gif")
    } else {
        None
    }
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .progress_chars("#>-"),
    );
    pb
}

/// Create a directory (and its parents) if it does not exist yet.
/// Existing content is left untouched.
pub fn ensure_directory(path: &Path) -> std::io::Result<PathBuf> {
    if !path.exists() {
        log::info!("Creating directory: {}", path.display());
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// Files directly inside `dir` whose extension matches `extension`
/// (case-insensitive), sorted by file name.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, &[extension]) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Case-insensitive extension check against a list of extensions without dots.
pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// The file stem as an owned, filesystem-safe string.
pub fn sanitized_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(sanitize_filename::sanitize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_infer_image_format() {
        let jpg_bytes = vec![0xFF, 0xD8, 0xFF];
        let png_bytes = vec![0x89, b'P', b'N', b'G'];
        let bmp_bytes = vec![b'B', b'M'];
        let gif_bytes = vec![0x47, 0x49, 0x46];
        let unknown_bytes = vec![0x00, 0x00, 0x00];

        assert_eq!(infer_image_format(&jpg_bytes), Some("jpg"));
        assert_eq!(infer_image_format(&png_bytes), Some("png"));
        assert_eq!(infer_image_format(&bmp_bytes), Some("bmp"));
        assert_eq!(infer_image_format(&gif_bytes), Some("gif"));
        assert_eq!(infer_image_format(&unknown_bytes), None);
    }

    #[test]
    fn test_list_files_with_extension() {
        let temp_dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.JSON", "c.txt"] {
            File::create(temp_dir.path().join(name)).unwrap();
        }
        fs::create_dir(temp_dir.path().join("nested.json")).unwrap();

        let files = list_files_with_extension(temp_dir.path(), "json").unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json"]);
    }

    #[test]
    fn test_ensure_directory_keeps_content() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("label/train");
        ensure_directory(&dir).unwrap();
        File::create(dir.join("keep.txt")).unwrap();
        ensure_directory(&dir).unwrap();
        assert!(dir.join("keep.txt").exists());
    }

    #[test]
    fn test_sanitized_stem() {
        assert_eq!(sanitized_stem(Path::new("dir/0001.json")).as_deref(), Some("0001"));
        assert_eq!(sanitized_stem(Path::new("dir/a:b.json")).as_deref(), Some("ab"));
    }
}
