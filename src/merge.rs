//! Append an externally labelled `img/` + `txt/` folder to the train split,
//! numbering the new files after the largest numeric name already there.

use log::{error, info, warn};
use std::fs;
use std::path::Path;

use crate::config::MergeArgs;
use crate::types::get_image_extensions_set;
use crate::utils::{create_progress_bar, ensure_directory};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeStats {
    pub merged: usize,
    pub skipped: usize,
    pub last_number: u64,
}

/// Largest file stem in `dir` made only of ASCII digits, 0 if there is none
/// or the directory does not exist.
pub fn max_file_number(dir: &Path) -> std::io::Result<u64> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut max_num = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(num) = stem.parse::<u64>() {
            max_num = max_num.max(num);
        }
    }
    Ok(max_num)
}

fn is_image(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

/// Copy every image of `source_img_dir` that has a same-stem label in
/// `source_label_dir`, renaming the pair to consecutive numbers.
pub fn merge_labelled_dir(
    source_img_dir: &Path,
    source_label_dir: &Path,
    dest_img_dir: &Path,
    dest_label_dir: &Path,
) -> std::io::Result<MergeStats> {
    ensure_directory(dest_img_dir)?;
    ensure_directory(dest_label_dir)?;

    let mut current = max_file_number(dest_img_dir)?.max(max_file_number(dest_label_dir)?);
    info!("Current largest number: {}", current);
    info!("New files start at {}", current + 1);

    let mut images: Vec<_> = fs::read_dir(source_img_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    images.sort();
    if images.is_empty() {
        warn!("No images found in {}", source_img_dir.display());
        return Ok(MergeStats {
            last_number: current,
            ..MergeStats::default()
        });
    }
    info!("Found {} images to merge", images.len());

    let mut stats = MergeStats::default();
    let pb = create_progress_bar(images.len() as u64, "Merge");
    for image_path in &images {
        pb.inc(1);
        let (Some(stem), Some(ext)) = (image_path.file_stem(), image_path.extension()) else {
            stats.skipped += 1;
            continue;
        };
        let mut label_name = stem.to_os_string();
        label_name.push(".txt");
        let label_path = source_label_dir.join(label_name);
        if !label_path.is_file() {
            stats.skipped += 1;
            continue;
        }

        // numbers are only consumed by pairs that were copied in full
        let next = current + 1;
        let dest_image = dest_img_dir.join(next.to_string()).with_extension(ext);
        let dest_label = dest_label_dir.join(next.to_string()).with_extension("txt");
        let copied = fs::copy(image_path, &dest_image)
            .and_then(|_| fs::copy(&label_path, &dest_label));
        match copied {
            Ok(_) => {
                current = next;
                stats.merged += 1;
            }
            Err(e) => {
                error!("Failed to copy {}: {}", image_path.display(), e);
                stats.skipped += 1;
            }
        }
    }
    pb.finish_with_message("Merge complete");

    stats.last_number = current;
    Ok(stats)
}

/// Merge `<source>/img` + `<source>/txt` into `<work>/image/train` + `<work>/label/train`.
pub fn run_merge(args: &MergeArgs) -> Result<MergeStats, Box<dyn std::error::Error>> {
    let source_img_dir = args.source_dir.join("img");
    let source_label_dir = args.source_dir.join("txt");
    for dir in [&source_img_dir, &source_label_dir] {
        if !dir.is_dir() {
            return Err(format!("Source directory not found: {}", dir.display()).into());
        }
    }

    let work_dir = args.dirs.work_dir();
    let stats = merge_labelled_dir(
        &source_img_dir,
        &source_label_dir,
        &work_dir.join("image").join("train"),
        &work_dir.join("label").join("train"),
    )?;

    info!("=== Merge Summary ===");
    info!("Merged pairs: {}", stats.merged);
    info!("Skipped images: {}", stats.skipped);
    info!("Largest number now: {}", stats.last_number);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_file_number() {
        let temp_dir = tempfile::tempdir().unwrap();
        for name in ["7.jpg", "12.txt", "abc.png", "3a.jpg", "0009.png"] {
            fs::write(temp_dir.path().join(name), "").unwrap();
        }
        assert_eq!(max_file_number(temp_dir.path()).unwrap(), 12);
        assert_eq!(max_file_number(&temp_dir.path().join("absent")).unwrap(), 0);
    }

    #[test]
    fn test_merge_renumbers_after_existing_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let (src_img, src_txt) = (root.join("src/img"), root.join("src/txt"));
        let (dst_img, dst_txt) = (root.join("dst/image"), root.join("dst/label"));
        for dir in [&src_img, &src_txt, &dst_img, &dst_txt] {
            fs::create_dir_all(dir).unwrap();
        }
        fs::write(dst_img.join("4.jpg"), "old").unwrap();
        fs::write(dst_txt.join("5.txt"), "old").unwrap();

        fs::write(src_img.join("a.jpg"), "a").unwrap();
        fs::write(src_txt.join("a.txt"), "label a").unwrap();
        fs::write(src_img.join("b.PNG"), "b").unwrap();
        fs::write(src_txt.join("b.txt"), "label b").unwrap();
        fs::write(src_img.join("c.jpg"), "c").unwrap();
        fs::write(src_img.join("notes.md"), "ignored").unwrap();

        let stats = merge_labelled_dir(&src_img, &src_txt, &dst_img, &dst_txt).unwrap();

        assert_eq!(stats.merged, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.last_number, 7);
        assert_eq!(fs::read_to_string(dst_img.join("6.jpg")).unwrap(), "a");
        assert_eq!(fs::read_to_string(dst_txt.join("6.txt")).unwrap(), "label a");
        assert_eq!(fs::read_to_string(dst_img.join("7.PNG")).unwrap(), "b");
        assert_eq!(fs::read_to_string(dst_txt.join("7.txt")).unwrap(), "label b");
    }

    #[test]
    fn test_merge_pairs_dotted_names_by_full_stem() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let (src_img, src_txt) = (root.join("img"), root.join("txt"));
        let (dst_img, dst_txt) = (root.join("image"), root.join("label"));
        fs::create_dir_all(&src_img).unwrap();
        fs::create_dir_all(&src_txt).unwrap();
        fs::write(src_img.join("shot.v2.jpg"), "v2").unwrap();
        fs::write(src_txt.join("shot.v2.txt"), "label v2").unwrap();
        // must not be picked up for shot.v2.jpg
        fs::write(src_txt.join("shot.txt"), "label shot").unwrap();

        let stats = merge_labelled_dir(&src_img, &src_txt, &dst_img, &dst_txt).unwrap();

        assert_eq!(stats.merged, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(fs::read_to_string(dst_img.join("1.jpg")).unwrap(), "v2");
        assert_eq!(fs::read_to_string(dst_txt.join("1.txt")).unwrap(), "label v2");
    }
}
