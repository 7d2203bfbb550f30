//! Storage Layer
//!
//! Locates input images, names output artifacts and writes them to disk.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::OutputMode;

/// Image suffixes picked up from the input directory (case-sensitive)
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".JPG"];

/// Get the configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("org", "textscraper", "text-scraper")
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    Ok(proj_dirs.config_dir().to_path_buf())
}

/// Whether a file name carries one of the accepted image suffixes
pub fn is_image_file(name: &str) -> bool {
    IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// List images directly inside `dir`, sorted by file name
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read input directory {:?}", dir))?;

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && is_image_file(name) {
            images.push(path);
        }
    }

    images.sort();
    Ok(images)
}

/// Output artifact name: the image name up to its first `.`, plus the mode's suffix
pub fn artifact_name(image: &Path, mode: OutputMode) -> String {
    let name = image
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_default();
    let base = name.split('.').next().unwrap_or_default();

    let suffix = match mode {
        OutputMode::Raw => "txt",
        OutputMode::Paragraph => "json",
    };
    format!("{}.{}", base, suffix)
}

/// Serialize `records` as a JSON array into `output_dir`.
///
/// The array goes to a `.<name>.tmp` file first and is renamed into place, so
/// a reader never sees a partial artifact.
pub fn write_artifact<T: Serialize>(output_dir: &Path, name: &str, records: &[T]) -> Result<PathBuf> {
    let path = output_dir.join(name);
    let tmp_path = output_dir.join(format!(".{}.tmp", name));
    let content = serde_json::to_string(records).context("Failed to serialize records")?;

    std::fs::write(&tmp_path, content).with_context(|| format!("Failed to write {:?}", tmp_path))?;
    if let Err(e) = std::fs::rename(&tmp_path, &path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("Failed to move artifact into {:?}", path));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_image_file_is_case_sensitive() {
        assert!(is_image_file("a.jpg"));
        assert!(is_image_file("a.jpeg"));
        assert!(is_image_file("a.JPG"));
        assert!(!is_image_file("a.JPEG"));
        assert!(!is_image_file("a.Jpg"));
        assert!(!is_image_file("a.png"));
        assert!(!is_image_file("jpg"));
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.jpg", "a.JPG", "c.jpeg", "notes.txt", "d.png", "e.JPEG"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let images = list_images(dir.path()).unwrap();
        let names: Vec<String> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["a.JPG", "b.jpg", "c.jpeg"]);
    }

    #[test]
    fn test_list_images_missing_dir() {
        assert!(list_images(Path::new("/nonexistent/input/dir")).is_err());
    }

    #[test]
    fn test_artifact_name() {
        assert_eq!(artifact_name(Path::new("/in/scan.jpg"), OutputMode::Paragraph), "scan.json");
        assert_eq!(artifact_name(Path::new("/in/scan.JPG"), OutputMode::Raw), "scan.txt");
        assert_eq!(artifact_name(Path::new("page.01.jpeg"), OutputMode::Paragraph), "page.json");
    }

    #[test]
    fn test_write_artifact() {
        let dir = TempDir::new().unwrap();
        let path = write_artifact(dir.path(), "out.json", &["a", "b"]).unwrap();

        assert_eq!(path, dir.path().join("out.json"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), r#"["a","b"]"#);
    }

    #[test]
    fn test_write_artifact_replaces_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        write_artifact(dir.path(), "out.json", &["old", "content", "here"]).unwrap();
        write_artifact(dir.path(), "out.json", &["new"]).unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("out.json")).unwrap(),
            r#"["new"]"#
        );
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.json")]);
    }

    #[test]
    fn test_write_artifact_missing_dir() {
        assert!(write_artifact(Path::new("/nonexistent/out"), "a.json", &["a"]).is_err());
    }

    #[test]
    fn test_write_empty_artifact() {
        let dir = TempDir::new().unwrap();
        let records: Vec<String> = Vec::new();
        let path = write_artifact(dir.path(), "empty.json", &records).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "[]");
    }
}
