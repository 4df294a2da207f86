use std::fs;
use std::path::{Path, PathBuf};

use crate::error::InputError;
use crate::model::image::{ImageFormat, SourceImage};

/// Reads the selected files in order. The first unreadable or unsupported
/// file fails the whole selection. Size is not limited here.
pub fn load_images<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<SourceImage>, InputError> {
    paths.iter().map(|p| load_image(p.as_ref())).collect()
}

pub fn load_image(path: &Path) -> Result<SourceImage, InputError> {
    let bytes = fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if bytes.is_empty() {
        return Err(InputError::EmptyFile(path.to_path_buf()));
    }

    let format = ImageFormat::sniff(&bytes)
        .or_else(|| {
            path.extension()
                .and_then(|e| e.to_str())
                .and_then(ImageFormat::from_extension)
        })
        .ok_or_else(|| InputError::UnsupportedFormat(path.to_path_buf()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    tracing::debug!(file = %file_name, format = ?format, bytes = bytes.len(), "image loaded");

    Ok(SourceImage::new(file_name, format, bytes))
}

pub fn to_paths(raw: &[String]) -> Vec<PathBuf> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
