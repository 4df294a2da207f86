use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;

use crate::error::ExportError;
use crate::model::image::ImageFormat;
use crate::model::item::BatchItem;

const EXPORT_PREFIX: &str = "enhanced-";

fn data_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^data:(?P<mime>[\w.+-]+/[\w.+-]+);base64,(?P<data>[A-Za-z0-9+/=\s]*)$")
            .expect("data URL pattern is valid")
    })
}

/// Decoded `data:{mime};base64,{payload}`.
#[derive(Debug, PartialEq, Eq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn parse_data_url(url: &str) -> Result<DataUrl, ExportError> {
    let caps = data_url_pattern()
        .captures(url.trim())
        .ok_or(ExportError::MalformedDataUrl)?;

    let payload: String = caps["data"].split_whitespace().collect();
    let bytes = STANDARD.decode(payload)?;

    Ok(DataUrl {
        mime_type: caps["mime"].to_string(),
        bytes,
    })
}

/// Writes a completed item's edited image into `dir` as
/// `enhanced-{original stem}.{ext}` and returns the path. `position` is
/// appended to the stem (`enhanced-{stem}-{position}.{ext}`) so items sharing
/// a file name do not overwrite each other. Exporting the same item twice
/// replaces the earlier file.
pub fn export_item(
    item: &BatchItem,
    dir: &Path,
    position: Option<usize>,
) -> Result<PathBuf, ExportError> {
    let url = item
        .result()
        .and_then(|r| r.image_url())
        .ok_or_else(|| ExportError::NoImage(item.id.clone()))?;

    let decoded = parse_data_url(url)?;

    let ext = ImageFormat::from_mime(&decoded.mime_type)
        .unwrap_or(ImageFormat::Png)
        .extension();

    let stem = Path::new(&item.source.file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    let name = match position {
        Some(pos) => format!("{EXPORT_PREFIX}{stem}-{pos}.{ext}"),
        None => format!("{EXPORT_PREFIX}{stem}.{ext}"),
    };
    let path = dir.join(name);
    write_atomic(&path, &decoded.bytes)?;

    tracing::info!(item = %item.id, path = %path.display(), "edited image exported");
    Ok(path)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    fs::write(&tmp, bytes).map_err(io_err)?;

    if path.exists() {
        fs::remove_file(path).map_err(io_err)?;
    }

    fs::rename(&tmp, path).map_err(io_err)?;

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "export".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}
