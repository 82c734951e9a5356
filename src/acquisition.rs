//! Read access to the files the analysis pipeline drops per acquisition:
//! the JSON parameter file, raw detector signals and rendered plots.

use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::json_io::read_json_lenient;
use crate::models::{Category, DateKey, Detector};
use crate::paths::{signal_download_name, PathResolver};

/// `.json` entries of a day (or legacy month) `JSON` directory, sorted.
///
/// The directory is created when absent, so a fresh day lists as `[]`.
pub async fn list_json_files(resolver: &PathResolver, date: &DateKey) -> StoreResult<Vec<String>> {
    let dir = resolver.json_dir(date);
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| StoreError::from_io(&dir, e))?;

    let mut entries = tokio::fs::read_dir(&dir)
        .await
        .map_err(|e| StoreError::from_io(&dir, e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::from_io(&dir, e))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".json") && !name.starts_with('.') {
            files.push(name);
        }
    }
    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "listed acquisitions");
    Ok(files)
}

/// Acquisitions of a day only (`data-*.json`), newest first.
pub fn newest_first(files: &[String]) -> Vec<String> {
    let mut out: Vec<String> = files
        .iter()
        .filter(|f| f.starts_with("data-") && f.ends_with(".json"))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.cmp(a));
    out
}

/// Parsed acquisition JSON, with non-finite tokens read as `null`.
pub async fn read_acquisition(resolver: &PathResolver, filename: &str) -> StoreResult<Value> {
    let (_, path) = resolver.acquisition_path(filename)?;
    debug!(path = %path.display(), "reading acquisition");
    read_json_lenient(&path).await
}

/// A file located on disk together with the name it is offered under.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub download_name: String,
}

/// Raw signal text of one detector. Fails with `NotFound` if absent.
pub async fn locate_signal(
    resolver: &PathResolver,
    filename: &str,
    detector: &Detector,
) -> StoreResult<ResolvedFile> {
    let acq = codec::parse_acquisition(filename)?;
    let path = resolver.signal_path(filename, detector)?;
    ensure_file(&path).await?;
    Ok(ResolvedFile {
        path,
        download_name: signal_download_name(&acq, detector, "txt"),
    })
}

/// Signal converted to CSV.
pub async fn read_signal_csv(
    resolver: &PathResolver,
    filename: &str,
    detector: &Detector,
) -> StoreResult<(String, String)> {
    let acq = codec::parse_acquisition(filename)?;
    let path = resolver.signal_path(filename, detector)?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| StoreError::from_io(&path, e))?;
    Ok((
        signal_to_csv(&text),
        signal_download_name(&acq, detector, "csv"),
    ))
}

/// Whitespace-separated columns become comma-separated. A leading `#`
/// (header line) is stripped, blank lines are dropped.
pub fn signal_to_csv(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let line = line.trim();
        let line = line.strip_prefix('#').unwrap_or(line).trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Plot of one detector, or of a combined view when `category` is
/// `Together` / `Same`. `image_name` may end in `.png` or `.json`.
pub async fn locate_image(
    resolver: &PathResolver,
    image_name: &str,
    category: &Category,
) -> StoreResult<PathBuf> {
    let filename = codec::validate_image_name(image_name)?;
    let path = match category {
        Category::Detector(d) => resolver.image_path(&filename, d)?,
        Category::Together | Category::Same => resolver.combined_image_path(&filename, category)?,
        Category::Json => {
            return Err(StoreError::InvalidFilename(
                "JSON is not an image directory".to_string(),
            ))
        }
    };
    ensure_file(&path).await?;
    Ok(path)
}

async fn ensure_file(path: &std::path::Path) -> StoreResult<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| StoreError::from_io(path, e))?;
    if !meta.is_file() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }
    Ok(())
}
