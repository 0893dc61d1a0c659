//! Packaging the workspace into a zip archive

use crate::error::{Error, Result};
use crate::workspace::sanitize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// File name for the archive of a run
///
/// ```
/// use repo_collector::archive::archive_name;
///
/// assert_eq!(
///     archive_name("trading bot", "2026-03-04_09h05m"),
///     "GITHUB_trading_bot_2026-03-04_09h05m.zip"
/// );
/// ```
pub fn archive_name(query: &str, timestamp: &str) -> String {
    format!("GITHUB_{}_{}.zip", sanitize(query), timestamp)
}

/// Zip everything under `source` into `destination`
///
/// Entry names are relative to `source` and always use `/`. Returns the
/// number of files written.
pub fn create_archive(source: &Path, destination: &Path) -> Result<usize> {
    if destination.starts_with(source) {
        return Err(Error::config(
            "workspace.output_dir",
            "archive destination must be outside the workspace",
        ));
    }

    let file = File::create(destination)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut files = 0usize;
    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        let path = entry.path();
        let Some(name) = entry_name(source, path) else {
            continue;
        };

        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            let mut input = File::open(path)?;
            std::io::copy(&mut input, &mut writer)?;
            files += 1;
        } else {
            debug!(path = %path.display(), "skipping non-regular file");
        }
    }

    let mut inner = writer.finish()?;
    inner.flush()?;

    info!(path = %destination.display(), files, "archive created");
    Ok(files)
}

/// Archive path for a run inside `output_dir`
pub fn archive_path(output_dir: &Path, query: &str, timestamp: &str) -> PathBuf {
    output_dir.join(archive_name(query, timestamp))
}

/// Relative `/`-separated name, `None` for the root itself
fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
