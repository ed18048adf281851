//! Where a downloaded label ends up: a file, or the terminal.

use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::util::is_zip;

/// `~/Downloads`, the target folder for `--save-to-downloads`.
pub fn downloads_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("Downloads"))
        .ok_or_else(|| anyhow!("could not determine the home directory"))
}

/// Final path for a label written to `requested`.
///
/// ZIP payloads get a `.zip` suffix unless the path already ends in one
/// (case-insensitive). With `downloads` set, only the file name is kept and
/// placed in that folder.
pub fn resolve_save_path(requested: &Path, data: &[u8], downloads: Option<&Path>) -> PathBuf {
    let mut path = requested.to_path_buf();
    if is_zip(data) && !has_zip_extension(&path) {
        let mut s = path.into_os_string();
        s.push(".zip");
        path = PathBuf::from(s);
    }

    match (downloads, path.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => path,
    }
}

fn has_zip_extension(path: &Path) -> bool {
    path.to_string_lossy().to_lowercase().ends_with(".zip")
}

/// Writes `data` as-is and returns the path actually written.
pub fn save_label(data: &[u8], requested: &Path, downloads: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = downloads {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }

    let target = resolve_save_path(requested, data, downloads);
    if is_zip(data) && !has_zip_extension(requested) {
        tracing::info!("label response is a ZIP archive, saving as {}", target.display());
    }

    std::fs::write(&target, data)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(target)
}

/// Prints UTF-8 labels as text followed by a newline; anything else goes out as raw bytes.
pub fn print_label<W: Write>(data: &[u8], out: &mut W) -> Result<()> {
    let written = match std::str::from_utf8(data) {
        Ok(text) => writeln!(out, "{}", text),
        Err(_) => out.write_all(data),
    };
    written.context("failed to write label to stdout")?;
    out.flush().context("failed to flush stdout")?;
    Ok(())
}
