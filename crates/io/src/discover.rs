//! Snapshot discovery: pick the newest file of a subject in a drop folder.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use deltagrid_recon::registry::subject_from_file_name;

use crate::error::IoError;
use crate::format::FileFormat;

/// All readable snapshot files in `dir` whose derived subject is `subject`,
/// oldest first (modification time, then file name).
pub fn snapshots(dir: &Path, subject: &str) -> Result<Vec<PathBuf>, IoError> {
    let entries = std::fs::read_dir(dir).map_err(|e| IoError::read(dir, e))?;

    let mut found: Vec<(SystemTime, String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IoError::read(dir, e))?;
        let path = entry.path();
        if !path.is_file() || !FileFormat::from_path(&path).is_some_and(FileFormat::is_readable) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if subject_from_file_name(&name) != subject {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| IoError::read(&path, e))?;
        found.push((modified, name, path));
    }

    found.sort();
    Ok(found.into_iter().map(|(_, _, path)| path).collect())
}

/// Newest snapshot of `subject` in `dir`.
pub fn latest_snapshot(dir: &Path, subject: &str) -> Result<PathBuf, IoError> {
    let latest = snapshots(dir, subject)?
        .pop()
        .ok_or_else(|| IoError::NotFound {
            dir: dir.to_path_buf(),
            subject: subject.to_string(),
        })?;
    log::debug!("discover: latest '{subject}' snapshot is {}", latest.display());
    Ok(latest)
}
