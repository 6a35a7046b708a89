//! Crash-safe file replacement.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Temporary sibling used while replacing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `bytes`: write a temp sibling, fsync, rename.
///
/// A crash at any point leaves either the previous file or the new one,
/// never a torn write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    commit_temp(&tmp, path)?;

    debug!(path = ?path, bytes = bytes.len(), "Wrote file atomically");
    Ok(())
}

/// Rename an already-written temp file over `path`.
pub fn commit_temp(tmp: &Path, path: &Path) -> std::io::Result<()> {
    fs::rename(tmp, path)?;
    if let Some(parent) = path.parent() {
        // Persist the rename itself; not supported on every platform
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}
