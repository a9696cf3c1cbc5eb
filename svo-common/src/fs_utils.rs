//! Atomic file writes (temp file + rename)
//!
//! Writers in this workspace never leave a truncated destination behind:
//! content goes to a sibling `<name>.tmp` file which is synced and then
//! renamed over the destination. If any step fails the temp file is removed
//! and the destination is left untouched.

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Sibling temp path used while writing `path`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `contents` to `path` atomically
///
/// Parent directories are created if missing.
///
/// # Errors
/// Returns `Error::Io` if the temp file cannot be written or renamed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);

    let outcome = write_and_sync(&temp_path, contents)
        .and_then(|()| fs::rename(&temp_path, path));

    if let Err(err) = outcome {
        if temp_path.exists() {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                tracing::warn!(
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Failed to remove temp file after aborted write"
                );
            }
        }
        return Err(Error::Io(err));
    }

    Ok(())
}

fn write_and_sync(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}
