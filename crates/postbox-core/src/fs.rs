//! Owner-only, crash-safe file writes.
//!
//! A write is split into [`stage`] (temp file next to the target, fsynced)
//! and [`commit`] (rename over the target). Readers only ever open the
//! target path, so they see either the previous complete file or the new one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static STAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates `dir` (and parents) and restricts it to the current user.
pub fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Writes `contents` to a fresh owner-only temp file beside `path`.
pub fn stage(path: &Path, contents: &[u8]) -> io::Result<PathBuf> {
    let staged = staging_path(path);
    let mut file = create_private(&staged)?;
    let written = file
        .write_all(contents)
        .and_then(|()| file.sync_all());
    if let Err(err) = written {
        let _ = fs::remove_file(&staged);
        return Err(err);
    }
    Ok(staged)
}

/// Moves a staged file over `path`.
pub fn commit(staged: &Path, path: &Path) -> io::Result<()> {
    if let Err(err) = fs::rename(staged, path) {
        let _ = fs::remove_file(staged);
        return Err(err);
    }
    Ok(())
}

pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let staged = stage(path, contents)?;
    commit(&staged, path)
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = STAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}
