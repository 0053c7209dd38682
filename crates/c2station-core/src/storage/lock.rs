//! Marker file held by a running console.
//!
//! While a console process owns the registries, other writers (the CLI's
//! `schedule` commands) must not rewrite them behind its back. The lock is a
//! `console.lock` file created with `create_new`, holding the owner's pid,
//! and removed when the guard drops.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;

pub const LOCK_FILE: &str = "console.lock";

/// Exclusive claim on a data directory. Released on drop.
#[derive(Debug)]
pub struct ConsoleLock {
    path: PathBuf,
}

impl ConsoleLock {
    /// Claim `dir` for this process.
    ///
    /// # Errors
    ///
    /// `StoreError::Locked` if another console already holds the directory,
    /// `StoreError::Io` if the lock file cannot be written.
    pub fn acquire(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StoreError::Locked {
                    holder: read_holder(&path).unwrap_or_else(|| "unknown".into()),
                    path,
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        if let Err(source) = writeln!(file, "{}", std::process::id()) {
            let _ = fs::remove_file(&path);
            return Err(StoreError::Io { path, source });
        }
        debug!(path = %path.display(), "console lock acquired");
        Ok(Self { path })
    }

    /// Fail with `StoreError::Locked` when a console holds `dir`.
    pub fn ensure_free(dir: &Path) -> Result<(), StoreError> {
        let path = dir.join(LOCK_FILE);
        if path.exists() {
            return Err(StoreError::Locked {
                holder: read_holder(&path).unwrap_or_else(|| "unknown".into()),
                path,
            });
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConsoleLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "could not remove console lock");
        }
    }
}

fn read_holder(path: &Path) -> Option<String> {
    let pid = fs::read_to_string(path).ok()?;
    Some(pid.trim().to_string()).filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let lock = ConsoleLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = ConsoleLock::acquire(dir.path()).unwrap_err();
        match err {
            StoreError::Locked { holder, .. } => {
                assert_eq!(holder, std::process::id().to_string())
            }
            other => panic!("expected Locked, got {other:?}"),
        }
        assert!(ConsoleLock::ensure_free(dir.path()).is_err());

        drop(lock);
        assert!(!dir.path().join(LOCK_FILE).exists());
        ConsoleLock::ensure_free(dir.path()).unwrap();
        ConsoleLock::acquire(dir.path()).unwrap();
    }

    #[test]
    fn stale_lock_without_pid_reports_unknown_holder() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(LOCK_FILE), "").unwrap();
        let err = ConsoleLock::ensure_free(dir.path()).unwrap_err();
        assert!(err.to_string().contains("unknown"), "{err}");
    }
}
