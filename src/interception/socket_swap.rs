// src/interception/socket_swap.rs
//! Canonical socket path substitution
//!
//! Interception moves the daemon's socket aside (`<path>.<suffix>`) so a
//! substitute listener can be bound at the canonical path. The swap is a
//! scoped acquisition: [`SocketSwap::intercept`] acquires, [`SocketSwap::restore`]
//! (or `Drop`, as a fallback) releases by renaming the aside socket back over
//! whatever occupies the canonical path. `rename(2)` replaces the substitute
//! atomically, so clients never see an empty canonical path after release.

use crate::utils::errors::{Result, SpyError};
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Build the aside path for `canonical`
pub fn aside_path(canonical: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = canonical.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    name.into()
}

/// An active interception of one socket path
#[derive(Debug)]
pub struct SocketSwap {
    canonical: PathBuf,
    aside: PathBuf,
    restored: bool,
}

impl SocketSwap {
    /// Move the socket at `canonical` aside
    ///
    /// Refuses to start when the canonical path is missing or is not a socket,
    /// or when a previous run left the aside path behind. In those cases
    /// neither path is touched.
    pub fn intercept<P: AsRef<Path>>(canonical: P, suffix: &str) -> Result<Self> {
        let canonical = canonical.as_ref().to_path_buf();
        let aside = aside_path(&canonical, suffix);

        let metadata = fs::symlink_metadata(&canonical).map_err(|e| {
            SpyError::InterceptionFailed(format!("{}: {}", canonical.display(), e))
        })?;

        if !metadata.file_type().is_socket() {
            return Err(SpyError::InterceptionFailed(format!(
                "{} is not a socket",
                canonical.display()
            )));
        }

        if fs::symlink_metadata(&aside).is_ok() {
            return Err(SpyError::InterceptionFailed(format!(
                "{} already exists; a previous interception was not restored",
                aside.display()
            )));
        }

        fs::rename(&canonical, &aside).map_err(|e| {
            SpyError::InterceptionFailed(format!(
                "Failed to move {} aside: {}",
                canonical.display(),
                e
            ))
        })?;

        info!("Moved {:?} to {:?}", canonical, aside);

        Ok(Self {
            canonical,
            aside,
            restored: false,
        })
    }

    /// Path clients connect to
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    /// Path the daemon's socket was moved to
    pub fn aside(&self) -> &Path {
        &self.aside
    }

    /// Put the daemon's socket back at the canonical path
    pub fn restore(mut self) -> Result<()> {
        self.restore_in_place()
    }

    fn restore_in_place(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }

        fs::rename(&self.aside, &self.canonical).map_err(|e| {
            SpyError::RestoreFailed(format!(
                "{} -> {}: {}",
                self.aside.display(),
                self.canonical.display(),
                e
            ))
        })?;

        self.restored = true;
        info!("Restored socket {:?}", self.canonical);
        Ok(())
    }
}

impl Drop for SocketSwap {
    fn drop(&mut self) {
        if !self.restored {
            warn!("Socket swap dropped without explicit restore");
            if let Err(e) = self.restore_in_place() {
                error!("{}", e);
            }
        }
    }
}
