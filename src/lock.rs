// src/lock.rs
//! Single-instance guard: a lock file holding the owner's PID.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

pub const DEFAULT_LOCK_FILE: &str = "script_running.lock";

#[derive(Debug)]
pub enum LockOutcome {
    Acquired(LockGuard),
    AlreadyRunning(u32),
}

/// Removes the lock file when dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => info!(path = %self.path.display(), "lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove lock"),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

pub struct ProcessLock;

impl ProcessLock {
    /// Take the lock at `path`. A lock held by a live process yields
    /// [`LockOutcome::AlreadyRunning`]; a stale or unreadable lock is replaced.
    pub fn acquire(path: impl AsRef<Path>) -> Result<LockOutcome> {
        let path = path.as_ref();
        if let Some(pid) = read_owner(path) {
            if pid != std::process::id() && is_process_alive(pid) {
                warn!(pid, path = %path.display(), "another instance is running");
                return Ok(LockOutcome::AlreadyRunning(pid));
            }
            info!(pid, path = %path.display(), "removing stale lock");
            let _ = fs::remove_file(path);
        } else if path.exists() {
            warn!(path = %path.display(), "unreadable lock file, replacing");
            let _ = fs::remove_file(path);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating lock dir {}", parent.display()))?;
        }
        let mut f = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // lost a race with another starter
                let pid = read_owner(path).unwrap_or_default();
                return Ok(LockOutcome::AlreadyRunning(pid));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("creating lock {}", path.display()));
            }
        };
        let pid = std::process::id();
        write!(f, "{pid}").with_context(|| format!("writing lock {}", path.display()))?;
        info!(pid, path = %path.display(), "lock acquired");
        Ok(LockOutcome::Acquired(LockGuard {
            path: path.to_path_buf(),
            released: false,
        }))
    }
}

fn read_owner(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
pub fn is_process_alive(pid: u32) -> bool {
    pid != 0 && Path::new(&format!("/proc/{pid}")).exists()
}

/// Without procfs the owner cannot be probed; a present lock is honored.
#[cfg(not(target_os = "linux"))]
pub fn is_process_alive(pid: u32) -> bool {
    pid != 0
}
