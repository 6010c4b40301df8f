// src/history/store.rs
//! Whole-document persistence behind a small trait.
//!
//! A document is read whole and replaced whole. There is no patching: every
//! write produces a complete new document, swapped into place atomically by the
//! file backend (temp file + rename), so a crash mid-write leaves the previous
//! version intact.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the document does not exist yet.
    fn read(&self, key: &str) -> io::Result<Option<String>>;

    /// Replace the document with `contents`.
    fn write(&self, key: &str, contents: &str) -> io::Result<()>;

    /// Human-readable location for logs.
    fn locate(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Documents are files; the key is a path, optionally resolved under a root.
#[derive(Debug, Clone, Default)]
pub struct FileStore {
    root: Option<PathBuf>,
}

impl FileStore {
    pub fn new() -> Self {
        Self { root: None }
    }

    pub fn rooted<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(key),
            None => PathBuf::from(key),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    PathBuf::from(s)
}

fn write_then_swap(tmp: &Path, path: &Path, contents: &str) -> io::Result<()> {
    let mut f = fs::File::create(tmp)?;
    f.write_all(contents.as_bytes())?;
    f.sync_all()?;
    drop(f);
    fs::rename(tmp, path)
}

impl DocumentStore for FileStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(&path);
        let res = write_then_swap(&tmp, &path, contents);
        if res.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        res
    }

    fn locate(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }
}

/// In-process documents for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw document, e.g. a corrupt one.
    pub fn insert_raw(&self, key: &str, contents: &str) {
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), contents.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl DocumentStore for MemoryStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, contents: &str) -> io::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "writes disabled"));
        }
        self.insert_raw(key, contents);
        Ok(())
    }

    fn locate(&self, key: &str) -> String {
        format!("memory:{key}")
    }
}
