use crate::error::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Every file the store creates starts with this prefix, which keeps them
/// hidden and lets `clear` tell them apart from anything else in the directory
pub const SNAPSHOT_PREFIX: &str = ".snapshot-";

pub trait FileStore {
    /// Copy `source` byte-for-byte to a fresh path inside the store and
    /// return that path
    fn copy_to_temp(&self, source: &Path) -> AppResult<PathBuf>;

    fn delete(&self, path: &Path) -> AppResult<()>;

    fn read(&self, path: &Path) -> AppResult<Vec<u8>>;

    fn write(&self, path: &Path, contents: &[u8]) -> AppResult<()>;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Numbered snapshot files in one hidden directory
#[derive(Debug)]
pub struct TempFileStore {
    dir: PathBuf,
    counter: AtomicU64,
}

impl TempFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| AppError::storage(&dir, e))?;
        Ok(Self {
            dir,
            counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove snapshot files left behind by an earlier session
    pub fn clear(&self) -> AppResult<usize> {
        let entries = fs::read_dir(&self.dir).map_err(|e| AppError::storage(&self.dir, e))?;
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_snapshot = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(SNAPSHOT_PREFIX));
            if !is_snapshot || !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(target: "storage", "Could not remove {}: {}", path.display(), e),
            }
        }
        info!(target: "storage", "Cleared {} stale snapshot files from {}", removed, self.dir.display());
        Ok(removed)
    }

    fn next_path(&self, source: &Path) -> PathBuf {
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        loop {
            let n = self.counter.fetch_add(1, Ordering::Relaxed);
            let candidate = self
                .dir
                .join(format!("{}{:04}{}", SNAPSHOT_PREFIX, n, extension));
            if !candidate.exists() {
                return candidate;
            }
        }
    }
}

impl FileStore for TempFileStore {
    fn copy_to_temp(&self, source: &Path) -> AppResult<PathBuf> {
        let target = self.next_path(source);
        fs::copy(source, &target).map_err(|e| AppError::storage(source, e))?;
        debug!(target: "storage", "Copied {} -> {}", source.display(), target.display());
        Ok(target)
    }

    fn delete(&self, path: &Path) -> AppResult<()> {
        fs::remove_file(path).map_err(|e| AppError::storage(path, e))?;
        debug!(target: "storage", "Deleted {}", path.display());
        Ok(())
    }

    fn read(&self, path: &Path) -> AppResult<Vec<u8>> {
        fs::read(path).map_err(|e| AppError::storage(path, e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> AppResult<()> {
        fs::write(path, contents).map_err(|e| AppError::storage(path, e))
    }
}
