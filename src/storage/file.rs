//! File-backed platform store.
//!
//! The full snapshot is kept in memory and persisted as one JSON file on
//! every commit. Atomic writes are achieved via the temp file + rename
//! pattern, so a crash mid-write leaves the previous snapshot intact. If
//! persisting fails the in-memory snapshot is not advanced either, keeping
//! memory and disk in agreement.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Result, TrailheadError};
use crate::storage::{Database, Store};

/// File-backed platform store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: RwLock<Database>,
}

impl FileStore {
    /// Open a store at the given snapshot path, loading it if it exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| TrailheadError::storage(parent, e))?;
            }
        }

        let db = if path.exists() {
            let content =
                fs::read_to_string(&path).map_err(|e| TrailheadError::storage(&path, e))?;
            serde_json::from_str(&content)?
        } else {
            Database::new()
        };

        Ok(Self {
            path,
            inner: RwLock::new(db),
        })
    }

    /// The snapshot path this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write a snapshot atomically using temp file + rename.
    fn persist(&self, db: &Database) -> Result<()> {
        let temp_path = self.temp_path();
        let json = serde_json::to_string_pretty(db)?;

        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| TrailheadError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| TrailheadError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| TrailheadError::storage(&temp_path, e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| TrailheadError::storage(&self.path, e))?;
        Ok(())
    }
}

impl Store for FileStore {
    fn with_read<T>(&self, f: impl FnOnce(&Database) -> T) -> T {
        let db = self.inner.read().unwrap();
        f(&db)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut db = self.inner.write().unwrap();
        let mut scratch = db.clone();
        let value = f(&mut scratch)?;
        self.persist(&scratch)?;
        *db = scratch;
        Ok(value)
    }
}
