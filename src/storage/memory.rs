//! In-memory platform store.
//!
//! Thread-safe implementation backed by `RwLock<Database>`. Transactions run
//! against a scratch copy under the write lock and replace the snapshot on
//! commit, so an erroring closure leaves no trace. Used by tests and by
//! embedders that manage persistence themselves.

use std::sync::RwLock;

use crate::error::Result;
use crate::storage::{Database, Store};

/// In-memory platform store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Database>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an existing snapshot.
    pub fn with_database(db: Database) -> Self {
        Self {
            inner: RwLock::new(db),
        }
    }

    /// Clone the current snapshot.
    pub fn snapshot(&self) -> Database {
        self.inner.read().unwrap().clone()
    }
}

impl Store for MemoryStore {
    fn with_read<T>(&self, f: impl FnOnce(&Database) -> T) -> T {
        let db = self.inner.read().unwrap();
        f(&db)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut db = self.inner.write().unwrap();
        let mut scratch = db.clone();
        let value = f(&mut scratch)?;
        *db = scratch;
        Ok(value)
    }
}
