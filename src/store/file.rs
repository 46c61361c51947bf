//! JSON snapshot backend
//!
//! Wraps [`MemoryStore`] and rewrites the whole snapshot after every commit
//! (temp file + rename). A failed write rolls the unit back.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::memory::{MemoryStore, Tables};
use super::Store;
use crate::error::Result;

/// Store persisted to a single JSON file
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the snapshot at `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let tables: Tables = serde_json::from_str(&content)?;
            info!(
                path = %path.display(),
                entities = tables.entity_count(),
                refs = tables.ref_count(),
                "loaded catalog snapshot"
            );
            tables
        } else {
            debug!(path = %path.display(), "no snapshot yet, starting empty");
            Tables::default()
        };

        Ok(Self {
            path,
            inner: MemoryStore::with_tables(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(path: &Path, tables: &Tables) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(tables)?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), "snapshot written");
        Ok(())
    }
}

impl Store for FileStore {
    type Txn = Tables;

    fn run_atomic<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Tables) -> Result<R>,
    {
        let path = &self.path;
        self.inner.run_atomic_with(f, |tables| Self::persist(path, tables))
    }

    fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Tables) -> Result<R>,
    {
        self.inner.read(f)
    }
}
