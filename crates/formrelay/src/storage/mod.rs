//! Storage layer for formrelay.
//!
//! Submitted records are kept in a single JSON document mapping receipt
//! timestamps to records. Every append reloads the document from disk,
//! inserts one entry and rewrites the whole file.

pub mod document;

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::record::Record;

pub use document::Store;

/// File-backed record store.
///
/// Appends are a load-modify-store cycle with no locking. This is only
/// correct while a single writer owns the file: the message receiver is the
/// sole writer, and any additional writer must send its records through that
/// task instead of opening the file itself.
#[derive(Debug, Clone)]
pub struct RecordStore {
    /// Path to the store file.
    path: PathBuf,
}

impl RecordStore {
    /// Open the store at the given path.
    ///
    /// Creates the parent directories and an empty store file if they don't
    /// exist. An existing file is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        if path.exists() {
            debug!("Using existing record store at {}", path.display());
        } else {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| Error::StoreCreate {
                    path: path.clone(),
                    source,
                })?;
            info!("Created record store at {}", path.display());
        }

        Ok(Self { path })
    }

    /// Get the path to the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole store from disk.
    ///
    /// A missing or empty file is an empty store. A file that cannot be read
    /// or does not hold a valid store is logged and also treated as empty;
    /// its content will be replaced on the next save.
    #[must_use]
    pub fn load(&self) -> Store {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No record store at {}", self.path.display());
                return Store::new();
            }
            Err(e) => {
                error!("Cannot read from {}: {e}", self.path.display());
                return Store::new();
            }
        };

        if data.trim().is_empty() {
            return Store::new();
        }

        match serde_json::from_str(&data) {
            Ok(store) => store,
            Err(e) => {
                warn!(
                    "Record store at {} is not valid, starting empty: {e}",
                    self.path.display()
                );
                Store::new()
            }
        }
    }

    /// Rewrite the store file with the given contents.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, store: &Store) -> Result<()> {
        let json = store.to_pretty_json()?;
        std::fs::write(&self.path, json).map_err(|source| Error::StoreWrite {
            path: self.path.clone(),
            source,
        })?;
        debug!(entries = store.len(), "Record store saved");
        Ok(())
    }

    /// Add one record under `timestamp` and persist the result.
    ///
    /// Returns the number of entries now in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written. The record is not
    /// retained in that case.
    pub fn append(&self, timestamp: String, record: Record) -> Result<usize> {
        let mut store = self.load();
        if store.insert(timestamp.clone(), record).is_some() {
            warn!(%timestamp, "Timestamp collision, previous record replaced");
        }
        self.save(&store)?;
        Ok(store.len())
    }
}
