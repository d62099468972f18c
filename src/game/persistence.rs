//! Q-table persistence
//!
//! The table is stored as a flat `"ax,ay,tx,ty-dx-dy" -> value` map, either as
//! JSON or bincode depending on the file extension. Writes are batched by
//! [`TableSync`]; the owner flushes once more on shutdown.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::game::systems::qlearning::{KeyParseError, QTable};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    MalformedKey(#[from] KeyParseError),
}

/// Loadable, saveable snapshot of the full Q-table
pub trait QTableStore: Send {
    /// Read the stored table; a missing table is empty, not an error
    fn load(&self) -> Result<QTable, PersistenceError>;

    /// Replace the stored table
    fn save(&self, table: &QTable) -> Result<(), PersistenceError>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// On-disk encoding of the flat table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Json,
    Bincode,
}

impl TableFormat {
    /// `.bin` files use bincode, everything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => TableFormat::Bincode,
            _ => TableFormat::Json,
        }
    }

    fn encode(self, flat: &BTreeMap<String, f32>) -> Result<Vec<u8>, PersistenceError> {
        match self {
            TableFormat::Json => Ok(serde_json::to_vec_pretty(flat)?),
            TableFormat::Bincode => bincode::serde::encode_to_vec(flat, bincode::config::standard())
                .map_err(|e| PersistenceError::Encode(e.to_string())),
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<BTreeMap<String, f32>, PersistenceError> {
        match self {
            TableFormat::Json => Ok(serde_json::from_slice(bytes)?),
            TableFormat::Bincode => {
                bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                    .map(|(flat, _)| flat)
                    .map_err(|e| PersistenceError::Decode(e.to_string()))
            }
        }
    }
}

/// Table stored in a single file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    format: TableFormat,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = TableFormat::from_path(&path);
        Self { path, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }
}

impl QTableStore for FileStore {
    fn load(&self) -> Result<QTable, PersistenceError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "No Q-table found, starting empty");
                return Ok(QTable::new());
            }
            Err(e) => return Err(e.into()),
        };
        let flat = self.format.decode(&bytes)?;
        Ok(QTable::from_flat(flat)?)
    }

    fn save(&self, table: &QTable) -> Result<(), PersistenceError> {
        let bytes = self.format.encode(&table.to_flat())?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        // Staged write, then rename over the old table
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Load the table, falling back to an empty one on any failure
pub fn load_or_empty(store: &dyn QTableStore) -> QTable {
    match store.load() {
        Ok(table) => {
            tracing::info!(
                location = %store.location(),
                entries = table.len(),
                "Q-table loaded"
            );
            table
        }
        Err(e) => {
            tracing::error!(
                location = %store.location(),
                error = %e,
                "Failed to load Q-table, starting empty"
            );
            QTable::new()
        }
    }
}

/// Batched write-back of table updates
pub struct TableSync {
    store: Option<Box<dyn QTableStore>>,
    flush_every: u32,
    pending: u32,
}

impl TableSync {
    pub fn new(store: Option<Box<dyn QTableStore>>, flush_every: u32) -> Self {
        Self {
            store,
            flush_every: flush_every.max(1),
            pending: 0,
        }
    }

    /// No backing store: updates stay in memory
    pub fn detached() -> Self {
        Self::new(None, 1)
    }

    pub fn is_attached(&self) -> bool {
        self.store.is_some()
    }

    /// Updates not yet written
    pub fn pending(&self) -> u32 {
        self.pending
    }

    /// Count one table update, flushing once enough have accumulated
    pub fn record_update(&mut self, table: &QTable) {
        if self.store.is_none() {
            return;
        }
        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush(table);
        }
    }

    /// Write the table if anything changed since the last write; returns whether a write succeeded
    pub fn flush(&mut self, table: &QTable) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        if self.pending == 0 {
            return false;
        }
        match store.save(table) {
            Ok(()) => {
                self.pending = 0;
                tracing::info!(
                    location = %store.location(),
                    entries = table.len(),
                    "Q-table saved"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    location = %store.location(),
                    pending = self.pending,
                    error = %e,
                    "Failed to save Q-table, keeping updates pending"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for TableSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSync")
            .field("store", &self.store.as_ref().map(|s| s.location()))
            .field("flush_every", &self.flush_every)
            .field("pending", &self.pending)
            .finish()
    }
}
