//=========================================================================
// Storage Backends
//=========================================================================
//
// Byte-level read/write contract the persistence pipeline writes
// snapshots through. Keys are relative, slash-separated paths such as
// `saves/autosave.json`.
//
// Backends:
// - `LocalFileStorage`: files under a root directory, replaced atomically
// - `MemoryStorage`: in-process map (remote stand-in, tests)
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use thiserror::Error;

//=== StorageError ========================================================

#[derive(Debug, Error)]
pub enum StorageError {
    /// Nothing is stored under the key.
    #[error("nothing stored at {0}")]
    NotFound(String),

    /// The backend failed to read or write the key.
    #[error("i/o failure at {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
}

//=== StorageBackend ======================================================

/// Read/write contract shared by every snapshot store.
pub trait StorageBackend: Send + Sync {
    /// Stores `bytes` under `key`.
    ///
    /// Either the whole value is stored or the previous value under `key`
    /// is left as it was.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Reads the value stored under `key`.
    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

//=== StorageConfig =======================================================

/// Selects the backend the shell builds its pipeline on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// Files under `root` (slots land in `root/saves/`).
    Local { root: PathBuf },
    /// Process-local map; nothing survives the process.
    InMemory,
}

impl StorageConfig {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self::Local { root: root.into() }
    }

    pub fn build(&self) -> Arc<dyn StorageBackend> {
        match self {
            Self::Local { root } => Arc::new(LocalFileStorage::new(root.clone())),
            Self::InMemory => Arc::new(MemoryStorage::new()),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::local(".")
    }
}

//=== LocalFileStorage ====================================================

/// Stores each key as a file below a root directory.
///
/// Writes go to a sibling `*.tmp` file which is then renamed over the
/// destination, so a failed write never leaves a truncated file behind.
#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl StorageBackend for LocalFileStorage {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        write_atomic(&path, bytes).map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })?;

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key);
        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            _ => StorageError::Io {
                key: key.to_string(),
                source,
            },
        })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    let written = File::create(&tmp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });

    if let Err(error) = written.and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot");
    path.with_file_name(format!("{file_name}.tmp"))
}

//=== MemoryStorage =======================================================

/// Keeps values in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryStorage {
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

//=========================================================================
// Tests
//=========================================================================
