//! Snapshot persistence keyed by the loaded program's name.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::StoreError;

/// An opaque core snapshot. The host never interprets the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SaveState(Vec<u8>);

impl SaveState {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SaveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SaveState({} bytes)", self.0.len())
    }
}

/// Key-value persistence collaborator.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// Volatile store, mostly for tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// One file per key inside a directory. The directory is created on first
/// write.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `key`. Bytes outside `[A-Za-z0-9._-]` are written as `%XX`,
    /// so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len());
        for &b in key.as_bytes() {
            if b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_') {
                name.push(b as char);
            } else {
                name.push_str(&format!("%{b:02X}"));
            }
        }
        self.dir.join(format!("{name}.state"))
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write beside the target first so a crash never leaves half a state.
        let tmp = path.with_extension("state.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        info!("Saved state to {}", path.display());
        Ok(())
    }
}

/// Store key for a program, e.g. `save_game.nes`.
pub fn key_for(program_name: &str) -> String {
    format!("save_{program_name}")
}

/// Routes snapshots to the store under per-program keys.
pub struct SaveStateManager {
    store: Box<dyn StateStore>,
}

impl SaveStateManager {
    pub fn new(store: Box<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn persist(&mut self, program_name: &str, state: &SaveState) -> Result<(), StoreError> {
        self.store.set(&key_for(program_name), state.as_bytes())
    }

    pub fn fetch(&self, program_name: &str) -> Result<Option<SaveState>, StoreError> {
        Ok(self
            .store
            .get(&key_for(program_name))?
            .map(SaveState::from_bytes))
    }
}
