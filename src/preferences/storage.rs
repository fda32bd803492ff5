// src/preferences/storage.rs - Durable key-value storage (the "local storage" slot)

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::infra::errors::CaigentanError;

/// String-keyed, string-valued durable storage. Writes are whole-value
/// overwrites; there is no merge.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CaigentanError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CaigentanError>;
}

/// Volatile store, used by tests and as a scratch backend.
#[derive(Debug, Default, Clone)]
pub struct MemoryKeyValueStore {
    items: BTreeMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CaigentanError> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CaigentanError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A single JSON object file holding every key. Each write rewrites the file
/// atomically (temp file + rename).
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, CaigentanError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<(), CaigentanError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(items)?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local_storage.json".into());
        let tmp = dir.join(format!(".{file_name}.tmp"));

        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.flush()?;
        f.sync_all()?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, CaigentanError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), CaigentanError> {
        let mut items = self.read_all()?;
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }
}
