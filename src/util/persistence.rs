use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde_json::{Error as SerdeError, Value};

const APP_QUALIFIER: &str = "com";
const APP_ORG: &str = "SalvageAdvisor";
const APP_NAME: &str = "SalvageAdvisor";

pub const CACHE_FILE: &str = "cache.json";
pub const PROGRESS_FILE: &str = "progress.json";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serde(#[from] SerdeError),
}

/// Keyed JSON entries. A single `set_many` call lands completely or not at all,
/// and readers never see a value that failed to persist.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<&Value>;

    fn set_many(&mut self, entries: Vec<(String, Value)>) -> Result<(), PersistError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), PersistError> {
        self.set_many(vec![(key.to_string(), value)])
    }
}

pub fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).map(|dirs| dirs.data_dir().to_path_buf())
}

/// Every entry lives in one JSON document that is replaced via rename.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, Value>,
}

impl FileStore {
    /// Unreadable or corrupt files open as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "ignoring corrupt store");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "failed to read store");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn set_many(&mut self, entries: Vec<(String, Value)>) -> Result<(), PersistError> {
        let mut next = self.entries.clone();
        next.extend(entries);
        write_atomic(&self.path, &serde_json::to_vec(&next)?)?;
        tracing::debug!(path = %self.path.display(), keys = next.len(), "store persisted");
        self.entries = next;
        Ok(())
    }
}

/// Writes to a sibling temp file, then renames over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
    if let Err(err) = fs::write(&tmp, bytes).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}
