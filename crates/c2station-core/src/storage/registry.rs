//! JSON-file registries for devices and scheduled operations.
//!
//! Each registry is a single pretty-printed JSON array. Writes go to a
//! sibling temp file first and are renamed into place, so a crash never
//! leaves a half-written registry behind.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::data_dir;
use crate::error::{ConfigError, StoreError};
use crate::presence::DeviceSeed;
use crate::schedule::ScheduledOperation;

pub const DEVICES_FILE: &str = "devices.json";
pub const OPERATIONS_FILE: &str = "operations.json";

/// A list of `T` persisted as one JSON file.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

pub type DeviceStore = JsonStore<DeviceSeed>;
pub type OperationStore = JsonStore<ScheduledOperation>;

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record. A missing file is an empty registry.
    pub fn load(&self) -> Result<Vec<T>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the file's contents with `records`.
    pub fn save(&self, records: &[T]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(records)?;
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(path = %self.path.display(), records = records.len(), "registry saved");
        Ok(())
    }
}

impl DeviceStore {
    /// `devices.json` in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(DEVICES_FILE))
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::in_dir(&data_dir()?))
    }
}

impl OperationStore {
    /// `operations.json` in `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(OPERATIONS_FILE))
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        Ok(Self::in_dir(&data_dir()?))
    }
}
