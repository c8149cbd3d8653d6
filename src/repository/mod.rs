//! Installed-application state.
//!
//! The installer records each completed app and keeps small per-app
//! preferences (the chosen theme) in a [`Repository`]. It is shared behind a
//! read/write lock: preference lookups take the read side, registrations and
//! preference writes take the write side.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::RepositoryError;

pub trait Repository: Send + Sync {
    /// Mark `name` as installed.
    fn add_app(&mut self, name: &str) -> Result<(), RepositoryError>;

    fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), RepositoryError>;

    fn installed_apps(&self) -> Vec<String>;

    fn is_installed(&self, name: &str) -> bool {
        self.installed_apps().iter().any(|app| app == name)
    }
}

pub type SharedRepository = Arc<RwLock<Box<dyn Repository>>>;

pub fn shared<R: Repository + 'static>(repository: R) -> SharedRepository {
    Arc::new(RwLock::new(Box::new(repository)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct RepositoryState {
    #[serde(default)]
    installed: BTreeSet<String>,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

/// In-memory repository, mostly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    state: RepositoryState,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Repository for MemoryRepository {
    fn add_app(&mut self, name: &str) -> Result<(), RepositoryError> {
        self.state.installed.insert(name.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.state.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn installed_apps(&self) -> Vec<String> {
        self.state.installed.iter().cloned().collect()
    }
}

/// JSON file repository. Every write replaces the file atomically.
#[derive(Debug)]
pub struct JsonFileRepository {
    path: PathBuf,
    state: RepositoryState,
}

impl JsonFileRepository {
    /// Open `path`, starting empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            RepositoryState::default()
        };
        debug!(
            "opened repository {} ({} installed)",
            path.display(),
            state.installed.len()
        );
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), RepositoryError> {
        let data = serde_json::to_vec_pretty(&self.state)?;
        write_atomic(&self.path, &data)
    }
}

impl Repository for JsonFileRepository {
    fn add_app(&mut self, name: &str) -> Result<(), RepositoryError> {
        if self.state.installed.insert(name.to_string()) {
            self.save()?;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        Ok(self.state.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let previous = self.state.values.insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.save()?;
        }
        Ok(())
    }

    fn installed_apps(&self) -> Vec<String> {
        self.state.installed.iter().cloned().collect()
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<(), RepositoryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
