//! Engine configuration.
//!
//! Two concerns live here:
//! - [`EngineConfig`]: the JSON-serialisable settings file
//! - [`ConfigSource`]: the collaborator the engine re-reads on every reload
//!   to learn the currently configured root directories

use crate::error::ConfigError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default capacity of the engine event channel.
///
/// Events are one per package group, one per package and one per failed
/// enumeration, so 4 096 covers large installations between drains.
pub const DEFAULT_EVENT_CAPACITY: usize = 4_096;

/// Persistent engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// One package group is built per existing directory in this list.
    pub root_directories: Vec<PathBuf>,

    /// Size of the enumeration worker pool. `None` uses every logical CPU.
    pub worker_threads: Option<usize>,

    /// Capacity of the bounded [`EngineEvent`](crate::engine::EngineEvent) channel.
    pub event_channel_capacity: usize,

    /// Archive extensions recognised by [`ListfileDirectory`](crate::package::ListfileDirectory).
    pub archive_extensions: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_directories: Vec::new(),
            worker_threads: None,
            event_channel_capacity: DEFAULT_EVENT_CAPACITY,
            archive_extensions: vec!["mpq".to_owned()],
        }
    }
}

impl EngineConfig {
    /// Read and parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Worker pool size, never zero.
    pub fn worker_count(&self) -> usize {
        self.worker_threads.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Supplies the configured root directories.
///
/// Called on every reload and every change check, so implementations must
/// return the current value rather than a value cached at construction.
pub trait ConfigSource: Send + Sync {
    fn root_directories(&self) -> Result<Vec<PathBuf>, ConfigError>;
}

/// Re-reads `root_directories` from a JSON config file on each call.
#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for JsonConfigFile {
    fn root_directories(&self) -> Result<Vec<PathBuf>, ConfigError> {
        Ok(EngineConfig::load(&self.path)?.root_directories)
    }
}

/// In-memory root directory list that can be changed at runtime.
///
/// Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct SharedRoots(Arc<RwLock<Vec<PathBuf>>>);

impl SharedRoots {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self(Arc::new(RwLock::new(roots)))
    }

    /// Replace the configured roots.
    pub fn set(&self, roots: Vec<PathBuf>) {
        *self.0.write() = roots;
    }
}

impl ConfigSource for SharedRoots {
    fn root_directories(&self) -> Result<Vec<PathBuf>, ConfigError> {
        Ok(self.0.read().clone())
    }
}

/// Order-independent form of a root directory list, used for change checks.
pub fn root_set(roots: &[PathBuf]) -> BTreeSet<PathBuf> {
    roots.iter().cloned().collect()
}
