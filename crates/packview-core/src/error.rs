//! Error types for the enumeration engine.
//!
//! Library code returns these `thiserror` enums; the binary wraps them in
//! `anyhow` at the top level.

use crate::package::PackageGroupId;
use compact_str::CompactString;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by [`Engine::reload`](crate::engine::Engine::reload).
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configured root directories could not be read.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The enumeration worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Configuration collaborator errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`EngineConfig`](crate::config::EngineConfig).
    #[error("Failed to parse config '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Package-group collaborator errors.
///
/// Reload logs these and skips the affected root instead of failing.
#[derive(Error, Debug)]
pub enum PackageError {
    /// Reading a listfile or the group root failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The directory walk over the group root failed.
    #[error("Failed to walk '{path}': {reason}")]
    Walk { path: PathBuf, reason: String },
}

/// Errors raised while enumerating a single reference.
///
/// `MissingListfile` and `UnknownGroup` move the node to `Failed`;
/// `Cancelled` and `Stale` leave the node untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumerationError {
    /// The owning package group has no listfile for the package.
    #[error("Package '{package}' in group {group} has no listfile")]
    MissingListfile {
        group: PackageGroupId,
        package: CompactString,
    },

    /// The reference names a package group missing from the snapshot.
    #[error("Unknown package group {0}")]
    UnknownGroup(PackageGroupId),

    /// The tree generation was cancelled while the scan was running.
    #[error("Enumeration cancelled")]
    Cancelled,

    /// The reference does not belong to the current tree.
    #[error("Reference is stale")]
    Stale,
}
