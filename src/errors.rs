// src/errors.rs

//! Crate-wide error type and aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    /// Listing or stat failure while walking a directory.
    #[error("Traversal error at {path:?}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Dependencies were declared for a path that is not being watched.
    #[error("Path is not watched: {0:?}")]
    InvalidPath(PathBuf),

    /// The OS refused to establish a watch.
    #[error("Unable to watch {path:?}: {source}")]
    WatchSetup {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Path cannot depend on itself: {0:?}")]
    SelfDependency(PathBuf),

    #[error("Dependency cycle detected: {0}")]
    DependencyCycle(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchError {
    pub fn traversal(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        WatchError::Traversal {
            path: path.into(),
            source,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchError>;
