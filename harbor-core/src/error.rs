//! Error types for harbor-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a [`StateBackend`](crate::backend::StateBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    /// Underlying I/O failure, annotated with the file it happened on.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backend refused the call (injected fault, closed handle, ...).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// All errors that can arise from record store and registry operations.
///
/// Registries return these unchanged; callers further up classify them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Lookup or mutation of a key that is not indexed.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    /// Creation of a key that is already indexed.
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: String },

    /// Empty keys and the index key itself cannot hold records.
    #[error("invalid {kind} key '{key}'")]
    InvalidKey { kind: &'static str, key: String },

    /// A backend call failed; nothing was left half-written.
    #[error("backend error on '{key}': {source}")]
    Backend {
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored envelope carries a format version this build cannot read.
    #[error("unsupported record format v{found} at '{key}' (expected v{expected})")]
    UnsupportedVersion {
        key: String,
        found: u32,
        expected: u32,
    },

    /// A two-step write failed and restoring the previous state failed too.
    /// Index and records may disagree for `key` until repaired.
    #[error("store left inconsistent at '{key}': write failed ({write}); rollback failed ({rollback})")]
    Inconsistent {
        key: String,
        write: BackendError,
        rollback: BackendError,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Errors loading or saving `~/.harbor/config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the file path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.harbor/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn backend_io(path: impl Into<PathBuf>, source: std::io::Error) -> BackendError {
    BackendError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
