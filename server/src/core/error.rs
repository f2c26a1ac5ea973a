//! Typed errors at the major module boundaries.
//!
//! Each module that can fail independently gets its own error enum; callers
//! that just need to propagate to the process boundary convert into
//! `anyhow::Error` via `?`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppLibError {
    #[error("app library evaluation failed: {0}")]
    Evaluation(String),
    #[error("app {0:?} not registered")]
    UnknownApp(String),
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    AppLib(#[from] AppLibError),
    #[error("model not found for key {0:?}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    AppLib(#[from] AppLibError),
    #[error("duplicate app key {0:?}")]
    DuplicateKey(String),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to watch config directory {path}: {source}")]
    Watch {
        path: std::path::PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("run epoch failed: {0}")]
    Epoch(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}
