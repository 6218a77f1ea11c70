use std::sync::Arc;

use thiserror::Error;

/// Errors raised by the collaborators the installer core depends on:
/// filesystem, network, parsing, and configuration. Installer-specific
/// error kinds (unsatisfied requirements, conflicts, build failures, ...)
/// live in `kegforge_core::error::InstallError`, which wraps this type
/// for the I/O-shaped failures it has no opinion on.
#[derive(Error, Debug, Clone)]
pub enum KfError {
    #[error("I/O error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP request error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON parsing error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("semantic versioning error: {0}")]
    SemVer(#[from] Arc<semver::Error>),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to download '{0}' from '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("generic error: {0}")]
    Generic(String),

    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("parsing error in {0}: {1}")]
    ParseError(&'static str, String),

    #[error("dependency error: {0}")]
    DependencyError(String),

    #[error("failed to execute command: {0}")]
    CommandExecError(String),
}

impl From<std::io::Error> for KfError {
    fn from(err: std::io::Error) -> Self {
        KfError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for KfError {
    fn from(err: reqwest::Error) -> Self {
        KfError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for KfError {
    fn from(err: serde_json::Error) -> Self {
        KfError::Json(Arc::new(err))
    }
}

impl From<semver::Error> for KfError {
    fn from(err: semver::Error) -> Self {
        KfError::SemVer(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, KfError>;
