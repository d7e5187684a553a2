use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BinwrapError>;

#[derive(Error, Debug)]
pub enum BinwrapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("No binary found matching this system ({os}/{arch}). It's probably not supported")]
    NoMatchingSource { os: String, arch: String },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Unable to download {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Download of {url} interrupted: {source}")]
    Transfer {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to download {url}: HTTP {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Unsupported archive format: {path}")]
    UnsupportedArchive { path: PathBuf },

    #[error("Illegal file path in archive: {entry}")]
    IllegalEntryPath { entry: String },

    #[error("Extraction failed: {path}: {source}")]
    Extraction {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to start {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Process exited with {status}")]
    ProcessFailed { status: ExitStatus },

    #[error("Deadline exceeded after {timeout:?}")]
    DeadlineExceeded { timeout: Duration },

    #[error("Invalid environment entry '{entry}', expected NAME=value")]
    InvalidEnvironment { entry: String },

    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("Manifest error: {message}")]
    ManifestError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl BinwrapError {
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        BinwrapError::ConfigError {
            message: message.into(),
        }
    }

    pub fn manifest_error<S: Into<String>>(message: S) -> Self {
        BinwrapError::ManifestError {
            message: message.into(),
        }
    }

    /// Attach a path to an I/O error, mapping permission failures to their
    /// own variant.
    pub fn at_path<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => BinwrapError::PermissionDenied {
                path: path.into(),
            },
            _ => BinwrapError::PathIo {
                path: path.into(),
                source,
            },
        }
    }

    /// True when the run was cut short by the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BinwrapError::DeadlineExceeded { .. })
    }

    /// Exit code of a process that ran and failed, if it exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BinwrapError::ProcessFailed { status } => status.code(),
            _ => None,
        }
    }
}
