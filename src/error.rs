/* src/error.rs */

use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that stop the mover before it starts.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read config file '{}'", .path.display())]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("failed to parse config file '{}'", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("configuration error: '{field}' {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("{role} root '{}' is unreachable", .path.display())]
    RootUnreachable {
        role: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    #[error("{role} root '{}' is not a directory", .path.display())]
    RootNotDirectory { role: &'static str, path: PathBuf },

    #[error("storage root '{}' is not writable", .path.display())]
    RootNotWritable { path: PathBuf, source: io::Error },

    #[error("failed to open log file '{}'", .path.display())]
    LogFile { path: PathBuf, source: io::Error },

    #[error("failed to install logger")]
    Logger(#[from] log::SetLoggerError),
}

impl Error {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Why a destination copy was not trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("destination is missing")]
    Missing,
    #[error("destination is empty")]
    Empty,
    #[error("destination has {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("destination checksum {actual} does not match source {expected}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Per-file failures. These are logged by the worker and never leave the pipeline.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to copy '{}' to '{}': {source}", .src.display(), .dst.display())]
    Copy {
        src: PathBuf,
        dst: PathBuf,
        source: io::Error,
    },

    #[error("failed to read metadata of '{}': {source}", .path.display())]
    Metadata { path: PathBuf, source: io::Error },

    #[error("failed to hash '{}': {source}", .path.display())]
    Hash { path: PathBuf, source: io::Error },

    #[error("verification of '{}' failed: {reason}", .dst.display())]
    Verify { dst: PathBuf, reason: VerifyFailure },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
