/* src/setup/config.rs */

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SetupConfig {
    pub log_level: String,
    pub log_file: PathBuf,
    pub log_max_bytes: u64,
    pub log_backups: usize,
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            log_level: "info".to_string(),
            log_file: PathBuf::from("transfer.log"),
            log_max_bytes: 10 * 1024 * 1024,
            log_backups: 5,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerifyMode {
    /// Destination must be non-empty and as large as the source.
    #[default]
    Size,
    /// Size check plus matching SHA-256 digests.
    Checksum,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    pub ramdisk_root: PathBuf,
    pub storage_root: PathBuf,
    pub extension: String,
    pub max_files_per_batch: usize,
    pub poll_interval_secs: f64,
    pub workers: usize,
    pub pop_timeout_ms: u64,
    pub join_timeout_secs: f64,
    pub verify: VerifyMode,
    pub dedup_capacity: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        TransferConfig {
            ramdisk_root: default_ramdisk_root(),
            storage_root: PathBuf::from("Images"),
            extension: "jpg".to_string(),
            max_files_per_batch: 50,
            poll_interval_secs: 1.0,
            workers: 4,
            pop_timeout_ms: 1000,
            join_timeout_secs: 2.0,
            verify: VerifyMode::Size,
            dedup_capacity: 65_536,
        }
    }
}

impl TransferConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.poll_interval_secs)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.join_timeout_secs)
    }
}

fn default_ramdisk_root() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("R:\\")
    } else {
        PathBuf::from("/mnt/ramdisk")
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub setup: SetupConfig,
    pub transfer: TransferConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
