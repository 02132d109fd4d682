/* src/setup/check.rs */

use super::config::{Config, SetupConfig, TransferConfig};
use crate::error::{Error, Result};
use log::LevelFilter;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

// Main validation entry point
pub fn validate_config(config: &Config) -> Result<()> {
    validate_setup(&config.setup)?;
    validate_transfer(&config.transfer)?;
    Ok(())
}

pub fn validate_setup(setup: &SetupConfig) -> Result<()> {
    if LevelFilter::from_str(&setup.log_level).is_err() {
        return Err(Error::invalid(
            "log_level",
            format!("'{}' is not a known log level", setup.log_level),
        ));
    }
    if setup.log_max_bytes == 0 {
        return Err(Error::invalid("log_max_bytes", "must be greater than 0"));
    }
    Ok(())
}

/// Checks the transfer tunables and that both roots can be used.
pub fn validate_transfer(transfer: &TransferConfig) -> Result<()> {
    validate_extension(&transfer.extension)?;
    if transfer.workers == 0 {
        return Err(Error::invalid("workers", "must be at least 1"));
    }
    if transfer.max_files_per_batch == 0 {
        return Err(Error::invalid("max_files_per_batch", "must be at least 1"));
    }
    if transfer.dedup_capacity == 0 {
        return Err(Error::invalid("dedup_capacity", "must be at least 1"));
    }
    if transfer.pop_timeout_ms == 0 {
        return Err(Error::invalid("pop_timeout_ms", "must be greater than 0"));
    }
    validate_seconds("poll_interval_secs", transfer.poll_interval_secs)?;
    validate_seconds("join_timeout_secs", transfer.join_timeout_secs)?;

    validate_root("ramdisk", &transfer.ramdisk_root)?;
    validate_root("storage", &transfer.storage_root)?;
    validate_writable(&transfer.storage_root)?;
    Ok(())
}

// extension must be plain alphanumerics, without the leading dot
fn validate_extension(extension: &str) -> Result<()> {
    let re = Regex::new(r"^[A-Za-z0-9]+$")
        .map_err(|e| Error::invalid("extension", e.to_string()))?;
    if !re.is_match(extension) {
        return Err(Error::invalid(
            "extension",
            format!(
                "'{}' contains invalid characters. Only a-z, A-Z, 0-9 are allowed.",
                extension
            ),
        ));
    }
    Ok(())
}

fn validate_seconds(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::invalid(
            field,
            format!("must be a positive number, got {}", value),
        ));
    }
    Ok(())
}

fn validate_root(role: &'static str, path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(|source| Error::RootUnreachable {
        role,
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(Error::RootNotDirectory {
            role,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

// Attempt to write and delete a temporary file
fn validate_writable(path: &Path) -> Result<()> {
    let marker = path.join(format!("ramdrain-write-check-{}.tmp", Uuid::new_v4()));
    fs::write(&marker, "test").map_err(|source| Error::RootNotWritable {
        path: path.to_path_buf(),
        source,
    })?;
    fs::remove_file(&marker).map_err(|source| Error::RootNotWritable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
