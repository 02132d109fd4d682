/* src/mover/scanner.rs */

use log::{error, info, warn};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One capture stream: `<ramdisk_root>/<name>` mirrored to `<storage_root>/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDir {
    pub name: String,
    pub src: PathBuf,
    pub dst: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub file_name: String,
    pub path: PathBuf,
    pub created: SystemTime,
}

pub struct Scanner {
    ramdisk_root: PathBuf,
    storage_root: PathBuf,
    sessions: Vec<SessionDir>,
    known: HashSet<String>,
}

impl Scanner {
    pub fn new(ramdisk_root: impl Into<PathBuf>, storage_root: impl Into<PathBuf>) -> Self {
        Scanner {
            ramdisk_root: ramdisk_root.into(),
            storage_root: storage_root.into(),
            sessions: Vec::new(),
            known: HashSet::new(),
        }
    }

    /// Monitored sessions in discovery order.
    pub fn sessions(&self) -> &[SessionDir] {
        &self.sessions
    }

    /// Picks up new session directories. Returns how many were added.
    /// Errors are logged; a failed scan is simply retried on the next tick.
    pub fn scan(&mut self) -> usize {
        let names = match list_subdirectories(&self.ramdisk_root) {
            Ok(names) => names,
            Err(e) => {
                error!(
                    "! Error scanning '{}' for session directories: {}",
                    self.ramdisk_root.display(),
                    e
                );
                return 0;
            }
        };

        let mut added = 0;
        for name in names {
            if self.known.contains(&name) {
                continue;
            }
            let dst = self.storage_root.join(&name);
            if let Err(e) = fs::create_dir_all(&dst) {
                error!(
                    "! Failed to create destination '{}' for session '{}': {}",
                    dst.display(),
                    name,
                    e
                );
                continue;
            }
            info!("> Added new directory to monitor: {}", name);
            self.known.insert(name.clone());
            self.sessions.push(SessionDir {
                src: self.ramdisk_root.join(&name),
                dst,
                name,
            });
            added += 1;
        }
        added
    }
}

// Names of the immediate subdirectories, sorted so discovery order is stable.
fn list_subdirectories(root: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(
                "! Skipping session directory with non UTF-8 name: {:?}",
                raw
            ),
        }
    }
    names.sort();
    Ok(names)
}

/// Image files in `session`, oldest first, at most `batch` of them.
pub fn candidates(
    session: &SessionDir,
    extension: &str,
    batch: usize,
) -> io::Result<Vec<Candidate>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(&session.src)? {
        let entry = entry?;
        let path = entry.path();
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if !has_extension(&path, extension) {
            continue;
        }
        // The producer may delete or rename between listing and stat.
        let meta = match entry.metadata() {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        let created = meta.created().or_else(|_| meta.modified())?;
        found.push(Candidate {
            file_name,
            path,
            created,
        });
    }
    order_oldest_first(&mut found);
    found.truncate(batch);
    Ok(found)
}

pub fn order_oldest_first(files: &mut [Candidate]) {
    files.sort_by(|a, b| {
        a.created
            .cmp(&b.created)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}
