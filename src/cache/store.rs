//! Cache directory store
//!
//! Copies cache entries between the project tree and the persistent cache,
//! mirroring each entry's relative path under `<cache>/kiln/entries/`.

use crate::cache::entry::CacheEntry;
use crate::cache::signature::{CacheSignature, ToolchainDescriptor};
use crate::error::{KilnError, KilnResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

/// Informational record of the last cache save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Build that wrote the cache
    pub build_id: Uuid,
    /// When the cache was written
    pub saved_at: DateTime<Utc>,
    /// Signature the cache was saved under
    pub signature: String,
    /// Toolchain versions reported by the build that wrote the cache
    #[serde(default)]
    pub toolchain: Option<ToolchainDescriptor>,
    /// Entries present in the cache
    pub entries: Vec<String>,
}

/// Outcome of a restore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Entries copied into the project tree
    pub restored: Vec<CacheEntry>,
    /// Entries with no cached counterpart
    pub skipped: Vec<CacheEntry>,
}

/// Moves cache entries between a project tree and the cache
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    entries_dir: PathBuf,
    metadata_path: PathBuf,
}

impl DirectoryStore {
    /// Create a store rooted at `cache_root`
    pub fn new(cache_root: &Path) -> Self {
        Self {
            entries_dir: cache_root.join("entries"),
            metadata_path: cache_root.join("metadata.json"),
        }
    }

    /// Directory holding the cached entries
    pub fn entries_dir(&self) -> &Path {
        &self.entries_dir
    }

    /// Copy every cached entry into the project tree, replacing whatever is
    /// at the entry's path. Entries missing from the cache are skipped.
    pub async fn restore(
        &self,
        project_dir: &Path,
        entries: &[CacheEntry],
    ) -> KilnResult<RestoreReport> {
        let entries_dir = self.entries_dir.clone();
        let project_dir = project_dir.to_path_buf();
        let entries = entries.to_vec();

        run_blocking(move || {
            let mut report = RestoreReport::default();
            for entry in entries {
                let cached = entry.under(&entries_dir);
                if !cached.is_dir() {
                    debug!("No cached copy of {}", entry);
                    report.skipped.push(entry);
                    continue;
                }
                let target = entry.under(&project_dir);
                replace_tree(&cached, &target).map_err(|e| copy_error(&entry, e))?;
                debug!("Restored {}", entry);
                report.restored.push(entry);
            }
            Ok(report)
        })
        .await
    }

    /// Clear the cache, then copy each entry that exists in the project tree
    /// into it. Returns the entries that were saved.
    pub async fn save(
        &self,
        project_dir: &Path,
        entries: &[CacheEntry],
    ) -> KilnResult<Vec<CacheEntry>> {
        self.clear().await?;

        let entries_dir = self.entries_dir.clone();
        let project_dir = project_dir.to_path_buf();
        let entries = entries.to_vec();

        run_blocking(move || {
            fs::create_dir_all(&entries_dir).map_err(|e| {
                KilnError::io(format!("creating {}", entries_dir.display()), e)
            })?;

            let mut saved = Vec::new();
            for entry in entries {
                let source = entry.under(&project_dir);
                if !source.is_dir() {
                    debug!("Not caching {}: absent from project", entry);
                    continue;
                }
                replace_tree(&source, &entry.under(&entries_dir))
                    .map_err(|e| copy_error(&entry, e))?;
                debug!("Cached {}", entry);
                saved.push(entry);
            }
            Ok(saved)
        })
        .await
    }

    /// Remove all cached entries and the save record. Idempotent.
    pub async fn clear(&self) -> KilnResult<()> {
        remove_path(&self.entries_dir)
            .map_err(|e| KilnError::io(format!("clearing {}", self.entries_dir.display()), e))?;
        remove_path(&self.metadata_path).map_err(|e| {
            KilnError::io(format!("removing {}", self.metadata_path.display()), e)
        })?;
        Ok(())
    }

    /// Entries from `entries` that currently have a cached copy
    pub fn cached(&self, entries: &[CacheEntry]) -> Vec<CacheEntry> {
        entries
            .iter()
            .filter(|e| e.under(&self.entries_dir).is_dir())
            .cloned()
            .collect()
    }

    /// Record the save that just completed
    pub async fn write_metadata(
        &self,
        build_id: Uuid,
        signature: &CacheSignature,
        toolchain: &ToolchainDescriptor,
        saved: &[CacheEntry],
    ) -> KilnResult<()> {
        let metadata = CacheMetadata {
            build_id,
            saved_at: Utc::now(),
            signature: signature.to_string(),
            toolchain: Some(toolchain.clone()),
            entries: saved.iter().map(|e| e.to_string()).collect(),
        };
        let content = serde_json::to_string_pretty(&metadata)?;
        tokio::fs::write(&self.metadata_path, content)
            .await
            .map_err(|e| {
                KilnError::io(format!("writing {}", self.metadata_path.display()), e)
            })
    }

    /// Read the last save record, if present and parseable
    pub async fn read_metadata(&self) -> Option<CacheMetadata> {
        let content = tokio::fs::read_to_string(&self.metadata_path).await.ok()?;
        serde_json::from_str(&content).ok()
    }
}

async fn run_blocking<T, F>(f: F) -> KilnResult<T>
where
    F: FnOnce() -> KilnResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| KilnError::Internal(format!("cache task failed: {}", e)))?
}

fn copy_error(entry: &CacheEntry, err: io::Error) -> KilnError {
    KilnError::CacheCopy {
        entry: entry.to_string(),
        reason: err.to_string(),
    }
}

/// Remove a file, symlink or directory tree. Missing paths are fine.
fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace `target` with a copy of the `source` directory tree.
fn replace_tree(source: &Path, target: &Path) -> io::Result<()> {
    remove_path(target)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    copy_tree(source, target)
}

/// Recursively copy a directory. Symlinks are recreated, not followed.
fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let dest = target.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    let link = fs::read_link(source)?;
    std::os::unix::fs::symlink(link, dest)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    fs::copy(source, dest).map(|_| ())
}
