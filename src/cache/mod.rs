//! Persistent build cache
//!
//! A cache directory is handed to every build by the caller. Kiln keeps
//! everything it owns under `<cache>/kiln/`:
//!
//! | Path | Contents |
//! |------|----------|
//! | `signature` | Fingerprint the entries were saved under |
//! | `entries/<path>` | One subtree per cached directory |
//! | `metadata.json` | Informational record of the last save |
//!
//! Cached entries are only restored when the stored signature matches the
//! one computed for the current build. A mismatch or a missing signature
//! means a cold build, never an error.

pub mod entry;
pub mod signature;
pub mod store;

pub use entry::{resolve_entries, CacheEntry, EntrySource};
pub use signature::{CacheSignature, SignatureStatus, SignatureStore, ToolchainDescriptor};
pub use store::{CacheMetadata, DirectoryStore, RestoreReport};

use crate::error::KilnResult;
use std::path::{Path, PathBuf};

/// Subdirectory of the cache directory owned by Kiln
pub const CACHE_NAMESPACE: &str = "kiln";

/// Signature and directory stores for one cache directory
#[derive(Debug, Clone)]
pub struct BuildCache {
    root: PathBuf,
    signatures: SignatureStore,
    directories: DirectoryStore,
}

impl BuildCache {
    /// Open the cache inside `cache_dir`
    pub fn new(cache_dir: &Path) -> Self {
        let root = cache_dir.join(CACHE_NAMESPACE);
        Self {
            signatures: SignatureStore::new(&root),
            directories: DirectoryStore::new(&root),
            root,
        }
    }

    /// Root of the Kiln-owned cache subtree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Signature store
    pub fn signatures(&self) -> &SignatureStore {
        &self.signatures
    }

    /// Directory store
    pub fn directories(&self) -> &DirectoryStore {
        &self.directories
    }

    /// Remove cached entries and the signature
    pub async fn purge(&self) -> KilnResult<()> {
        self.directories.clear().await?;
        self.signatures.remove().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn layout_under_namespace() {
        let cache = BuildCache::new(Path::new("/cache"));
        assert_eq!(cache.root(), Path::new("/cache/kiln"));
        assert_eq!(cache.signatures().path(), Path::new("/cache/kiln/signature"));
        assert_eq!(
            cache.directories().entries_dir(),
            Path::new("/cache/kiln/entries")
        );
    }

    #[tokio::test]
    async fn purge_removes_signature_and_entries() {
        let dir = TempDir::new().unwrap();
        let cache = BuildCache::new(dir.path());
        let sig = CacheSignature::from_stored("abc");
        cache.signatures().save(&sig).await.unwrap();
        std::fs::create_dir_all(cache.directories().entries_dir().join("node_modules")).unwrap();

        cache.purge().await.unwrap();

        assert_eq!(cache.signatures().status(&sig).await, SignatureStatus::Missing);
        assert!(!cache.directories().entries_dir().exists());
        // Second purge on an empty cache is fine
        cache.purge().await.unwrap();
    }
}
