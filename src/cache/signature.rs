//! Cache signature computation and persistence
//!
//! A signature fingerprints everything that decides whether cached
//! directories can be reused: the selected toolchain versions and the list
//! of cached directories. Same inputs = same signature.

use crate::cache::entry::CacheEntry;
use crate::error::{KilnError, KilnResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Toolchain version strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainDescriptor {
    /// Runtime version or range
    pub runtime: String,
    /// Package manager version or range
    pub package_manager: String,
}

impl ToolchainDescriptor {
    /// Parse the output of a version command: the first non-blank line is
    /// the runtime version, the second the package manager version.
    pub fn from_reported(lines: &[String]) -> Option<Self> {
        let mut versions = lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty());
        let runtime = versions.next()?.to_string();
        let package_manager = versions.next()?.to_string();
        Some(Self {
            runtime,
            package_manager,
        })
    }
}

/// Opaque cache fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheSignature(String);

impl CacheSignature {
    /// Compute the signature for a toolchain and cache entry list.
    ///
    /// Every field is length-prefixed so that no two distinct input lists
    /// serialize to the same byte stream. Entry order is significant.
    pub fn compute(toolchain: &ToolchainDescriptor, entries: &[CacheEntry]) -> Self {
        let mut hasher = Sha256::new();

        update_field(&mut hasher, "runtime", &toolchain.runtime);
        update_field(&mut hasher, "package_manager", &toolchain.package_manager);

        hasher.update((entries.len() as u64).to_le_bytes());
        for entry in entries {
            update_field(&mut hasher, "entry", entry.as_str());
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap a stored signature string
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The signature as text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn update_field(hasher: &mut Sha256, name: &str, value: &str) {
    hasher.update(name.as_bytes());
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

impl fmt::Display for CacheSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Validity of the stored signature relative to the current build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Stored signature matches
    Valid,
    /// Stored signature differs or is unreadable
    Invalid,
    /// No signature stored (first build)
    Missing,
}

impl SignatureStatus {
    /// Whether cached directories may be restored
    pub fn allows_restore(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for SignatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Invalid => write!(f, "invalid"),
            Self::Missing => write!(f, "missing"),
        }
    }
}

/// Reads and writes the signature file inside the cache root
#[derive(Debug, Clone)]
pub struct SignatureStore {
    path: PathBuf,
}

impl SignatureStore {
    /// Signature file name inside the cache root
    pub const FILE_NAME: &'static str = "signature";

    /// Create a store rooted at `cache_root`
    pub fn new(cache_root: &Path) -> Self {
        Self {
            path: cache_root.join(Self::FILE_NAME),
        }
    }

    /// Path of the signature file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored signature, if any.
    ///
    /// An unreadable or empty file yields `Some("")`, which never matches
    /// a computed signature.
    pub async fn load(&self) -> Option<CacheSignature> {
        if !self.path.exists() {
            return None;
        }
        match fs::read_to_string(&self.path).await {
            Ok(content) => Some(CacheSignature::from_stored(content.trim())),
            Err(e) => {
                debug!("Unreadable signature at {}: {}", self.path.display(), e);
                Some(CacheSignature::from_stored(""))
            }
        }
    }

    /// Compare the stored signature against `expected`
    pub async fn status(&self, expected: &CacheSignature) -> SignatureStatus {
        match self.load().await {
            None => SignatureStatus::Missing,
            Some(stored) if stored == *expected => SignatureStatus::Valid,
            Some(stored) => {
                debug!("Signature mismatch: stored {}, expected {}", stored, expected);
                SignatureStatus::Invalid
            }
        }
    }

    /// Overwrite the stored signature
    pub async fn save(&self, signature: &CacheSignature) -> KilnResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| KilnError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::write(&self.path, format!("{}\n", signature))
            .await
            .map_err(|e| {
                KilnError::io(format!("writing signature {}", self.path.display()), e)
            })?;
        debug!("Saved signature {}", signature);
        Ok(())
    }

    /// Remove the stored signature; missing file is fine
    pub async fn remove(&self) -> KilnResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(KilnError::io(
                format!("removing signature {}", self.path.display()),
                e,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn toolchain(runtime: &str, pm: &str) -> ToolchainDescriptor {
        ToolchainDescriptor {
            runtime: runtime.to_string(),
            package_manager: pm.to_string(),
        }
    }

    fn entries(paths: &[&str]) -> Vec<CacheEntry> {
        paths.iter().map(|p| CacheEntry::parse(p).unwrap()).collect()
    }

    #[test]
    fn reported_versions_parse() {
        let lines = vec!["".to_string(), " v20.11.1 ".to_string(), "10.2.4".to_string(), "extra".to_string()];
        assert_eq!(
            ToolchainDescriptor::from_reported(&lines),
            Some(toolchain("v20.11.1", "10.2.4"))
        );
        assert_eq!(ToolchainDescriptor::from_reported(&["v20.11.1".to_string()]), None);
        assert_eq!(ToolchainDescriptor::from_reported(&[]), None);
    }

    #[test]
    fn signature_deterministic() {
        let a = CacheSignature::compute(&toolchain("20.x", "10.x"), &entries(&["node_modules"]));
        let b = CacheSignature::compute(&toolchain("20.x", "10.x"), &entries(&["node_modules"]));
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn signature_changes_with_toolchain() {
        let dirs = entries(&["node_modules"]);
        let base = CacheSignature::compute(&toolchain("20.x", "10.x"), &dirs);
        assert_ne!(base, CacheSignature::compute(&toolchain("18.x", "10.x"), &dirs));
        assert_ne!(base, CacheSignature::compute(&toolchain("20.x", "9.x"), &dirs));
    }

    #[test]
    fn signature_changes_with_entries() {
        let tc = toolchain("20.x", "10.x");
        let base = CacheSignature::compute(&tc, &entries(&["node_modules", "bower_components"]));
        assert_ne!(base, CacheSignature::compute(&tc, &entries(&["node_modules"])));
        assert_ne!(
            base,
            CacheSignature::compute(&tc, &entries(&["node_modules", "vendor"]))
        );
    }

    #[test]
    fn signature_field_boundaries_are_unambiguous() {
        let a = CacheSignature::compute(&toolchain("20", "x10"), &[]);
        let b = CacheSignature::compute(&toolchain("20x", "10"), &[]);
        assert_ne!(a, b);

        let tc = toolchain("20.x", "10.x");
        let c = CacheSignature::compute(&tc, &entries(&["ab", "c"]));
        let d = CacheSignature::compute(&tc, &entries(&["a", "bc"]));
        assert_ne!(c, d);
    }

    #[tokio::test]
    async fn status_missing_then_valid() {
        let dir = TempDir::new().unwrap();
        let store = SignatureStore::new(dir.path());
        let sig = CacheSignature::compute(&toolchain("20.x", "10.x"), &[]);

        assert_eq!(store.status(&sig).await, SignatureStatus::Missing);

        store.save(&sig).await.unwrap();
        assert_eq!(store.status(&sig).await, SignatureStatus::Valid);
    }

    #[tokio::test]
    async fn status_invalid_on_mismatch() {
        let dir = TempDir::new().unwrap();
        let store = SignatureStore::new(dir.path());
        let old = CacheSignature::compute(&toolchain("18.x", "10.x"), &[]);
        let new = CacheSignature::compute(&toolchain("20.x", "10.x"), &[]);

        store.save(&old).await.unwrap();
        assert_eq!(store.status(&new).await, SignatureStatus::Invalid);
    }

    #[tokio::test]
    async fn empty_signature_file_is_invalid() {
        let dir = TempDir::new().unwrap();
        let store = SignatureStore::new(dir.path());
        std::fs::write(store.path(), "").unwrap();

        let sig = CacheSignature::compute(&toolchain("20.x", "10.x"), &[]);
        assert_eq!(store.status(&sig).await, SignatureStatus::Invalid);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SignatureStore::new(dir.path());
        store.remove().await.unwrap();

        let sig = CacheSignature::compute(&toolchain("20.x", "10.x"), &[]);
        store.save(&sig).await.unwrap();
        store.remove().await.unwrap();
        assert_eq!(store.status(&sig).await, SignatureStatus::Missing);
    }

    #[test]
    fn only_valid_allows_restore() {
        assert!(SignatureStatus::Valid.allows_restore());
        assert!(!SignatureStatus::Invalid.allows_restore());
        assert!(!SignatureStatus::Missing.allows_restore());
    }
}
