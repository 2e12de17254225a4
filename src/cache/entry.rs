//! Cache entry definitions
//!
//! A cache entry is one directory, named by its path relative to the
//! project root, that is persisted between builds.

use crate::error::{KilnError, KilnResult};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Where the list of cached directories came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    /// Declared by the manifest
    Manifest,
    /// Fallback defaults
    Default,
}

impl fmt::Display for EntrySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manifest => write!(f, "manifest"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// A directory eligible for caching
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheEntry {
    relative: String,
}

impl CacheEntry {
    /// Validate and normalize a relative directory path.
    ///
    /// Rejects empty, absolute and parent-escaping paths so that an entry
    /// can never point outside the project or cache root.
    pub fn parse(raw: &str) -> KilnResult<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(KilnError::CacheEntryInvalid(raw.to_string()));
        }

        let mut parts = Vec::new();
        for component in Path::new(trimmed).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(KilnError::CacheEntryInvalid(raw.to_string())),
            }
        }

        if parts.is_empty() {
            return Err(KilnError::CacheEntryInvalid(raw.to_string()));
        }

        Ok(Self {
            relative: parts.join("/"),
        })
    }

    /// Relative path as text
    pub fn as_str(&self) -> &str {
        &self.relative
    }

    /// Resolve the entry against a root directory
    pub fn under(&self, root: &Path) -> PathBuf {
        root.join(&self.relative)
    }
}

impl fmt::Display for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative)
    }
}

/// Resolve the entry set: the manifest's declaration if present, the
/// defaults otherwise. Duplicates keep their first position.
pub fn resolve_entries(
    declared: Option<&[String]>,
    defaults: &[String],
) -> KilnResult<(Vec<CacheEntry>, EntrySource)> {
    let (raw, source) = match declared {
        Some(list) => (list, EntrySource::Manifest),
        None => (defaults, EntrySource::Default),
    };

    let mut entries: Vec<CacheEntry> = Vec::with_capacity(raw.len());
    for path in raw {
        let entry = CacheEntry::parse(path)?;
        if !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    Ok((entries, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<String> {
        vec!["node_modules".to_string(), "bower_components".to_string()]
    }

    #[test]
    fn parse_normalizes() {
        assert_eq!(CacheEntry::parse("node_modules/").unwrap().as_str(), "node_modules");
        assert_eq!(
            CacheEntry::parse("./client/node_modules").unwrap().as_str(),
            "client/node_modules"
        );
    }

    #[test]
    fn parse_rejects_escaping_paths() {
        assert!(CacheEntry::parse("").is_err());
        assert!(CacheEntry::parse(".").is_err());
        assert!(CacheEntry::parse("/etc").is_err());
        assert!(CacheEntry::parse("../outside").is_err());
        assert!(CacheEntry::parse("a/../../b").is_err());
    }

    #[test]
    fn defaults_when_undeclared() {
        let (entries, source) = resolve_entries(None, &defaults()).unwrap();
        assert_eq!(source, EntrySource::Default);
        let names: Vec<_> = entries.iter().map(CacheEntry::as_str).collect();
        assert_eq!(names, vec!["node_modules", "bower_components"]);
    }

    #[test]
    fn manifest_declaration_wins() {
        let declared = vec!["vendor".to_string(), "vendor/".to_string()];
        let (entries, source) = resolve_entries(Some(&declared), &defaults()).unwrap();
        assert_eq!(source, EntrySource::Manifest);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].as_str(), "vendor");
    }

    #[test]
    fn empty_declaration_caches_nothing() {
        let (entries, source) = resolve_entries(Some(&[]), &defaults()).unwrap();
        assert_eq!(source, EntrySource::Manifest);
        assert!(entries.is_empty());
    }

    #[test]
    fn entry_under_root() {
        let entry = CacheEntry::parse("client/node_modules").unwrap();
        assert_eq!(
            entry.under(Path::new("/app")),
            PathBuf::from("/app/client/node_modules")
        );
    }
}
