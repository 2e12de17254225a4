//! Project manifest parsing
//!
//! The manifest is the project's `package.json`. Kiln reads three things
//! from it: the `engines` toolchain declaration, an optional list of cache
//! directories and the `scripts` table holding lifecycle hooks.

use crate::error::{KilnError, KilnResult};
use semver::{Op, VersionReq};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest file name looked up in the project root
pub const MANIFEST_FILE: &str = "package.json";

/// Parsed project manifest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Package name, informational only
    #[serde(default)]
    pub name: Option<String>,

    /// Toolchain version declaration
    #[serde(default)]
    pub engines: Engines,

    /// Explicit cache directory override
    #[serde(default, alias = "cache_directories")]
    pub cache_directories: Option<Vec<String>>,

    /// Named scripts, including lifecycle hooks
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
}

/// `engines` section of the manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Engines {
    /// Runtime version range
    pub node: Option<String>,

    /// Package manager version range
    pub npm: Option<String>,
}

/// A non-fatal manifest policy finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestWarning {
    /// No runtime version declared
    UnpinnedRuntime,
    /// Range has a lower bound but no upper bound
    OpenEndedRange { engine: &'static str, range: String },
}

impl std::fmt::Display for ManifestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnpinnedRuntime => write!(
                f,
                "engines.node is unspecified; the default runtime will be used"
            ),
            Self::OpenEndedRange { engine, range } => write!(
                f,
                "engines.{} range '{}' has no upper bound and may pick up breaking releases",
                engine, range
            ),
        }
    }
}

impl Manifest {
    /// Path of the manifest inside a project directory
    pub fn path_in(project_dir: &Path) -> PathBuf {
        project_dir.join(MANIFEST_FILE)
    }

    /// Load the manifest from a project directory.
    ///
    /// A missing or unparsable manifest is a precondition failure.
    pub async fn load(project_dir: &Path) -> KilnResult<Self> {
        let path = Self::path_in(project_dir);
        if !path.is_file() {
            return Err(KilnError::ManifestNotFound(project_dir.to_path_buf()));
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| KilnError::io(format!("reading manifest {}", path.display()), e))?;

        Self::parse(&content).map_err(|e| KilnError::ManifestInvalid {
            path,
            reason: e.to_string(),
        })
    }

    /// Parse a manifest from JSON text
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Look up a script by name. Blank scripts count as absent.
    pub fn script(&self, name: &str) -> Option<&str> {
        self.scripts
            .get(name)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Policy warnings for the declared engines
    pub fn warnings(&self) -> Vec<ManifestWarning> {
        let mut warnings = Vec::new();

        match self.engines.node.as_deref() {
            None => warnings.push(ManifestWarning::UnpinnedRuntime),
            Some(range) if is_open_ended(range) => warnings.push(ManifestWarning::OpenEndedRange {
                engine: "node",
                range: range.to_string(),
            }),
            Some(_) => {}
        }

        if let Some(range) = self.engines.npm.as_deref() {
            if is_open_ended(range) {
                warnings.push(ManifestWarning::OpenEndedRange {
                    engine: "npm",
                    range: range.to_string(),
                });
            }
        }

        warnings
    }
}

/// Whether a range only bounds from below (`>=4`, `>0.10`, `*`).
///
/// Ranges the semver parser doesn't understand are left to the installer.
fn is_open_ended(range: &str) -> bool {
    let Ok(req) = VersionReq::parse(range.trim()) else {
        return false;
    };
    if req.comparators.is_empty() {
        return true;
    }
    req.comparators
        .iter()
        .all(|c| matches!(c.op, Op::Greater | Op::GreaterEq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL_MANIFEST: &str = r#"{
        "name": "web",
        "engines": { "node": "20.x", "npm": "10.x" },
        "cacheDirectories": ["node_modules", "client/node_modules"],
        "scripts": {
            "kiln-prebuild": "echo pre",
            "kiln-postbuild": "  ",
            "start": "node server.js"
        }
    }"#;

    #[test]
    fn parse_full_manifest() {
        let manifest = Manifest::parse(FULL_MANIFEST).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("web"));
        assert_eq!(manifest.engines.node.as_deref(), Some("20.x"));
        assert_eq!(
            manifest.cache_directories,
            Some(vec![
                "node_modules".to_string(),
                "client/node_modules".to_string()
            ])
        );
    }

    #[test]
    fn parse_snake_case_cache_directories() {
        let manifest = Manifest::parse(r#"{"cache_directories": ["vendor"]}"#).unwrap();
        assert_eq!(manifest.cache_directories, Some(vec!["vendor".to_string()]));
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = Manifest::parse("{}").unwrap();
        assert!(manifest.cache_directories.is_none());
        assert!(manifest.scripts.is_empty());
    }

    #[test]
    fn blank_script_is_absent() {
        let manifest = Manifest::parse(FULL_MANIFEST).unwrap();
        assert_eq!(manifest.script("kiln-prebuild"), Some("echo pre"));
        assert_eq!(manifest.script("kiln-postbuild"), None);
        assert_eq!(manifest.script("missing"), None);
    }

    #[test]
    fn warns_on_unpinned_runtime() {
        let manifest = Manifest::parse("{}").unwrap();
        assert_eq!(manifest.warnings(), vec![ManifestWarning::UnpinnedRuntime]);
    }

    #[test]
    fn warns_on_open_ended_range() {
        let manifest = Manifest::parse(r#"{"engines": {"node": ">=18", "npm": "*"}}"#).unwrap();
        let warnings = manifest.warnings();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].to_string().contains("engines.node"));
        assert!(warnings[1].to_string().contains("engines.npm"));
    }

    #[test]
    fn bounded_range_has_no_warning() {
        let manifest = Manifest::parse(r#"{"engines": {"node": ">=18, <21"}}"#).unwrap();
        assert!(manifest.warnings().is_empty());
    }

    #[tokio::test]
    async fn load_missing_manifest_is_precondition() {
        let dir = TempDir::new().unwrap();
        let err = Manifest::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, KilnError::ManifestNotFound(_)));
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn load_invalid_manifest_is_precondition() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        let err = Manifest::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, KilnError::ManifestInvalid { .. }));
        assert!(err.is_precondition());
    }
}
