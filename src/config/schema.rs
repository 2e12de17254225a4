//! Configuration schema for Kiln
//!
//! Global configuration is stored at `~/.config/kiln/config.toml`. A project
//! may carry a `.kiln.toml` that overrides individual sections.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// External environment directory handling
    pub env: EnvConfig,

    /// Toolchain installer settings
    pub toolchain: ToolchainConfig,

    /// External binary collaborators, run once each in declaration order
    pub external: Vec<ExternalConfig>,

    /// Dependency install settings
    pub install: InstallConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Lifecycle hook names
    pub hooks: HooksConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Diagnostic log file, overwritten at the start of every build
    pub log_path: PathBuf,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_path: std::env::temp_dir().join("kiln-build.log"),
            log_format: "text".to_string(),
        }
    }
}

/// Environment directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Variable names from the env dir that are never exported
    pub blacklist: Vec<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            blacklist: ["PATH", "GIT_DIR", "CPATH", "CPPATH", "LD_PRELOAD", "LIBRARY_PATH"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Toolchain installer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Installer command. `{runtime}`, `{package_manager}` and `{prefix}`
    /// are substituted before execution.
    pub install_command: String,

    /// Install prefix relative to the project directory
    pub prefix: PathBuf,

    /// Runtime version range used when the manifest declares none
    pub default_runtime: String,

    /// Package manager version range used when the manifest declares none
    pub default_package_manager: String,

    /// Command run after the install that prints the installed runtime
    /// version, then the package manager version, one per line. The cache
    /// signature is computed from these. Empty uses the declared ranges.
    pub version_command: String,
}

impl ToolchainConfig {
    /// Toolchain binary directory relative to the project directory
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            install_command: "kiln-install-node {runtime} {package_manager} {prefix}".to_string(),
            prefix: PathBuf::from(".kiln/node"),
            default_runtime: "20.x".to_string(),
            default_package_manager: "bundled".to_string(),
            version_command: "node --version; npm --version".to_string(),
        }
    }
}

/// An external binary collaborator (e.g. a prebuilt library bundle)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    /// Display name, also used as the profile fragment name
    pub name: String,

    /// Command that fetches and unpacks the dependency
    pub command: String,

    /// Shell lines exported to the runtime environment
    pub profile: Vec<String>,
}

/// Dependency install settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Dependency directory relative to the project directory
    pub dependency_dir: String,

    /// Command used when no dependency directory was submitted
    pub fresh_command: String,

    /// Command used when the dependency directory was submitted
    pub rebuild_command: String,

    /// Command printing the top-level installed dependencies
    pub summary_command: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            dependency_dir: "node_modules".to_string(),
            fresh_command: "npm install --unsafe-perm --quiet".to_string(),
            rebuild_command: "npm rebuild".to_string(),
            summary_command: "npm ls --depth=0".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable directory caching (default: true)
    pub enabled: bool,

    /// Cached directories when the manifest declares none
    pub default_directories: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_directories: vec!["node_modules".to_string(), "bower_components".to_string()],
        }
    }
}

/// Lifecycle hook names looked up in the manifest's script table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    /// Script run before the dependency build
    pub pre_build: String,

    /// Script run after the dependency build
    pub post_build: String,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            pre_build: "kiln-prebuild".to_string(),
            post_build: "kiln-postbuild".to_string(),
        }
    }
}
