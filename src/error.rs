//! Error types for Kiln
//!
//! All modules use `KilnResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// All errors that can occur in Kiln
#[derive(Error, Debug)]
pub enum KilnError {
    // Precondition errors
    #[error("No package.json found in {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Project directory not found: {0}")]
    ProjectNotFound(PathBuf),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Collaborator errors
    #[error("Step '{step}' failed with exit code {code}")]
    StepFailed { step: String, code: i32 },

    #[error("Lifecycle hook '{hook}' failed with exit code {code}")]
    HookFailed { hook: String, code: i32 },

    #[error("Could not read runtime and package manager versions from '{command}'")]
    ToolchainVersion { command: String },

    // Already shown to the user by the build report
    #[error("Build failed during {stage}: {source}")]
    BuildFailed {
        stage: String,
        #[source]
        source: Box<KilnError>,
    },

    // Cache errors
    #[error("Failed to copy cache entry {entry}: {reason}")]
    CacheCopy { entry: String, reason: String },

    #[error("Invalid cache entry path: {0}")]
    CacheEntryInvalid(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process terminated by signal")]
    ProcessSignaled,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl KilnError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Whether the error means the submitted input is invalid, as opposed
    /// to the pipeline itself failing
    pub fn is_precondition(&self) -> bool {
        match self {
            Self::ManifestNotFound(_) | Self::ManifestInvalid { .. } | Self::ProjectNotFound(_) => true,
            Self::BuildFailed { source, .. } => source.is_precondition(),
            _ => false,
        }
    }

    /// Whether the error was already reported on stdout
    pub fn is_reported(&self) -> bool {
        matches!(self, Self::BuildFailed { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestNotFound(_) => {
                Some("Add a package.json to the root of the project and commit it")
            }
            Self::ManifestInvalid { .. } => Some("Validate package.json with: npm pkg get"),
            Self::ConfigInvalid { .. } => Some("Show the effective configuration with: kiln config show"),
            Self::HookFailed { .. } => Some("Run the script locally with: npm run <hook>"),
            Self::ToolchainVersion { .. } => {
                Some("Set toolchain.version_command to print the runtime and package manager versions")
            }
            Self::BuildFailed { source, .. } => source.hint(),
            _ => None,
        }
    }
}
