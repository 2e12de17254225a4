//! Dependency install planning
//!
//! Chooses between a fresh install and rebuilding an existing dependency
//! directory. The decision looks at the project tree as submitted, before
//! any cache restore, so a checked-in dependency directory is told apart
//! from one the cache is about to provide.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How the dependency directory gets materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallDecision {
    /// No dependency directory was submitted
    FreshInstall,
    /// A dependency directory was submitted and is rebuilt in place
    RebuildExisting,
}

impl fmt::Display for InstallDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FreshInstall => write!(f, "fresh install"),
            Self::RebuildExisting => write!(f, "rebuild existing"),
        }
    }
}

/// Plans the dependency install for a project
#[derive(Debug, Clone)]
pub struct InstallPlanner {
    dependency_dir: PathBuf,
}

impl InstallPlanner {
    /// Create a planner for a dependency directory relative to the project
    pub fn new(dependency_dir: impl Into<PathBuf>) -> Self {
        Self {
            dependency_dir: dependency_dir.into(),
        }
    }

    /// Decide based on the current state of `project_dir`
    pub fn decide(&self, project_dir: &Path) -> InstallDecision {
        let path = project_dir.join(&self.dependency_dir);
        let decision = if path.is_dir() {
            InstallDecision::RebuildExisting
        } else {
            InstallDecision::FreshInstall
        };
        debug!("{} at {}: {}", self.dependency_dir.display(), path.display(), decision);
        decision
    }

    /// Relative dependency directory
    pub fn dependency_dir(&self) -> &Path {
        &self.dependency_dir
    }
}
