//! Pipeline stages
//!
//! The pipeline is a strictly sequential state machine. Every stage either
//! advances to the next one or moves to `Failed`; nothing ever goes back.

use std::fmt;

/// A pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    EnvSetup,
    ToolchainInstall,
    ExternalDepsInstall,
    CacheRestore,
    PreBuildHook,
    DependencyBuild,
    PostBuildHook,
    CacheSave,
    Summary,
    Done,
    Failed,
}

impl Stage {
    /// The state after this one completes successfully.
    ///
    /// Terminal states stay where they are.
    pub fn next(self) -> Stage {
        match self {
            Self::Init => Self::EnvSetup,
            Self::EnvSetup => Self::ToolchainInstall,
            Self::ToolchainInstall => Self::ExternalDepsInstall,
            Self::ExternalDepsInstall => Self::CacheRestore,
            Self::CacheRestore => Self::PreBuildHook,
            Self::PreBuildHook => Self::DependencyBuild,
            Self::DependencyBuild => Self::PostBuildHook,
            Self::PostBuildHook => Self::CacheSave,
            Self::CacheSave => Self::Summary,
            Self::Summary => Self::Done,
            Self::Done => Self::Done,
            Self::Failed => Self::Failed,
        }
    }

    /// Whether the pipeline has stopped
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Progress header shown to the user
    pub fn title(self) -> &'static str {
        match self {
            Self::Init => "Reading project manifest",
            Self::EnvSetup => "Creating build environment",
            Self::ToolchainInstall => "Installing toolchain",
            Self::ExternalDepsInstall => "Installing external dependencies",
            Self::CacheRestore => "Restoring cache",
            Self::PreBuildHook => "Running pre-build hook",
            Self::DependencyBuild => "Building dependencies",
            Self::PostBuildHook => "Running post-build hook",
            Self::CacheSave => "Caching build",
            Self::Summary => "Build succeeded",
            Self::Done => "Done",
            Self::Failed => "Build failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::EnvSetup => "env-setup",
            Self::ToolchainInstall => "toolchain-install",
            Self::ExternalDepsInstall => "external-deps-install",
            Self::CacheRestore => "cache-restore",
            Self::PreBuildHook => "pre-build-hook",
            Self::DependencyBuild => "dependency-build",
            Self::PostBuildHook => "post-build-hook",
            Self::CacheSave => "cache-save",
            Self::Summary => "summary",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Stages that run after `Init`, in order
    const BUILD_SEQUENCE: [Stage; 9] = [
        Stage::EnvSetup,
        Stage::ToolchainInstall,
        Stage::ExternalDepsInstall,
        Stage::CacheRestore,
        Stage::PreBuildHook,
        Stage::DependencyBuild,
        Stage::PostBuildHook,
        Stage::CacheSave,
        Stage::Summary,
    ];

    #[test]
    fn sequence_follows_next() {
        let mut stage = Stage::Init;
        for expected in BUILD_SEQUENCE {
            stage = stage.next();
            assert_eq!(stage, expected);
        }
        assert_eq!(stage.next(), Stage::Done);
    }

    #[test]
    fn terminal_states_are_fixed_points() {
        assert_eq!(Stage::Done.next(), Stage::Done);
        assert_eq!(Stage::Failed.next(), Stage::Failed);
        assert!(Stage::Done.is_terminal());
        assert!(Stage::Failed.is_terminal());
        assert!(!Stage::CacheSave.is_terminal());
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::DependencyBuild.to_string(), "dependency-build");
        assert_eq!(Stage::Init.to_string(), "init");
    }
}
