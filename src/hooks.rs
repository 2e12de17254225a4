//! Lifecycle hooks
//!
//! Hooks are optional entries in the manifest's script table run at fixed
//! points of the pipeline. An absent hook is not an error; a failing one is.

use crate::diagnostics::DiagnosticLog;
use crate::error::{KilnError, KilnResult};
use crate::manifest::Manifest;
use crate::runner::{Step, StepEnv, StepRunner};
use std::path::Path;
use tracing::{debug, info};

/// What happened when a hook was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// The manifest does not declare the hook
    Absent,
    /// The hook ran and exited zero
    Ran,
}

/// Runs manifest-declared lifecycle hooks
pub struct HookRunner<'a> {
    manifest: &'a Manifest,
    runner: &'a dyn StepRunner,
    project_dir: &'a Path,
}

impl<'a> HookRunner<'a> {
    /// Create a hook runner for a project
    pub fn new(manifest: &'a Manifest, runner: &'a dyn StepRunner, project_dir: &'a Path) -> Self {
        Self {
            manifest,
            runner,
            project_dir,
        }
    }

    /// Run `hook` if the manifest declares it.
    ///
    /// The script runs in the project directory with `env`, which carries
    /// the build's PATH including any just-installed toolchain.
    pub async fn run_if_present(
        &self,
        hook: &str,
        env: &StepEnv,
        log: &DiagnosticLog,
    ) -> KilnResult<HookOutcome> {
        let Some(script) = self.manifest.script(hook) else {
            debug!("Hook {} not declared", hook);
            return Ok(HookOutcome::Absent);
        };

        info!("Running hook {}", hook);
        log.line(&format!("Running {} ({})", hook, script)).await?;

        let step = Step::new(hook, script, self.project_dir, env.clone());
        let outcome = self.runner.run(&step, log).await?;
        if !outcome.success() {
            return Err(KilnError::HookFailed {
                hook: hook.to_string(),
                code: outcome.code,
            });
        }
        Ok(HookOutcome::Ran)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ShellRunner;
    use tempfile::TempDir;

    fn manifest(json: &str) -> Manifest {
        Manifest::parse(json).unwrap()
    }

    #[tokio::test]
    async fn absent_hook_is_success() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::create(&dir.path().join("build.log")).await.unwrap();
        let manifest = manifest("{}");
        let runner = ShellRunner::new();

        let outcome = HookRunner::new(&manifest, &runner, dir.path())
            .run_if_present("kiln-prebuild", &StepEnv::default(), &log)
            .await
            .unwrap();

        assert_eq!(outcome, HookOutcome::Absent);
        assert_eq!(log.contents().await.unwrap(), "");
    }

    #[tokio::test]
    async fn present_hook_runs_in_project() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::create(&dir.path().join("build.log")).await.unwrap();
        let manifest = manifest(r#"{"scripts": {"kiln-prebuild": "touch hook-ran"}}"#);
        let runner = ShellRunner::new();

        let outcome = HookRunner::new(&manifest, &runner, dir.path())
            .run_if_present("kiln-prebuild", &StepEnv::default(), &log)
            .await
            .unwrap();

        assert_eq!(outcome, HookOutcome::Ran);
        assert!(dir.path().join("hook-ran").exists());
    }

    #[tokio::test]
    async fn failing_hook_propagates() {
        let dir = TempDir::new().unwrap();
        let log = DiagnosticLog::create(&dir.path().join("build.log")).await.unwrap();
        let manifest = manifest(r#"{"scripts": {"kiln-postbuild": "echo boom; exit 4"}}"#);
        let runner = ShellRunner::new();

        let err = HookRunner::new(&manifest, &runner, dir.path())
            .run_if_present("kiln-postbuild", &StepEnv::default(), &log)
            .await
            .unwrap_err();

        match err {
            KilnError::HookFailed { hook, code } => {
                assert_eq!(hook, "kiln-postbuild");
                assert_eq!(code, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(log.contents().await.unwrap().contains("boom"));
    }
}
