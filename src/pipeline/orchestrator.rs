//! Build orchestrator
//!
//! Drives one build through every stage in order. Each stage gets a
//! progress header on the terminal while its full output goes to the
//! diagnostic log. The first failing stage ends the build.

use crate::cache::{
    resolve_entries, BuildCache, CacheEntry, CacheSignature, EntrySource, SignatureStatus,
    ToolchainDescriptor,
};
use crate::config::Config;
use crate::diagnostics::{diagnose, DiagnosticLog, Remedy, CHECKED_IN_MARKER};
use crate::envdir::load_env_dir;
use crate::error::{KilnError, KilnResult};
use crate::hooks::{HookOutcome, HookRunner};
use crate::manifest::Manifest;
use crate::pipeline::stage::Stage;
use crate::planner::{InstallDecision, InstallPlanner};
use crate::profile::{path_export, write_profile};
use crate::runner::{Step, StepEnv, StepRunner};
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Paths for one build invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Project tree being built
    pub project_dir: PathBuf,
    /// Persistent cache provided by the caller
    pub cache_dir: PathBuf,
    /// One file per exported environment variable
    pub env_dir: PathBuf,
    /// Diagnostic log file
    pub log_path: PathBuf,
}

impl BuildContext {
    /// Create a build context
    pub fn new(project_dir: PathBuf, cache_dir: PathBuf, env_dir: PathBuf, log_path: PathBuf) -> Self {
        Self {
            project_dir,
            cache_dir,
            env_dir,
            log_path,
        }
    }
}

/// Cache entries and signature a manifest resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePlan {
    /// Directories to restore and save
    pub entries: Vec<CacheEntry>,
    /// Where the entry list came from
    pub source: EntrySource,
    /// Toolchain versions, from `engines` or the configured defaults until
    /// the installed versions are known
    pub toolchain: ToolchainDescriptor,
    /// Signature the cache must carry to be restored
    pub signature: CacheSignature,
}

impl CachePlan {
    /// Resolve the plan for `manifest` under `config`
    pub fn resolve(manifest: &Manifest, config: &Config) -> KilnResult<Self> {
        let (entries, source) = resolve_entries(
            manifest.cache_directories.as_deref(),
            &config.cache.default_directories,
        )?;

        let toolchain = ToolchainDescriptor {
            runtime: manifest
                .engines
                .node
                .clone()
                .unwrap_or_else(|| config.toolchain.default_runtime.clone()),
            package_manager: manifest
                .engines
                .npm
                .clone()
                .unwrap_or_else(|| config.toolchain.default_package_manager.clone()),
        };
        let signature = CacheSignature::compute(&toolchain, &entries);

        Ok(Self {
            entries,
            source,
            toolchain,
            signature,
        })
    }

    /// Re-sign the plan for the toolchain that was actually installed
    pub fn with_toolchain(mut self, toolchain: ToolchainDescriptor) -> Self {
        self.signature = CacheSignature::compute(&toolchain, &self.entries);
        self.toolchain = toolchain;
        self
    }
}

/// Record of a successful build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Build identifier recorded in the cache metadata
    pub build_id: Uuid,
    /// Stages that completed, in order
    pub stages: Vec<Stage>,
    /// How dependencies were installed
    pub decision: InstallDecision,
    /// Cache validity once the toolchain was installed
    pub signature_status: SignatureStatus,
    /// Toolchain versions the signature was computed from
    pub toolchain: ToolchainDescriptor,
    /// Signature the cache was saved under
    pub signature: CacheSignature,
    /// Entries copied from the cache
    pub restored: Vec<CacheEntry>,
    /// Entries written to the cache
    pub saved: Vec<CacheEntry>,
    /// Policy warnings raised during the build
    pub warnings: Vec<String>,
    /// Top-level installed dependencies
    pub dependencies: Vec<String>,
}

/// Record of a failed build
#[derive(Debug)]
pub struct BuildFailure {
    /// Stage that failed
    pub stage: Stage,
    /// Why it failed
    pub error: KilnError,
    /// Stages that completed before the failure
    pub completed: Vec<Stage>,
    /// Advice matched from the diagnostic log
    pub remedies: Vec<Remedy>,
    /// Where the full output is
    pub log_path: PathBuf,
}

impl BuildFailure {
    /// Whether the input was invalid rather than the pipeline failing
    pub fn is_precondition(&self) -> bool {
        self.error.is_precondition()
    }
}

/// Mutable state threaded through the stages of one build
struct Build {
    manifest: Manifest,
    decision: InstallDecision,
    entries: Vec<CacheEntry>,
    toolchain: ToolchainDescriptor,
    signature: CacheSignature,
    env: StepEnv,
    signature_status: SignatureStatus,
    restored: Vec<CacheEntry>,
    saved: Vec<CacheEntry>,
    warnings: Vec<String>,
    dependencies: Vec<String>,
}

/// Sequences the build stages
pub struct Orchestrator<'a> {
    ctx: BuildContext,
    config: &'a Config,
    runner: &'a dyn StepRunner,
    ui: UiContext,
    cache: BuildCache,
    build_id: Uuid,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator for one build
    pub fn new(ctx: BuildContext, config: &'a Config, runner: &'a dyn StepRunner, ui: UiContext) -> Self {
        let cache = BuildCache::new(&ctx.cache_dir);
        Self {
            ctx,
            config,
            runner,
            ui,
            cache,
            build_id: Uuid::new_v4(),
        }
    }

    /// Run the pipeline to `Done` or `Failed`
    pub async fn run(&self) -> Result<BuildReport, BuildFailure> {
        info!("Build {} using {} runner", self.build_id, self.runner.runner_name());

        let log = DiagnosticLog::create(&self.ctx.log_path)
            .await
            .map_err(|e| self.failure(Stage::Init, e, Vec::new(), Vec::new()))?;

        let mut completed = Vec::new();

        self.header(Stage::Init, &log).await;
        let mut build = match self.init(&log).await {
            Ok(build) => build,
            Err(e) => return Err(self.fail(Stage::Init, e, completed, &log).await),
        };
        completed.push(Stage::Init);

        let mut stage = Stage::Init.next();
        while !stage.is_terminal() {
            self.header(stage, &log).await;
            if let Err(e) = self.run_stage(stage, &mut build, &log).await {
                return Err(self.fail(stage, e, completed, &log).await);
            }
            completed.push(stage);
            stage = stage.next();
        }

        if let Err(e) = log.flush().await {
            warn!("Failed to flush diagnostic log: {}", e);
        }
        info!("Build {} done", self.build_id);

        Ok(BuildReport {
            build_id: self.build_id,
            stages: completed,
            decision: build.decision,
            signature_status: build.signature_status,
            toolchain: build.toolchain,
            signature: build.signature,
            restored: build.restored,
            saved: build.saved,
            warnings: build.warnings,
            dependencies: build.dependencies,
        })
    }

    async fn run_stage(&self, stage: Stage, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        match stage {
            Stage::EnvSetup => self.env_setup(build, log).await,
            Stage::ToolchainInstall => self.toolchain_install(build, log).await,
            Stage::ExternalDepsInstall => self.external_deps_install(build, log).await,
            Stage::CacheRestore => self.cache_restore(build, log).await,
            Stage::PreBuildHook => {
                let hook = &self.config.hooks.pre_build;
                self.hook(hook, build, log).await
            }
            Stage::DependencyBuild => self.dependency_build(build, log).await,
            Stage::PostBuildHook => {
                let hook = &self.config.hooks.post_build;
                self.hook(hook, build, log).await
            }
            Stage::CacheSave => self.cache_save(build, log).await,
            Stage::Summary => self.summary(build, log).await,
            Stage::Init | Stage::Done | Stage::Failed => Err(KilnError::Internal(format!(
                "stage {} is not part of the build sequence",
                stage
            ))),
        }
    }

    async fn header(&self, stage: Stage, log: &DiagnosticLog) {
        ui::section(&self.ui, stage.title());
        if let Err(e) = log.section(stage.title()).await {
            warn!("Failed to write stage header: {}", e);
        }
        debug!("Entering stage {}", stage);
    }

    /// Load the manifest, plan the install and raise policy warnings.
    ///
    /// The install decision is taken here, before anything touches the
    /// project tree.
    async fn init(&self, log: &DiagnosticLog) -> KilnResult<Build> {
        if !self.ctx.project_dir.is_dir() {
            return Err(KilnError::ProjectNotFound(self.ctx.project_dir.clone()));
        }

        let manifest = Manifest::load(&self.ctx.project_dir).await?;
        log.line(&format!(
            "Manifest: {}",
            Manifest::path_in(&self.ctx.project_dir).display()
        ))
        .await?;

        let planner = InstallPlanner::new(&self.config.install.dependency_dir);
        let decision = planner.decide(&self.ctx.project_dir);
        log.line(&format!("Install strategy: {}", decision)).await?;

        let mut warnings: Vec<String> = manifest.warnings().iter().map(|w| w.to_string()).collect();
        if decision == InstallDecision::RebuildExisting {
            warnings.push(format!(
                "{} ({})",
                CHECKED_IN_MARKER,
                planner.dependency_dir().display()
            ));
        }
        for warning in &warnings {
            warn!("{}", warning);
            ui::step_warn(&self.ui, warning);
            log.line(&format!("warning: {}", warning)).await?;
        }

        let plan = CachePlan::resolve(&manifest, self.config).map_err(|e| {
            KilnError::ManifestInvalid {
                path: Manifest::path_in(&self.ctx.project_dir),
                reason: e.to_string(),
            }
        })?;
        if plan.source == EntrySource::Manifest {
            log.line("Using cache directories declared in the manifest").await?;
        }
        let CachePlan {
            entries,
            toolchain,
            signature,
            ..
        } = plan;

        Ok(Build {
            manifest,
            decision,
            entries,
            toolchain,
            signature,
            env: StepEnv::default(),
            signature_status: SignatureStatus::Missing,
            restored: Vec::new(),
            saved: Vec::new(),
            warnings,
            dependencies: Vec::new(),
        })
    }

    async fn env_setup(&self, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        let mut vars = load_env_dir(&self.ctx.env_dir, &self.config.env.blacklist).await?;
        for name in vars.keys() {
            log.line(&format!("Exporting {}", name)).await?;
        }
        vars.entry("NODE_ENV".to_string())
            .or_insert_with(|| "production".to_string());

        build.env = StepEnv::new(vars)
            .with_path(self.project_path(&self.config.toolchain.bin_dir()))
            .with_path(self.dependency_bin_dir());

        ui::step_ok_detail(
            &self.ui,
            "Environment ready",
            &format!("{} variables", build.env.vars.len()),
        );
        Ok(())
    }

    async fn toolchain_install(&self, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        let prefix = self.project_path(&self.config.toolchain.prefix);
        let command = self
            .config
            .toolchain
            .install_command
            .replace("{runtime}", &shell_quote(&build.toolchain.runtime))
            .replace("{package_manager}", &shell_quote(&build.toolchain.package_manager))
            .replace("{prefix}", &shell_quote(&prefix.to_string_lossy()));

        let mut spinner = TaskSpinner::new(&self.ui);
        spinner.start(&format!("Installing runtime {}", build.toolchain.runtime));
        let step = Step::new("toolchain install", command, &self.ctx.project_dir, build.env.clone());
        if let Err(e) = self.run_step(&step, log).await {
            spinner.stop_error("Toolchain install failed");
            return Err(e);
        }
        let installed = match self.installed_toolchain(build, log).await {
            Ok(installed) => installed,
            Err(e) => {
                spinner.stop_error("Could not read toolchain versions");
                return Err(e);
            }
        };
        spinner.stop(&format!(
            "Installed runtime {} / package manager {}",
            installed.runtime, installed.package_manager
        ));

        build.signature = CacheSignature::compute(&installed, &build.entries);
        build.toolchain = installed;
        log.line(&format!("Cache signature {}", build.signature)).await?;

        let bin_dir = self.config.toolchain.bin_dir();
        let dependency_bin = Path::new(&self.config.install.dependency_dir).join(".bin");
        let lines = vec![
            path_export(&[bin_dir.as_path(), dependency_bin.as_path()]),
            "export NODE_ENV=${NODE_ENV:-production}".to_string(),
        ];
        let fragment = write_profile(&self.ctx.project_dir, "kiln", &lines).await?;
        log.line(&format!("Wrote {}", fragment.display())).await?;
        Ok(())
    }

    /// Versions the installed toolchain reports, or the declared ranges when
    /// no version command is configured
    async fn installed_toolchain(&self, build: &Build, log: &DiagnosticLog) -> KilnResult<ToolchainDescriptor> {
        let command = self.config.toolchain.version_command.trim();
        if command.is_empty() {
            log.line("No version command configured, signing declared ranges").await?;
            return Ok(build.toolchain.clone());
        }

        let step = Step::new("toolchain version", command, &self.ctx.project_dir, build.env.clone());
        log.line(&format!("$ {}", step.command)).await?;
        let outcome = self.runner.run(&step, log).await?.ensure_success(&step)?;
        let installed = ToolchainDescriptor::from_reported(&outcome.stdout).ok_or_else(|| {
            KilnError::ToolchainVersion {
                command: command.to_string(),
            }
        })?;
        debug!(
            "Installed toolchain {} / {}",
            installed.runtime, installed.package_manager
        );
        Ok(installed)
    }

    async fn external_deps_install(&self, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        if self.config.external.is_empty() {
            ui::remark(&self.ui, "None configured");
            return log.line("No external dependencies configured").await;
        }

        for external in &self.config.external {
            let mut spinner = TaskSpinner::new(&self.ui);
            spinner.start(&format!("Installing {}", external.name));
            let step = Step::new(&external.name, &external.command, &self.ctx.project_dir, build.env.clone());
            if let Err(e) = self.run_step(&step, log).await {
                spinner.stop_error(&format!("{} failed", external.name));
                return Err(e);
            }
            spinner.stop(&format!("Installed {}", external.name));

            if !external.profile.is_empty() {
                let fragment = write_profile(&self.ctx.project_dir, &external.name, &external.profile).await?;
                log.line(&format!("Wrote {}", fragment.display())).await?;
            }
        }
        Ok(())
    }

    async fn cache_restore(&self, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        if !self.config.cache.enabled {
            ui::remark(&self.ui, "Caching disabled");
            return log.line("Caching disabled, skipping restore").await;
        }

        build.signature_status = self.cache.signatures().status(&build.signature).await;
        log.line(&format!("Cache signature: {}", build.signature_status)).await?;

        match build.signature_status {
            SignatureStatus::Valid => {}
            SignatureStatus::Missing => {
                ui::step_info(&self.ui, "No previous cache, starting cold");
                return log.line("No cache signature found, skipping restore").await;
            }
            SignatureStatus::Invalid => {
                ui::step_info(&self.ui, "Toolchain or cache directories changed, starting cold");
                return log.line("Cache signature mismatch, skipping restore").await;
            }
        }

        let report = self
            .cache
            .directories()
            .restore(&self.ctx.project_dir, &build.entries)
            .await?;
        for entry in &report.restored {
            log.line(&format!("Restored {}", entry)).await?;
            ui::step_ok(&self.ui, &format!("Restored {}", entry));
        }
        for entry in &report.skipped {
            log.line(&format!("{} not cached", entry)).await?;
            ui::remark(&self.ui, &format!("{} not cached", entry));
        }
        build.restored = report.restored;
        Ok(())
    }

    async fn hook(&self, hook: &str, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        let runner = HookRunner::new(&build.manifest, self.runner, &self.ctx.project_dir);
        match runner.run_if_present(hook, &build.env, log).await? {
            HookOutcome::Absent => ui::remark(&self.ui, &format!("No {} script", hook)),
            HookOutcome::Ran => ui::step_ok(&self.ui, &format!("Ran {}", hook)),
        }
        Ok(())
    }

    async fn dependency_build(&self, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        let (label, command) = match build.decision {
            InstallDecision::FreshInstall => ("install", &self.config.install.fresh_command),
            InstallDecision::RebuildExisting => ("rebuild", &self.config.install.rebuild_command),
        };
        log.line(&format!("Strategy: {}", build.decision)).await?;

        let mut spinner = TaskSpinner::new(&self.ui);
        spinner.start(&format!("Running {}", command));
        let step = Step::new(label, command.as_str(), &self.ctx.project_dir, build.env.clone());
        if let Err(e) = self.run_step(&step, log).await {
            spinner.stop_error(&format!("Dependency {} failed", label));
            return Err(e);
        }
        spinner.stop(&format!("Dependencies ready ({})", build.decision));
        Ok(())
    }

    async fn cache_save(&self, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        if !self.config.cache.enabled {
            self.cache.purge().await?;
            ui::remark(&self.ui, "Caching disabled, cleared previous cache");
            return log.line("Caching disabled, cleared previous cache").await;
        }

        // Nothing may vouch for the entries until every copy has landed
        self.cache.signatures().remove().await?;
        let directories = self.cache.directories();
        build.saved = directories.save(&self.ctx.project_dir, &build.entries).await?;
        self.cache.signatures().save(&build.signature).await?;
        directories
            .write_metadata(self.build_id, &build.signature, &build.toolchain, &build.saved)
            .await?;

        for entry in &build.saved {
            log.line(&format!("Cached {}", entry)).await?;
        }
        ui::step_ok_detail(
            &self.ui,
            "Cache saved",
            &format!("{} of {} directories", build.saved.len(), build.entries.len()),
        );
        Ok(())
    }

    async fn summary(&self, build: &mut Build, log: &DiagnosticLog) -> KilnResult<()> {
        let step = Step::new(
            "summary",
            self.config.install.summary_command.as_str(),
            &self.ctx.project_dir,
            build.env.clone(),
        );
        let outcome = self.runner.run(&step, log).await?;
        if !outcome.success() {
            // Listing problems (e.g. extraneous packages) don't fail a finished build
            warn!("Summary command exited with {}", outcome.code);
        }

        build.dependencies = outcome
            .stdout
            .iter()
            .skip(1)
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if build.dependencies.is_empty() {
            ui::remark(&self.ui, "No top-level dependencies");
        } else {
            ui::note(&self.ui, "Installed dependencies", &build.dependencies.join("\n"));
        }
        Ok(())
    }

    async fn run_step(&self, step: &Step, log: &DiagnosticLog) -> KilnResult<()> {
        log.line(&format!("$ {}", step.command)).await?;
        self.runner.run(step, log).await?.ensure_success(step)?;
        Ok(())
    }

    async fn fail(
        &self,
        stage: Stage,
        error: KilnError,
        completed: Vec<Stage>,
        log: &DiagnosticLog,
    ) -> BuildFailure {
        warn!("Build {} failed in {}: {}", self.build_id, stage, error);
        if let Err(e) = log.line(&format!("Build failed during {}: {}", stage, error)).await {
            warn!("Failed to record failure in log: {}", e);
        }

        let remedies = match log.contents().await {
            Ok(contents) => diagnose(&contents),
            Err(e) => {
                warn!("Failed to read diagnostic log: {}", e);
                Vec::new()
            }
        };

        self.failure(stage, error, completed, remedies)
    }

    fn failure(
        &self,
        stage: Stage,
        error: KilnError,
        completed: Vec<Stage>,
        remedies: Vec<Remedy>,
    ) -> BuildFailure {
        BuildFailure {
            stage,
            error,
            completed,
            remedies,
            log_path: self.ctx.log_path.clone(),
        }
    }

    fn project_path(&self, relative: &Path) -> PathBuf {
        self.ctx.project_dir.join(relative)
    }

    fn dependency_bin_dir(&self) -> PathBuf {
        self.ctx
            .project_dir
            .join(&self.config.install.dependency_dir)
            .join(".bin")
    }
}

/// Quote a value for `sh -c`
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
