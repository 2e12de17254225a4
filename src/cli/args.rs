//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::{Path, PathBuf};

/// Kiln - staged dependency builds with a signature-gated cache
///
/// Installs a project's toolchain and dependencies, reusing cached
/// dependency directories from earlier builds when they are still valid.
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KILN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip project-local .kiln.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Plain output without spinners or colors
    #[arg(long, global = true)]
    pub plain: bool,

    /// Tracing output format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a project's dependencies
    Compile(CompileArgs),

    /// Check whether a directory holds a buildable project
    Detect(DetectArgs),

    /// Inspect or clear a build cache
    Cache(CacheArgs),

    /// Show or edit configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Commands {
    /// Project directory the command operates on, used for local config discovery
    pub fn project_dir(&self) -> Option<&Path> {
        match self {
            Self::Compile(args) => Some(&args.project),
            Self::Detect(args) => Some(&args.project),
            Self::Cache(CacheArgs {
                action: CacheAction::Status { project, .. },
            }) => Some(project),
            _ => None,
        }
    }
}

/// Arguments for the compile command
#[derive(Parser, Debug)]
pub struct CompileArgs {
    /// Project directory to build in place
    pub project: PathBuf,

    /// Persistent cache directory
    pub cache: PathBuf,

    /// Directory of environment variables, one file per variable
    pub env: PathBuf,

    /// Diagnostic log path (default: general.log_path)
    #[arg(long)]
    pub log: Option<PathBuf>,
}

/// Arguments for the detect command
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Project directory
    pub project: PathBuf,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show signature validity and cached entries for a project
    Status {
        /// Project directory
        project: PathBuf,

        /// Cache directory
        cache: PathBuf,
    },

    /// Remove cached entries and the signature
    Clear {
        /// Cache directory
        cache: PathBuf,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., install.fresh_command)
        key: String,
        /// Value to set
        value: String,
        /// Write to project-local .kiln.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse the `general.log_format` config value, defaulting to text
    pub fn from_config(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}
