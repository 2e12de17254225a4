//! Kiln - staged dependency builds with a signature-gated cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use kiln::cli::{Cli, Commands, LogFormat};
use kiln::config::ConfigManager;
use kiln::error::{KilnError, KilnResult};
use kiln::ui::{self, UiContext};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_reported() => {
            debug!("{}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KilnResult<()> {
    let cli = Cli::parse();

    // Completions don't need config loading
    if let Commands::Completions(args) = cli.command {
        kiln::cli::commands::completions(args);
        return Ok(());
    }

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Local config lives in the project being operated on, or the cwd
    let local_config_path = if cli.no_local {
        None
    } else {
        match cli.command.project_dir() {
            Some(dir) => ConfigManager::find_local_config(dir),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|e| KilnError::io("getting current directory", e))?;
                ConfigManager::find_local_config(&cwd)
            }
        }
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    let format = cli
        .log_format
        .unwrap_or_else(|| LogFormat::from_config(&config.general.log_format));
    init_tracing(cli.verbose, format);

    if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
    } else if let Some(ref path) = local_config_path {
        debug!("Using local config: {}", path.display());
    }

    let ctx = UiContext::detect().with_plain(cli.plain);
    if ctx.is_interactive() {
        ui::init_theme();
    }

    match cli.command {
        Commands::Compile(args) => kiln::cli::commands::compile(args, &config, &ctx).await,
        Commands::Detect(args) => kiln::cli::commands::detect(args),
        Commands::Cache(args) => kiln::cli::commands::cache(args, &config, &ctx).await,
        Commands::Config(args) => {
            kiln::cli::commands::config(args, &config, &config_manager, &ctx).await
        }
        Commands::Completions(_) => Ok(()),
    }
}

/// Tracing goes to stderr: 0 = warn (progress only), 1 = info, 2+ = debug
fn init_tracing(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => EnvFilter::new("kiln=warn"),
        1 => EnvFilter::new("kiln=info"),
        _ => EnvFilter::new("kiln=debug"),
    };

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
}
