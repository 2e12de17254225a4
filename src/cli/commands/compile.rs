//! Compile command - run the build pipeline on a project

use crate::cli::args::CompileArgs;
use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::pipeline::{BuildContext, BuildFailure, BuildReport, Orchestrator};
use crate::runner::ShellRunner;
use crate::ui::{self, UiContext};

/// Execute the compile command
pub async fn execute(args: CompileArgs, config: &Config, ctx: &UiContext) -> KilnResult<()> {
    let log_path = args
        .log
        .unwrap_or_else(|| config.general.log_path.clone());
    let build = BuildContext::new(args.project, args.cache, args.env, log_path);
    let runner = ShellRunner::new();

    ui::intro(ctx, "kiln compile");

    match Orchestrator::new(build, config, &runner, ctx.clone())
        .run()
        .await
    {
        Ok(report) => {
            print_report(ctx, &report);
            ui::outro_success(ctx, "Build succeeded");
            Ok(())
        }
        Err(failure) => {
            print_failure(ctx, &failure);
            Err(KilnError::BuildFailed {
                stage: failure.stage.to_string(),
                source: Box::new(failure.error),
            })
        }
    }
}

fn print_report(ctx: &UiContext, report: &BuildReport) {
    ui::key_value(ctx, "Build", &report.build_id.to_string());
    ui::key_value(ctx, "Dependencies", &report.decision.to_string());
    ui::key_value(ctx, "Cache", &report.signature_status.to_string());
    ui::key_value(
        ctx,
        "Restored",
        &format!("{} directories", report.restored.len()),
    );
    ui::key_value(ctx, "Saved", &format!("{} directories", report.saved.len()));

    if !report.warnings.is_empty() {
        ui::note(ctx, "Warnings", &report.warnings.join("\n"));
    }
}

fn print_failure(ctx: &UiContext, failure: &BuildFailure) {
    if failure.is_precondition() {
        ui::step_error_detail(ctx, "Invalid project", &failure.error.to_string());
    } else {
        ui::step_error_detail(
            ctx,
            &format!("Build failed during {}", failure.stage),
            &failure.error.to_string(),
        );
    }

    if let Some(hint) = failure.error.hint() {
        ui::step_info(ctx, &format!("Hint: {}", hint));
    }
    for remedy in &failure.remedies {
        ui::step_warn_hint(ctx, remedy.title, remedy.advice);
    }

    ui::key_value(ctx, "Log", &failure.log_path.display().to_string());
    ui::outro_error(ctx, "Build failed");
}
