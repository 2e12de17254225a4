//! Cache command - inspect or clear a build cache

use crate::cache::{BuildCache, SignatureStatus};
use crate::cli::args::{CacheAction, CacheArgs};
use crate::config::Config;
use crate::error::KilnResult;
use crate::manifest::Manifest;
use crate::pipeline::CachePlan;
use crate::ui::{self, UiContext};
use std::path::Path;
use tracing::debug;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, ctx: &UiContext) -> KilnResult<()> {
    match args.action {
        CacheAction::Status { project, cache } => show_status(&project, &cache, config, ctx).await,
        CacheAction::Clear { cache, yes } => {
            clear_cache(&cache, &ctx.clone().with_auto_yes(yes)).await
        }
    }
}

/// Show whether the cache would be restored for a project
async fn show_status(
    project_dir: &Path,
    cache_dir: &Path,
    config: &Config,
    ctx: &UiContext,
) -> KilnResult<()> {
    let manifest = Manifest::load(project_dir).await?;
    let cache = BuildCache::new(cache_dir);
    let metadata = cache.directories().read_metadata().await;

    // Installed versions are only known to a build; reuse the last ones seen
    let mut plan = CachePlan::resolve(&manifest, config)?;
    let recorded = metadata.as_ref().and_then(|m| m.toolchain.clone());
    if let Some(toolchain) = recorded.clone() {
        plan = plan.with_toolchain(toolchain);
    }

    let status = cache.signatures().status(&plan.signature).await;
    debug!("Expected signature {}", plan.signature);

    ui::section(ctx, "Cache status");
    ui::key_value(ctx, "Cache", &cache.root().display().to_string());
    ui::key_value_status(
        ctx,
        "Signature",
        &status.to_string(),
        status == SignatureStatus::Valid,
    );
    let runtime = format!("{} / {}", plan.toolchain.runtime, plan.toolchain.package_manager);
    if recorded.is_some() {
        ui::key_value(ctx, "Runtime", &format!("{} (last installed)", runtime));
    } else {
        ui::key_value(ctx, "Runtime", &format!("{} (declared)", runtime));
    }
    ui::key_value(ctx, "Directories", &format!("{} ({})", plan.entries.len(), plan.source));

    let cached = cache.directories().cached(&plan.entries);
    for entry in &plan.entries {
        let present = cached.contains(entry);
        ui::key_value_status(
            ctx,
            entry.as_str(),
            if present { "cached" } else { "not cached" },
            present,
        );
    }

    match metadata {
        Some(metadata) => {
            ui::key_value(ctx, "Last build", &metadata.build_id.to_string());
            ui::key_value(
                ctx,
                "Saved at",
                &metadata.saved_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            );
        }
        None => ui::remark(ctx, "No save recorded"),
    }

    if !status.allows_restore() {
        ui::step_info(ctx, "The next build will start with a cold cache");
    } else {
        ui::remark(ctx, "A different installed runtime will still start cold");
    }

    Ok(())
}

/// Remove everything kiln stored in the cache directory
async fn clear_cache(cache_dir: &Path, ctx: &UiContext) -> KilnResult<()> {
    let cache = BuildCache::new(cache_dir);

    if !cache.root().exists() {
        ui::remark(ctx, "Cache is already empty");
        return Ok(());
    }

    let prompt = format!("Clear cache at {}?", cache.root().display());
    if !ui::confirm(ctx, &prompt, false).await? {
        ui::remark(ctx, "Aborted");
        return Ok(());
    }

    cache.purge().await?;
    ui::step_ok(ctx, &format!("Cleared {}", cache.root().display()));
    Ok(())
}
