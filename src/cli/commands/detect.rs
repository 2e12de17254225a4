//! Detect command - report whether a directory is buildable

use crate::cli::args::DetectArgs;
use crate::error::{KilnError, KilnResult};
use crate::manifest::Manifest;
use tracing::debug;

/// Project kind printed on a successful detection
pub const PROJECT_KIND: &str = "Node.js";

/// Execute the detect command
pub fn execute(args: DetectArgs) -> KilnResult<()> {
    let manifest = Manifest::path_in(&args.project);
    if !manifest.is_file() {
        return Err(KilnError::ManifestNotFound(args.project));
    }

    debug!("Found {}", manifest.display());
    println!("{}", PROJECT_KIND);
    Ok(())
}
