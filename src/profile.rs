//! Runtime profile fragments
//!
//! Shell snippets written to `<project>/.profile.d/` are sourced by the
//! deployed runtime environment. Kiln only writes them.

use crate::error::{KilnError, KilnResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Directory holding profile fragments, relative to the project
pub const PROFILE_DIR: &str = ".profile.d";

/// Write `<project>/.profile.d/<name>.sh` with the given lines
pub async fn write_profile(project_dir: &Path, name: &str, lines: &[String]) -> KilnResult<PathBuf> {
    let dir = project_dir.join(PROFILE_DIR);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| KilnError::io(format!("creating {}", dir.display()), e))?;

    let path = dir.join(format!("{}.sh", sanitize(name)));
    let mut content = lines.join("\n");
    content.push('\n');

    fs::write(&path, content)
        .await
        .map_err(|e| KilnError::io(format!("writing profile {}", path.display()), e))?;

    debug!("Wrote profile fragment {}", path.display());
    Ok(path)
}

/// PATH export for the runtime. `$HOME` is the project root at runtime.
pub fn path_export(relative_dirs: &[&Path]) -> String {
    let dirs: Vec<String> = relative_dirs
        .iter()
        .map(|d| format!("$HOME/{}", d.display()))
        .collect();
    format!("export PATH=\"{}:$PATH\"", dirs.join(":"))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
