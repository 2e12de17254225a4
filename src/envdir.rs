//! External environment directory
//!
//! The caller passes a directory containing one file per variable: the
//! file name is the variable name and the file contents are its value.

use crate::error::{KilnError, KilnResult};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Load variables from `dir`, skipping blacklisted names.
///
/// A missing directory yields no variables. One trailing newline is
/// stripped from each value.
pub async fn load_env_dir(dir: &Path, blacklist: &[String]) -> KilnResult<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();

    if !dir.is_dir() {
        debug!("No environment directory at {}", dir.display());
        return Ok(vars);
    }

    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| KilnError::io(format!("reading env dir {}", dir.display()), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| KilnError::io(format!("reading env dir {}", dir.display()), e))?
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            debug!("Skipping non UTF-8 env file {}", path.display());
            continue;
        };

        if blacklist.iter().any(|b| b == &name) {
            debug!("Skipping blacklisted variable {}", name);
            continue;
        }

        let value = fs::read_to_string(&path)
            .await
            .map_err(|e| KilnError::io(format!("reading env file {}", path.display()), e))?;
        let value = value
            .strip_suffix("\r\n")
            .or_else(|| value.strip_suffix('\n'))
            .unwrap_or(&value)
            .to_string();

        vars.insert(name, value);
    }

    debug!("Loaded {} variables from {}", vars.len(), dir.display());
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn blacklist() -> Vec<String> {
        vec!["PATH".to_string(), "LD_PRELOAD".to_string()]
    }

    #[tokio::test]
    async fn loads_one_variable_per_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("NODE_ENV"), "production\n").unwrap();
        std::fs::write(dir.path().join("MULTILINE"), "a\nb\n").unwrap();

        let vars = load_env_dir(dir.path(), &blacklist()).await.unwrap();

        assert_eq!(vars.get("NODE_ENV").map(String::as_str), Some("production"));
        assert_eq!(vars.get("MULTILINE").map(String::as_str), Some("a\nb"));
    }

    #[tokio::test]
    async fn skips_blacklisted_and_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("PATH"), "/evil").unwrap();
        std::fs::write(dir.path().join("API_KEY"), "secret").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let vars = load_env_dir(dir.path(), &blacklist()).await.unwrap();

        assert_eq!(vars.len(), 1);
        assert!(vars.contains_key("API_KEY"));
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let vars = load_env_dir(&dir.path().join("absent"), &blacklist())
            .await
            .unwrap();
        assert!(vars.is_empty());
    }
}
