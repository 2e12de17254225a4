//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager, LOCAL_CONFIG_FILE};
use crate::error::{KilnError, KilnResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.log_path",
    "general.log_format",
    "env.blacklist",
    "toolchain.install_command",
    "toolchain.prefix",
    "toolchain.default_runtime",
    "toolchain.default_package_manager",
    "toolchain.version_command",
    "install.dependency_dir",
    "install.fresh_command",
    "install.rebuild_command",
    "install.summary_command",
    "cache.enabled",
    "cache.default_directories",
    "hooks.pre_build",
    "hooks.post_build",
];

/// Keys stored as comma-separated lists
const LIST_KEYS: &[&str] = &["env.blacklist", "cache.default_directories"];

/// Keys stored as booleans
const BOOL_KEYS: &[&str] = &["cache.enabled"];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    config: &Config,
    manager: &ConfigManager,
    ctx: &UiContext,
) -> KilnResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => show_path(manager),
        Some(ConfigAction::Init { force }) => init_config(manager, force, ctx).await?,
        Some(ConfigAction::Set { key, value, local }) => {
            let path = if local {
                std::env::current_dir()
                    .map_err(|e| KilnError::io("getting current directory", e))?
                    .join(LOCAL_CONFIG_FILE)
            } else {
                manager.path().to_path_buf()
            };
            set_value(&path, &key, &value, ctx).await?
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> KilnResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn show_path(manager: &ConfigManager) {
    println!("{}", manager.path().display());
}

async fn init_config(manager: &ConfigManager, force: bool, ctx: &UiContext) -> KilnResult<()> {
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;

    ui::step_ok_detail(ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Set one key in the TOML file at `path`, keeping every other key as written
async fn set_value(path: &Path, key: &str, value: &str, ctx: &UiContext) -> KilnResult<()> {
    if !VALID_KEYS.contains(&key) {
        ui::step_error_detail(ctx, "Unknown config key", key);
        ui::remark(ctx, "Valid keys:");
        for key in VALID_KEYS {
            eprintln!("  {}", key);
        }
        return Err(KilnError::User(format!("Unknown config key: {}", key)));
    }

    let mut doc = if path.exists() {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KilnError::io(format!("reading {}", path.display()), e))?;
        content
            .parse::<toml::Table>()
            .map_err(|e| KilnError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
    } else {
        toml::Table::new()
    };

    set_toml_value(&mut doc, key, parse_value(key, value)?)?;

    // Reject values that would make the file unloadable
    toml::Value::Table(doc.clone())
        .try_into::<Config>()
        .map_err(|e| KilnError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| KilnError::ConfigDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }
    let content = toml::to_string_pretty(&doc)?;
    fs::write(path, content)
        .await
        .map_err(|e| KilnError::io(format!("writing {}", path.display()), e))?;

    ui::step_ok(ctx, &format!("Set {} = {} in {}", key, value, path.display()));
    Ok(())
}

fn parse_value(key: &str, value: &str) -> KilnResult<toml::Value> {
    if LIST_KEYS.contains(&key) {
        return Ok(toml::Value::Array(
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        ));
    }

    if BOOL_KEYS.contains(&key) {
        return parse_bool(value).map(toml::Value::Boolean);
    }

    Ok(toml::Value::String(value.to_string()))
}

/// Set a dot-separated key in a TOML table, creating intermediate tables as needed
fn set_toml_value(doc: &mut toml::Table, key: &str, value: toml::Value) -> KilnResult<()> {
    let parts: Vec<&str> = key.split('.').collect();
    let Some((leaf, parents)) = parts.split_last() else {
        return Err(KilnError::User(format!("Invalid config key: {}", key)));
    };

    let mut current = doc;
    for part in parents {
        current = current
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()))
            .as_table_mut()
            .ok_or_else(|| KilnError::User(format!("Expected table at key: {}", part)))?;
    }

    current.insert(leaf.to_string(), value);
    Ok(())
}

fn parse_bool(value: &str) -> KilnResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(KilnError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_value_by_key_kind() {
        assert_eq!(
            parse_value("cache.enabled", "no").unwrap(),
            toml::Value::Boolean(false)
        );
        assert_eq!(
            parse_value("install.fresh_command", "true").unwrap(),
            toml::Value::String("true".to_string())
        );
        let list = parse_value("cache.default_directories", "node_modules, vendor,").unwrap();
        assert_eq!(list.as_array().map(Vec::len), Some(2));
        assert!(parse_value("cache.enabled", "maybe").is_err());
    }

    #[test]
    fn set_nested_key_creates_tables() {
        let mut doc = toml::Table::new();
        set_toml_value(&mut doc, "hooks.pre_build", toml::Value::String("prep".into())).unwrap();
        assert_eq!(doc["hooks"]["pre_build"].as_str(), Some("prep"));
    }

    #[tokio::test]
    async fn set_value_preserves_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[install]\nfresh_command = \"yarn\"\n").unwrap();
        let ctx = UiContext::non_interactive();

        set_value(&path, "cache.enabled", "false", &ctx).await.unwrap();

        let config: Config = toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.install.fresh_command, "yarn");
    }

    #[tokio::test]
    async fn set_value_rejects_unknown_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let ctx = UiContext::non_interactive();

        assert!(set_value(&path, "general.verbose", "x", &ctx).await.is_err());
        assert!(!path.exists());
    }
}
