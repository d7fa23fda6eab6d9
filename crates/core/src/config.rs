//! Application configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Directory under the user's config dir holding `config.toml`.
pub const CONFIG_DIR: &str = "gamelog";
/// Prefix for environment overrides, e.g. `GAMELOG_STORE_PATH`.
pub const ENV_PREFIX: &str = "GAMELOG";

const DEFAULT_STORE_PATH: &str = "./games.csv";
const DEFAULT_LOG_DIR: &str = "./logs";

const DEFAULT_CONFIG: &str = r#"# gamelog configuration

# CSV file holding the game collection.
store_path = "./games.csv"

# Directory for gamelog.log.
log_dir = "./logs"
"#;

/// Settings resolved from defaults, the config file and the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Backing store for the library.
    pub store_path: PathBuf,
    /// Where the log file is written.
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl AppConfig {
    /// Load from the default config file location plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .set_default("store_path", DEFAULT_STORE_PATH)?
            .set_default("log_dir", DEFAULT_LOG_DIR)?
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .with_context(|| format!("failed to read config {}", path.display()))?;

        settings
            .try_deserialize()
            .context("failed to parse configuration")
    }
}

/// Location of `config.toml` under the user's config directory.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join("config.toml")
}

/// Write the default config file if none exists yet and return its path.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Default config written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_falls_back_to_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    }

    #[test]
    fn file_overrides_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "store_path = \"/tmp/backlog.csv\"\n")?;

        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.store_path, PathBuf::from("/tmp/backlog.csv"));
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
        Ok(())
    }

    #[test]
    fn default_file_is_written_once_and_parses() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        write_default_config(&path)?;
        fs::write(&path, "store_path = \"mine.csv\"\n")?;
        write_default_config(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "store_path = \"mine.csv\"\n");

        fs::write(&path, DEFAULT_CONFIG)?;
        assert_eq!(AppConfig::load_from(&path)?, AppConfig::default());
        Ok(())
    }
}
