//! Layered application configuration.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use binday_provider_belfast::ScraperSettings;

const DEFAULT_CONFIG_FILE: &str = "binday.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) cache: CacheConfig,
    pub(crate) scraper: ScraperSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CacheConfig {
    /// SQLite file holding the schedule cache.
    pub(crate) path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("binday.sqlite3"),
        }
    }
}

/// Defaults, then the config file, then `BINDAY__*` environment variables.
///
/// An explicitly named file must exist; the default `binday.toml` is optional.
pub(crate) fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    Config::builder()
        .add_source(Config::try_from(&AppConfig::default())?)
        .add_source(file)
        .add_source(
            Environment::with_prefix("BINDAY")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
