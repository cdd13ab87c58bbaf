use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "QB_SYNC_CONFIG";

/// Prefix for environment overrides (`QB_SYNC_MONITOR__CATEGORY=movies`).
const ENV_PREFIX: &str = "QB_SYNC_";

/// Pick the configuration file to load.
///
/// An explicit path always wins, then `QB_SYNC_CONFIG`, then the first
/// existing default location. `None` means env-only configuration.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path);
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let mut candidates = vec![PathBuf::from("./qb-sync.toml")];
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(Path::new(&home).join(".config/qb-sync/config.toml"));
    }
    candidates.push(PathBuf::from("/etc/qb-sync/config.toml"));

    candidates.into_iter().find(|p| p.exists())
}

/// Load configuration from an optional file with environment variable overrides
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut figment = Figment::new();

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        figment = figment.merge(Toml::file(path));
    }

    let mut config: Config = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    apply_defaults(&mut config);
    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let mut config: Config =
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    apply_defaults(&mut config);
    Ok(config)
}

/// Credentials fall back to the category name, matching the usual
/// one-WebUI-user-per-category setup.
fn apply_defaults(config: &mut Config) {
    if config.qbittorrent.username.is_empty() {
        config.qbittorrent.username = config.monitor.category.clone();
    }
    if config.qbittorrent.password.is_empty() {
        config.qbittorrent.password = config.monitor.category.clone();
    }
}
