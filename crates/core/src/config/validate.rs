use super::{types::Config, ConfigError};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// One day.
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Validate configuration before the monitor starts.
///
/// Operation and cross-device fallback are closed enums and were already
/// checked during deserialization.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.qbittorrent.url.trim().is_empty() {
        return Err(invalid(
            "qbittorrent.url is required (set via config file or QB_SYNC_QBITTORRENT__URL)",
        ));
    }
    if !config.qbittorrent.url.starts_with("http://")
        && !config.qbittorrent.url.starts_with("https://")
    {
        return Err(invalid("qbittorrent.url must start with http:// or https://"));
    }

    if config.monitor.category.is_empty() {
        return Err(invalid(
            "monitor.category is required (set via config file or QB_SYNC_MONITOR__CATEGORY)",
        ));
    }
    if config.monitor.dest_path.as_os_str().is_empty() {
        return Err(invalid(
            "monitor.dest_path is required (set via config file or QB_SYNC_MONITOR__DEST_PATH)",
        ));
    }
    if config.monitor.poll_interval_secs == 0 {
        return Err(invalid("monitor.poll_interval_secs must be positive"));
    }
    if config.monitor.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
        return Err(invalid("monitor.poll_interval_secs cannot exceed 86400"));
    }
    if !LOG_LEVELS.contains(&config.monitor.log_level.as_str()) {
        return Err(invalid(
            "monitor.log_level must be one of: trace, debug, info, warn, error",
        ));
    }

    if config.transport.timeout_secs == 0 {
        return Err(invalid("transport.timeout_secs must be positive"));
    }

    if config.plex.enabled && (config.plex.url.is_empty() || config.plex.token.is_empty()) {
        return Err(invalid("plex.url and plex.token are required when plex is enabled"));
    }

    if config.telegram.enabled && config.telegram.token.is_empty() {
        return Err(invalid("telegram.token is required when telegram is enabled"));
    }

    if config.http.enabled && config.http.port == 0 {
        return Err(invalid("http.port cannot be 0"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
