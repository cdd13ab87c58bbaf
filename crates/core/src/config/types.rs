use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub qbittorrent: QBittorrentConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub plex: PlexConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// qBittorrent WebUI connection settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// WebUI base URL (e.g., "http://localhost:8080")
    #[serde(default, deserialize_with = "string_or_number")]
    pub url: String,
    /// WebUI username (defaults to the monitored category)
    #[serde(default, deserialize_with = "string_or_number")]
    pub username: String,
    /// WebUI password (defaults to the monitored category)
    #[serde(default, deserialize_with = "string_or_number")]
    pub password: String,
}

/// HTTP transport settings shared by every outbound client.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Accept invalid TLS certificates (self-signed WebUI setups)
    #[serde(default)]
    pub tls_insecure_skip_verify: bool,
    /// Bind outbound connections to IPv4
    #[serde(default = "default_true")]
    pub prefer_ipv4: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            tls_insecure_skip_verify: false,
            prefer_ipv4: true,
        }
    }
}

impl TransportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs))
    }
}

fn default_timeout() -> u32 {
    30
}

fn default_true() -> bool {
    true
}

/// How files are materialized into the destination tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Hardlink,
    Copy,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Hardlink => "hardlink",
            Operation::Copy => "copy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when a hardlink crosses filesystems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDeviceFallback {
    #[default]
    Copy,
    Error,
}

impl CrossDeviceFallback {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrossDeviceFallback::Copy => "copy",
            CrossDeviceFallback::Error => "error",
        }
    }
}

impl fmt::Display for CrossDeviceFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monitoring and placement settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// qBittorrent category to watch
    #[serde(default, deserialize_with = "string_or_number")]
    pub category: String,
    /// Root of the destination tree
    #[serde(default)]
    pub dest_path: PathBuf,
    /// Seconds between polls (default: 30)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub operation: Operation,
    #[serde(default)]
    pub cross_device_fallback: CrossDeviceFallback,
    /// Remove the torrent from qBittorrent once every file is placed
    #[serde(default)]
    pub delete_torrent: bool,
    /// Also delete the downloaded data when removing the torrent
    #[serde(default)]
    pub delete_files: bool,
    /// Place files under `dest_path/<torrent name>/` instead of flattening
    #[serde(default)]
    pub preserve_subfolder: bool,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_log_level", deserialize_with = "string_or_number")]
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            category: String::new(),
            dest_path: PathBuf::new(),
            poll_interval_secs: default_poll_interval(),
            operation: Operation::default(),
            cross_device_fallback: CrossDeviceFallback::default(),
            delete_torrent: false,
            delete_files: false,
            preserve_subfolder: false,
            dry_run: false,
            log_level: default_log_level(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn default_poll_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Plex Media Server library refresh settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlexConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Server URL; port 32400 is assumed when none is given
    #[serde(default, deserialize_with = "string_or_number")]
    pub url: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub token: String,
}

/// Webhook notification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Endpoints receiving a JSON POST per event
    #[serde(default)]
    pub webhook_urls: Vec<String>,
    #[serde(default = "default_true")]
    pub on_success: bool,
    #[serde(default = "default_true")]
    pub on_error: bool,
    #[serde(default = "default_true")]
    pub on_refresh_error: bool,
    #[serde(default)]
    pub on_torrent_delete: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_urls: Vec::new(),
            on_success: true,
            on_error: true,
            on_refresh_error: true,
            on_torrent_delete: false,
        }
    }
}

/// Telegram bot settings (outbound messages only)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub token: String,
    /// Chats that receive event messages
    #[serde(default)]
    pub chat_ids: Vec<i64>,
}

/// Status endpoint settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    9797
}

/// Sanitized config for logging and the status endpoint (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub qbittorrent_url: String,
    pub qbittorrent_username: String,
    pub transport: TransportConfig,
    pub monitor: MonitorConfig,
    pub plex_enabled: bool,
    pub plex_url: String,
    pub notification_urls: usize,
    pub telegram_enabled: bool,
    pub telegram_chats: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            qbittorrent_url: config.qbittorrent.url.clone(),
            qbittorrent_username: config.qbittorrent.username.clone(),
            transport: config.transport.clone(),
            monitor: config.monitor.clone(),
            plex_enabled: config.plex.enabled,
            plex_url: config.plex.url.clone(),
            notification_urls: if config.notifications.enabled {
                config.notifications.webhook_urls.len()
            } else {
                0
            },
            telegram_enabled: config.telegram.enabled,
            telegram_chats: config.telegram.chat_ids.len(),
        }
    }
}

/// Accept a bare number where a string is expected.
///
/// Environment overrides are type-inferred, so `QB_SYNC_QBITTORRENT__PASSWORD=12345`
/// arrives as an integer.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> de::Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or a number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_char<E: de::Error>(self, v: char) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[qbittorrent]
url = "http://localhost:8080"

[monitor]
category = "movies"
dest_path = "/media/movies"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.qbittorrent.url, "http://localhost:8080");
        assert_eq!(config.monitor.category, "movies");
        assert_eq!(config.monitor.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.monitor.operation, Operation::Hardlink);
        assert_eq!(config.monitor.cross_device_fallback, CrossDeviceFallback::Copy);
        assert_eq!(config.monitor.log_level, "info");
        assert!(!config.monitor.dry_run);
        assert!(config.transport.prefer_ipv4);
        assert_eq!(config.transport.timeout(), Duration::from_secs(30));
        assert!(!config.plex.enabled);
        assert!(!config.http.enabled);
    }

    #[test]
    fn test_deserialize_copy_mode() {
        let toml = r#"
[monitor]
category = "tv"
dest_path = "/media/tv"
operation = "copy"
cross_device_fallback = "error"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.monitor.operation, Operation::Copy);
        assert_eq!(
            config.monitor.cross_device_fallback,
            CrossDeviceFallback::Error
        );
    }

    #[test]
    fn test_deserialize_numeric_strings() {
        let toml = r#"
[qbittorrent]
password = 12345

[monitor]
category = 2024

[telegram]
token = 42
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.qbittorrent.password, "12345");
        assert_eq!(config.monitor.category, "2024");
        assert_eq!(config.telegram.token, "42");
        assert_eq!(config.monitor.log_level, "info");
    }

    #[test]
    fn test_deserialize_rejects_unknown_operation() {
        let toml = r#"
[monitor]
operation = "symlink"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_rejects_unknown_fallback() {
        let toml = r#"
[monitor]
cross_device_fallback = "skip"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_notification_defaults() {
        let config = NotificationConfig::default();
        assert!(!config.enabled);
        assert!(config.on_success);
        assert!(config.on_error);
        assert!(config.on_refresh_error);
        assert!(!config.on_torrent_delete);
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Hardlink.to_string(), "hardlink");
        assert_eq!(Operation::Copy.to_string(), "copy");
        assert_eq!(CrossDeviceFallback::Error.to_string(), "error");
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let toml = r#"
[qbittorrent]
url = "http://qb:8080"
username = "admin"
password = "hunter2"

[plex]
enabled = true
url = "http://plex"
token = "plex-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("plex-secret"));
        assert!(json.contains("http://qb:8080"));
        assert!(sanitized.plex_enabled);
    }
}
