//! Gateway configuration file handling
//!
//! Configuration is a TOML file with one section per concern. Any value can
//! be overridden from the environment (`WAMD_*` variables), which is how
//! container deployments usually set it.
//!
//! ## Sections
//!
//! - `[datastore]` - device datastore kind and URI
//! - `[client]` - proxy and the device properties advertised to the network
//! - `[media]` - image conversion and compression toggles
//! - `[pairing]` - QR pairing timeouts
//! - `[logging]` - log level and output format

use crate::engine::{AppVersion, ClientOptions, DeviceProps, PlatformType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_DATASTORE_KIND: &str = "sqlite";
const DEFAULT_DATASTORE_URI: &str = "file:wamd.db?_foreign_keys=on";
const DEFAULT_PLATFORM_NAME: &str = "Chrome";
const DEFAULT_PLATFORM_TYPE: &str = "chrome";
const DEFAULT_CODE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_PAIRING_WINDOW: Duration = Duration::from_secs(180);

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv { name: String, value: String },
}

/// Complete gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub datastore: DatastoreConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub pairing: PairingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device datastore location
///
/// The gateway never opens the datastore itself. The embedding service reads
/// this section to construct the [`DeviceStore`](crate::engine::DeviceStore)
/// it hands to [`SessionManager::new`](crate::SessionManager::new).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatastoreConfig {
    /// Datastore driver (e.g. "sqlite", "postgres")
    #[serde(default = "default_datastore_kind")]
    pub kind: String,

    #[serde(default = "default_datastore_uri")]
    pub uri: String,
}

/// Engine client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Proxy for the engine transport (optional)
    pub proxy_url: Option<String>,

    /// Platform name shown in the account's linked devices list
    #[serde(default = "default_platform_name")]
    pub platform_name: String,

    /// Platform tag, see `PlatformType::from_tag`
    #[serde(default = "default_platform_type")]
    pub platform_type: String,

    #[serde(default)]
    pub version: AppVersion,
}

/// Image preprocessing toggles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Re-encode WebP images as PNG before sending
    #[serde(default)]
    pub convert_webp: bool,

    /// Shrink images so the longer side is at most 1024px
    #[serde(default)]
    pub compress: bool,
}

/// QR pairing timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// How long `login` waits for the first pairing code
    #[serde(default = "default_code_timeout", with = "humantime_str")]
    pub code_timeout: Duration,

    /// How long pairing events are watched after the code is returned
    #[serde(default = "default_pairing_window", with = "humantime_str")]
    pub pairing_window: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_datastore_kind() -> String {
    DEFAULT_DATASTORE_KIND.to_string()
}

fn default_datastore_uri() -> String {
    DEFAULT_DATASTORE_URI.to_string()
}

fn default_platform_name() -> String {
    DEFAULT_PLATFORM_NAME.to_string()
}

fn default_platform_type() -> String {
    DEFAULT_PLATFORM_TYPE.to_string()
}

fn default_code_timeout() -> Duration {
    DEFAULT_CODE_TIMEOUT
}

fn default_pairing_window() -> Duration {
    DEFAULT_PAIRING_WINDOW
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            kind: default_datastore_kind(),
            uri: default_datastore_uri(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            platform_name: default_platform_name(),
            platform_type: default_platform_type(),
            version: AppVersion::default(),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            code_timeout: DEFAULT_CODE_TIMEOUT,
            pairing_window: DEFAULT_PAIRING_WINDOW,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Durations written as humantime strings ("30s", "3m")
mod humantime_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_u32(name: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        name: name.to_string(),
        value: value.to_string(),
    })
}

impl ClientConfig {
    /// Device properties for new sessions
    pub fn device_props(&self) -> DeviceProps {
        DeviceProps {
            os: self.platform_name.clone(),
            platform_type: PlatformType::from_tag(&self.platform_type),
            version: self.version,
            require_full_sync: false,
        }
    }

    /// Construction options for engine clients
    ///
    /// Auto-reconnect and automatic identity trust are always enabled; an
    /// empty proxy URL means no proxy.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            props: self.device_props(),
            proxy_url: self
                .proxy_url
                .as_ref()
                .filter(|url| !url.trim().is_empty())
                .cloned(),
            auto_reconnect: true,
            auto_trust_identity: true,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        write_file(path, &contents)
    }

    /// Apply `WAMD_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Applied to a copy so a malformed value leaves `self` untouched
        let mut next = self.clone();
        if let Some(kind) = lookup("WAMD_DATASTORE_TYPE") {
            next.datastore.kind = kind;
        }
        if let Some(uri) = lookup("WAMD_DATASTORE_URI") {
            next.datastore.uri = uri;
        }
        if let Some(proxy) = lookup("WAMD_PROXY_URL") {
            next.client.proxy_url = Some(proxy);
        }
        if let Some(name) = lookup("WAMD_PLATFORM_NAME") {
            next.client.platform_name = name;
        }
        if let Some(tag) = lookup("WAMD_PLATFORM_TYPE") {
            next.client.platform_type = tag;
        }
        if let Some(v) = lookup("WAMD_VERSION_MAJOR") {
            next.client.version.major = Some(parse_u32("WAMD_VERSION_MAJOR", &v)?);
        }
        if let Some(v) = lookup("WAMD_VERSION_MINOR") {
            next.client.version.minor = Some(parse_u32("WAMD_VERSION_MINOR", &v)?);
        }
        if let Some(v) = lookup("WAMD_VERSION_PATCH") {
            next.client.version.patch = Some(parse_u32("WAMD_VERSION_PATCH", &v)?);
        }
        if let Some(v) = lookup("WAMD_MEDIA_CONVERT_WEBP") {
            next.media.convert_webp = parse_bool("WAMD_MEDIA_CONVERT_WEBP", &v)?;
        }
        if let Some(v) = lookup("WAMD_MEDIA_COMPRESS") {
            next.media.compress = parse_bool("WAMD_MEDIA_COMPRESS", &v)?;
        }
        if let Some(level) = lookup("WAMD_LOG_LEVEL") {
            next.logging.level = level;
        }
        *self = next;
        Ok(())
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        format!(
            r#"# wamd gateway configuration
#
# Every value below can also be set from the environment, e.g.
# WAMD_DATASTORE_URI, WAMD_PLATFORM_TYPE, WAMD_MEDIA_COMPRESS.

[datastore]
# Device datastore driver and connection URI
kind = "{kind}"
uri = "{uri}"

[client]
# Proxy for the engine transport (optional)
# proxy_url = "socks5://127.0.0.1:1080"

# Name and platform shown in the account's linked devices list.
# Platform tags: desktop, mac, android, android-phone, android-tablet,
# ios-phone, ios-catalyst, ipad, wearos, ie, edge, chrome, firefox, opera,
# aloha, tv-tcl. Unknown tags are advertised as an unknown platform.
platform_name = "{platform_name}"
platform_type = "{platform_type}"

[client.version]
# Application version override, each part optional
# major = 2
# minor = 2413
# patch = 51

[media]
# Re-encode WebP images as PNG (older clients cannot render WebP)
convert_webp = false

# Shrink images so the longer side is at most 1024px
compress = false

[pairing]
# How long login waits for the first QR code
code_timeout = "30s"

# How long pairing is watched in the background after the QR code is returned
pairing_window = "3m"

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
level = "info"

# Output format: pretty or json
format = "pretty"
"#,
            kind = DEFAULT_DATASTORE_KIND,
            uri = DEFAULT_DATASTORE_URI,
            platform_name = DEFAULT_PLATFORM_NAME,
            platform_type = DEFAULT_PLATFORM_TYPE,
        )
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), ConfigError> {
        write_file(config_path, &Self::generate_default_toml())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, contents).map_err(io_err)
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wamd")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();

        assert_eq!(config.datastore.kind, "sqlite");
        assert_eq!(config.client.platform_type, "chrome");
        assert!(!config.media.convert_webp);
        assert!(!config.media.compress);
        assert_eq!(config.pairing.code_timeout, Duration::from_secs(30));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_generated_toml_matches_defaults() {
        let parsed: GatewayConfig =
            toml::from_str(&GatewayConfig::generate_default_toml()).unwrap();
        assert_eq!(parsed, GatewayConfig::default());
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = GatewayConfig::default();
        config.media.compress = true;
        config.client.version.major = Some(2);
        config.pairing.pairing_window = Duration::from_secs(90);
        config.save(&config_path).unwrap();

        let loaded = GatewayConfig::load(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_create_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        GatewayConfig::create_default(&config_path).unwrap();

        assert!(config_path.exists());
        assert!(GatewayConfig::load(&config_path).is_ok());
    }

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(
            &config_path,
            "[client]\nplatform_type = \"firefox\"\n[pairing]\ncode_timeout = \"1m 30s\"\n",
        )
        .unwrap();

        let config = GatewayConfig::load(&config_path).unwrap();
        assert_eq!(config.client.platform_type, "firefox");
        assert_eq!(config.client.platform_name, "Chrome");
        assert_eq!(config.pairing.code_timeout, Duration::from_secs(90));
        assert_eq!(config.pairing.pairing_window, Duration::from_secs(180));
    }

    #[test]
    fn test_load_invalid_duration() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        fs::write(&config_path, "[pairing]\ncode_timeout = \"soon\"\n").unwrap();

        assert!(matches!(
            GatewayConfig::load(&config_path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = GatewayConfig::load(Path::new("/nonexistent/wamd/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(env(&[
                ("WAMD_DATASTORE_URI", "postgres://db/wamd"),
                ("WAMD_PLATFORM_TYPE", "ipad"),
                ("WAMD_VERSION_MINOR", "3000"),
                ("WAMD_MEDIA_CONVERT_WEBP", "true"),
                ("WAMD_MEDIA_COMPRESS", "1"),
            ]))
            .unwrap();

        assert_eq!(config.datastore.uri, "postgres://db/wamd");
        assert_eq!(config.client.device_props().platform_type, PlatformType::Ipad);
        assert_eq!(config.client.version.minor, Some(3000));
        assert_eq!(config.client.version.major, None);
        assert!(config.media.convert_webp);
        assert!(config.media.compress);
    }

    #[test]
    fn test_env_override_rejects_bad_values() {
        let mut config = GatewayConfig::default();
        let err = config
            .apply_overrides(env(&[("WAMD_MEDIA_COMPRESS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));

        let err = config
            .apply_overrides(env(&[("WAMD_VERSION_PATCH", "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains("WAMD_VERSION_PATCH"));
    }

    #[test]
    fn test_bad_override_leaves_config_untouched() {
        let mut config = GatewayConfig::default();
        let err = config
            .apply_overrides(env(&[
                ("WAMD_DATASTORE_URI", "postgres://db/wamd"),
                ("WAMD_PLATFORM_TYPE", "ipad"),
                ("WAMD_MEDIA_COMPRESS", "maybe"),
            ]))
            .unwrap_err();

        assert!(err.to_string().contains("WAMD_MEDIA_COMPRESS"));
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_datastore_section_passes_through() {
        let mut config = GatewayConfig::default();
        assert_eq!(config.datastore.kind, DEFAULT_DATASTORE_KIND);
        assert_eq!(config.datastore.uri, DEFAULT_DATASTORE_URI);

        config
            .apply_overrides(env(&[
                ("WAMD_DATASTORE_TYPE", "postgres"),
                ("WAMD_DATASTORE_URI", "postgres://db/wamd"),
            ]))
            .unwrap();

        assert_eq!(
            config.datastore,
            DatastoreConfig {
                kind: "postgres".to_string(),
                uri: "postgres://db/wamd".to_string(),
            }
        );
    }

    #[test]
    fn test_client_options() {
        let mut client = ClientConfig {
            proxy_url: Some("  ".to_string()),
            platform_type: "unheard-of".to_string(),
            ..ClientConfig::default()
        };

        let options = client.client_options();
        assert_eq!(options.proxy_url, None);
        assert_eq!(options.props.platform_type, PlatformType::Unknown);
        assert!(options.auto_reconnect);
        assert!(options.auto_trust_identity);
        assert!(!options.props.require_full_sync);

        client.proxy_url = Some("http://proxy:3128".to_string());
        assert_eq!(
            client.client_options().proxy_url.as_deref(),
            Some("http://proxy:3128")
        );
    }

    #[test]
    fn test_default_config_path() {
        assert!(default_config_path().ends_with("wamd/config.toml"));
    }
}
