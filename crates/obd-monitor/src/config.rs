//! Monitor configuration
//!
//! Values are layered: built-in defaults, then the optional config file, then
//! `OBD_MONITOR_*` environment variables (`__` separates nested keys, e.g.
//! `OBD_MONITOR_LINK__CONNECT_TIMEOUT_MS`), then command-line overrides.

use config::{Config, ConfigError, Environment, File};
use obd_link::LinkConfig;
use serde::{Deserialize, Serialize};

/// Default config file, looked up relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "obd-monitor.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "OBD_MONITOR";

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Bonded device to connect to (exact or partial name)
    pub device_name: String,

    /// Link tuning
    pub link: LinkConfig,

    /// Logging
    pub log: LogConfig,

    /// Statically configured scanners
    pub devices: Vec<DeviceConfig>,

    /// Add enumerated serial ports to the bonded registry
    pub scan_ports: bool,

    /// Require a local radio adapter before connecting
    pub require_adapter: bool,

    /// Commands sent once after the link comes up
    pub init_commands: Vec<String>,

    /// Snapshot print interval (milliseconds), 0 disables
    pub snapshot_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            device_name: "ESP32_OBD2_Scanner".to_string(),
            link: LinkConfig::default(),
            log: LogConfig::default(),
            devices: Vec::new(),
            scan_ports: true,
            require_adapter: false,
            init_commands: Vec::new(),
            snapshot_interval_ms: 1000,
        }
    }
}

impl MonitorConfig {
    /// Load from `path` (missing file is not an error) and the environment
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `obd_link=debug`
    pub level: String,

    /// Emit JSON lines instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// A statically configured scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Advertised name
    #[serde(default)]
    pub name: String,

    /// Hardware address; defaults to the device path
    #[serde(default)]
    pub address: Option<String>,

    /// Serial device path (e.g. "/dev/rfcomm0")
    pub path: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Whether the link is bonded with authentication
    #[serde(default)]
    pub secure: bool,
}

fn default_baud_rate() -> u32 {
    38400
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.toml", name, std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = MonitorConfig::load("/nonexistent/obd-monitor").unwrap();
        assert_eq!(config, MonitorConfig::default());
        assert_eq!(config.device_name, "ESP32_OBD2_Scanner");
        assert_eq!(config.link.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_config(
            "obd-monitor-file",
            r#"
device_name = "Garage OBD"
init_commands = ["ATZ", "ATE0"]

[link]
connect_timeout_ms = 2500

[log]
level = "debug"

[[devices]]
name = "Garage OBD"
path = "/dev/rfcomm0"
secure = true
"#,
        );
        let config = MonitorConfig::load(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.device_name, "Garage OBD");
        assert_eq!(config.init_commands, vec!["ATZ", "ATE0"]);
        assert_eq!(config.link.connect_timeout_ms, 2500);
        assert_eq!(config.link.max_line_len, 4096);
        assert_eq!(config.log.level, "debug");
        assert!(!config.log.json);
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].baud_rate, 38400);
        assert_eq!(config.devices[0].address, None);
        assert!(config.devices[0].secure);
    }
}
