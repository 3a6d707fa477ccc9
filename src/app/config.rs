use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;

pub const DEFAULT_PLATFORM_TOOLS_BASE_URL: &str = "https://dl.google.com/android/repository";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSettings {
    /// Explicit adb location. Empty means "search PATH, else provision".
    pub command_path: String,
    /// Overrides the per-user data directory used for provisioned tools.
    pub data_dir: String,
    pub platform_tools_base_url: String,
    pub command_timeout_secs: u64,
    /// Host OS whose system adb is skipped even when it answers `adb version`.
    pub broken_system_bridge_os: String,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            command_path: String::new(),
            data_dir: String::new(),
            platform_tools_base_url: DEFAULT_PLATFORM_TOOLS_BASE_URL.to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            broken_system_bridge_os: "linux".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    pub log_level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_level: "INFO".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeSettings::default(),
            logging: LoggingSettings::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("DASHLINK_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    home_dir().join(".dashlink_config.json")
}

pub fn backup_config_path() -> PathBuf {
    home_dir().join(".dashlink_config.backup.json")
}

/// Per-user directory that holds provisioned platform tools.
pub fn resolve_data_dir(settings: &BridgeSettings) -> PathBuf {
    let configured = settings.data_dir.trim();
    if !configured.is_empty() {
        return PathBuf::from(configured);
    }
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dashlink")
}

pub fn load_config(trace_id: &str) -> Result<AppConfig, AppError> {
    load_config_from_path(&config_path(), trace_id)
}

pub fn save_config(config: &AppConfig, trace_id: &str) -> Result<(), AppError> {
    save_config_to_path(config, &config_path(), &backup_config_path(), trace_id)
}

pub fn load_config_from_path(path: &Path, trace_id: &str) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read config: {err}"), trace_id))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse config: {err}"), trace_id))?;
    Ok(validate_config(config))
}

pub fn save_config_to_path(
    config: &AppConfig,
    path: &Path,
    backup_path: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(config)
        .map_err(|err| AppError::system(format!("Failed to serialize config: {err}"), trace_id))?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write config: {err}"), trace_id))?;
    Ok(())
}

fn validate_config(mut config: AppConfig) -> AppConfig {
    if config.bridge.command_timeout_secs == 0 {
        config.bridge.command_timeout_secs = DEFAULT_COMMAND_TIMEOUT_SECS;
    }
    let base_url = config.bridge.platform_tools_base_url.trim().trim_end_matches('/');
    config.bridge.platform_tools_base_url = if base_url.is_empty() {
        DEFAULT_PLATFORM_TOOLS_BASE_URL.to_string()
    } else {
        base_url.to_string()
    };
    config.bridge.broken_system_bridge_os = config.bridge.broken_system_bridge_os.trim().to_lowercase();
    if config.logging.log_level.trim().is_empty() {
        config.logging.log_level = LoggingSettings::default().log_level;
    }
    config
}
