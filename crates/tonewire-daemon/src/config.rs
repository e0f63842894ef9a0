//! Daemon configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// Daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonConfig,
    /// IPC settings
    #[serde(default)]
    pub ipc: IpcConfig,
    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Daemon-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Log level for the tonewire crates
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { log_level: default_log_level() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// IPC settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IpcConfig {
    /// Socket path (optional, uses `$XDG_RUNTIME_DIR/tonewire/daemon.sock` if not set)
    pub socket_path: Option<PathBuf>,
}

/// External tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// `wpctl` executable used for volume control
    #[serde(default = "default_wpctl")]
    pub wpctl: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { wpctl: default_wpctl() }
    }
}

fn default_wpctl() -> String {
    tonewire_pipewire::mixer::DEFAULT_WPCTL.to_string()
}

/// Where the configuration was taken from.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults(PathBuf),
}

/// Parse a configuration file's contents.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Invalid configuration")
}

/// Load configuration from file or defaults.
pub fn load_config() -> Result<(Config, ConfigSource)> {
    let config_path = config_path()?;

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;
        let config = parse_config(&content)
            .with_context(|| format!("Failed to parse config file: {config_path:?}"))?;
        Ok((config, ConfigSource::File(config_path)))
    } else {
        Ok((Config::default(), ConfigSource::Defaults(config_path)))
    }
}

/// Get the configuration file path.
fn config_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("org", "tonewire", "tonewire")
        .context("Could not determine config directory")?;
    Ok(dirs.config_dir().join("config.toml"))
}
