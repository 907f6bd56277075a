use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use anyhow::{Context, Result};
use shared::protocol::DEFAULT_DOMAIN;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Service type -> command run when its menu entry is clicked
    #[serde(default)]
    pub service_actions: HashMap<String, String>,

    /// Event name (`on_new_service`, ...) -> command
    #[serde(default)]
    pub event_actions: HashMap<String, String>,

    /// Service type -> display name
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Browse only on this interface; all interfaces when unset
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_listen")]
    pub listen: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// e.g. "notify-send"; notifications are only logged when unset
    #[serde(default)]
    pub command: Option<String>,
}

fn default_domains() -> Vec<String> {
    vec![DEFAULT_DOMAIN.to_string()]
}

fn default_resolve_timeout() -> u64 {
    5
}

fn default_debounce() -> u64 {
    1000
}

fn default_api_enabled() -> bool {
    true
}

fn default_listen() -> String {
    "127.0.0.1:8054".to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interface: None,
            domains: default_domains(),
            resolve_timeout_secs: default_resolve_timeout(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            listen: default_listen(),
        }
    }
}

impl DiscoveryConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

impl UiConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Files read in order when no explicit path is given; later files win.
pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("/usr/share/mdns-tray/config.toml"),
        PathBuf::from("/etc/mdns-tray/config.toml"),
        PathBuf::from("config.toml"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config/mdns-tray/config.toml"));
    }
    paths
}

impl Config {
    /// Read every existing file in `paths` and merge them, later files
    /// overriding earlier keys. Missing files are skipped.
    pub fn load_layered(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();

        for path in paths {
            if !path.exists() {
                tracing::debug!("Config file {} not present", path.display());
                continue;
            }
            let table = read_table(path)?;
            merge_tables(&mut merged, table);
            tracing::info!("Loaded config from {}", path.display());
        }

        Self::from_table(merged).context("Failed to parse merged configuration")
    }

    fn from_table(table: toml::Table) -> Result<Self> {
        let config: Config = toml::Value::Table(table).try_into()?;
        Ok(config)
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let table: toml::Table = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    Ok(table)
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                    continue;
                }
                base.insert(key, toml::Value::Table(incoming));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
