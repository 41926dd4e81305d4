//! Portal configuration storage
//!
//! Handles the backend connection, debounce windows, simulation pacing and
//! local storage location.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{api, debounce, simulation, DATA_DIR_NAME};

/// Connection to the graph REST backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL, e.g. `http://127.0.0.1:8000/api`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    api::BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    api::TIMEOUT_SECS
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Debounce windows for persistence writes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceConfig {
    /// Per-node layout write
    #[serde(default = "default_layout_debounce")]
    pub layout_debounce_ms: u64,
    /// Bulk layout and bulk edge writes
    #[serde(default = "default_bulk_debounce")]
    pub bulk_debounce_ms: u64,
}

fn default_layout_debounce() -> u64 {
    debounce::LAYOUT_MS
}

fn default_bulk_debounce() -> u64 {
    debounce::BULK_MS
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            layout_debounce_ms: default_layout_debounce(),
            bulk_debounce_ms: default_bulk_debounce(),
        }
    }
}

impl PersistenceConfig {
    pub fn layout_delay(&self) -> Duration {
        Duration::from_millis(self.layout_debounce_ms)
    }

    pub fn bulk_delay(&self) -> Duration {
        Duration::from_millis(self.bulk_debounce_ms)
    }
}

/// Mock simulation pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Progress added per tick (percent)
    #[serde(default = "default_step")]
    pub step: u8,
}

fn default_tick_ms() -> u64 {
    simulation::TICK_MS
}

fn default_step() -> u8 {
    simulation::STEP
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            step: default_step(),
        }
    }
}

/// Full portal configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PortalConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Directory for file-backed local storage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
    /// Recorded in exported flows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Recorded in exported flows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_cortex: Option<String>,
}

impl PortalConfig {
    /// Load configuration from `{dir}/config.json`, or defaults if absent
    pub async fn load(dir: &Path) -> Result<Self, ConfigError> {
        let config_path = dir.join("config.json");

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await?;

        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to `{dir}/config.json`
    pub async fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(dir).await?;

        let config_path = dir.join("config.json");
        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        fs::write(&config_path, contents).await?;

        log::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    /// Local storage directory, falling back to the platform data dir
    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(DATA_DIR_NAME)
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}
