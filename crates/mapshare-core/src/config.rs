//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the feed settings handed to the core pipeline (endpoint, ExtendedData
//! allow-list, styling) and the optional MapShare defaults used by the CLI.
//!
//! Configuration is stored at `~/.config/inreach-mapshare/config.json`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "inreach-mapshare";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Garmin share feed base URL; the MapShare identifier is appended to it.
const DEFAULT_ENDPOINT: &str = "https://explore.garmin.com/feed/share/";

const DEFAULT_TRACKING_COLOUR: &str = "#e524ab";

const DEFAULT_MESSAGE_ICON: &str = r#"<img src="img/message.svg" alt="" />"#;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// ExtendedData keys retained from each Placemark.
const DEFAULT_DATA_INCLUDE: &[&str] = &[
    "Id",
    "Time UTC",
    "Time",
    "Latitude",
    "Longitude",
    "Elevation",
    "Velocity",
    "Valid GPS Fix",
    "Text",
    "Event",
];

/// Settings consumed by the fetch/parse/build pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub endpoint: String,
    pub data_include: Vec<String>,
    pub tracking_colour: String,
    pub message_icon: String,
    pub request_timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            data_include: DEFAULT_DATA_INCLUDE.iter().map(|k| k.to_string()).collect(),
            tracking_colour: DEFAULT_TRACKING_COLOUR.to_string(),
            message_icon: DEFAULT_MESSAGE_ICON.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl FeedConfig {
    /// Whether an ExtendedData key is on the allow-list
    pub fn includes(&self, key: &str) -> bool {
        self.data_include.iter().any(|k| k == key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    pub mapshare_identifier: Option<String>,
    pub mapshare_date_start: Option<String>,
    pub mapshare_date_end: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
