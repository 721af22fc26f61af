use crate::error::{MirrorError, Result};
use crate::pipeline::select::SortBy;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_ENDPOINT: &str = "https://archlinux.org/mirrors/status/json/";
pub const DEFAULT_PROBE_PATH: &str = "core/os/x86_64/core.db";
pub const DEFAULT_SUFFIX: &str = "$repo/os/$arch";

const CONFIG_FILE: &str = "config.toml";

/// Effective settings. Every field has a default, so a config file may set
/// any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Mirror status endpoint
    pub endpoint: String,
    /// Protocols kept by the selector
    pub protocols: Vec<String>,
    /// Country codes or names; empty keeps every country
    pub countries: Vec<String>,
    /// Regex matched against mirror addresses; matches are dropped
    pub exclude: Option<String>,
    /// Minimum completion percentage (0.0 - 1.0)
    pub min_completion: Option<f64>,
    /// How many mirrors survive selection; None keeps all
    pub limit: Option<usize>,
    pub sort_by: SortBy,
    /// Maximum probes in flight
    pub concurrency: usize,
    /// Resource appended to each mirror address when probing
    pub probe_path: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Appended to each address in the generated mirrorlist
    pub suffix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            protocols: vec!["http".to_string()],
            countries: Vec::new(),
            exclude: None,
            min_completion: None,
            limit: Some(50),
            sort_by: SortBy::Age,
            concurrency: 5,
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            timeout_secs: 10,
            connect_timeout_secs: 5,
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

impl Settings {
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// ~/.config/mirrank/config.toml (platform equivalent elsewhere)
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mirrank").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Load settings.
/// Strategy:
/// 1. An explicit path must exist and parse
/// 2. Otherwise try the user config dir
/// 3. Fallback to built-in defaults
pub async fn load(explicit: Option<&Path>) -> Result<(Settings, Option<PathBuf>)> {
    if let Some(path) = explicit {
        if !fs::try_exists(path).await.unwrap_or(false) {
            return Err(MirrorError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let settings = load_file(path).await?;
        return Ok((settings, Some(path.to_path_buf())));
    }

    if let Some(path) = default_path() {
        if fs::try_exists(&path).await.unwrap_or(false) {
            let settings = load_file(&path).await?;
            tracing::debug!("loaded settings from {}", path.display());
            return Ok((settings, Some(path)));
        }
    }

    Ok((Settings::default(), None))
}

async fn load_file(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path).await?;
    let settings: Settings = toml::from_str(&content)?;
    Ok(settings)
}
