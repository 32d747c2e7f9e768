use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use url::Url;

use crate::model::Coordinates;

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_API_BASE: &str = "https://api.openweathermap.org";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// api_base = "https://api.openweathermap.org"
///
/// [home]
/// lat = 48.85
/// lon = 2.35
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub api_base: String,
    /// Position reported by the location backend when no live fix exists.
    pub home: Option<Coordinates>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            home: None,
        }
    }
}

/// Explicit settings handed to each HTTP client by the composition root.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_base: Url,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>, api_base: &str) -> Result<Self> {
        let api_base =
            Url::parse(api_base).with_context(|| format!("Invalid API base URL: {api_base}"))?;

        Ok(Self { api_key: api_key.into(), api_base })
    }

    /// Join `path` onto the configured base, keeping any base path prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let mut base = self.api_base.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }

        base.join(path.trim_start_matches('/'))
            .with_context(|| format!("Failed to build endpoint URL for {path}"))
    }
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    /// The API key from the environment, when set, wins over the stored one.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        let mut cfg = Self::load_from(&path)?;
        cfg.apply_key_override(std::env::var(API_KEY_ENV).ok());
        Ok(cfg)
    }

    /// Replace the stored key with `key` unless it is absent or blank.
    pub fn apply_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "cityweather", "cityweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn set_home(&mut self, lat: f64, lon: f64) {
        self.home = Some(Coordinates { lat, lon });
    }

    /// Build the per-client settings. A missing key is not an error; requests
    /// will simply be rejected by the provider.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let api_key = match self.api_key.as_deref() {
            Some(key) => key.to_string(),
            None => {
                tracing::warn!(
                    "no API key configured; run `cityweather configure` or set {API_KEY_ENV}"
                );
                String::new()
            }
        };

        ClientConfig::new(api_key, &self.api_base)
    }
}
