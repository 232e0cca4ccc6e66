use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};

use crate::{controller::EmptySearchPolicy, model::Coordinate};

/// Environment variable that takes precedence over the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";
pub const DEFAULT_IP_LOOKUP_URL: &str = "http://ip-api.com/json";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where "current location" comes from.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LocationConfig {
    /// Fixed coordinate; when both are set, no network lookup is done.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    /// IP geolocation endpoint used otherwise.
    pub ip_lookup_url: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// empty_search = "reject"
///
/// [location]
/// latitude = 52.52
/// longitude = 13.40
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub empty_search: EmptySearchPolicy,

    #[serde(default)]
    pub location: LocationConfig,
}

impl Config {
    /// API key from the environment, falling back to the config file.
    pub fn api_key(&self) -> Result<String> {
        if let Some(key) = env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()) {
            return Ok(key);
        }

        self.api_key.clone().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No OpenWeather API key configured.\n\
                 Hint: run `weather configure` or set {API_KEY_ENV}."
            )
        })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn ip_lookup_url(&self) -> &str {
        self.location.ip_lookup_url.as_deref().unwrap_or(DEFAULT_IP_LOOKUP_URL)
    }

    /// Configured fixed coordinate, if any. Half a coordinate is an error.
    pub fn fixed_location(&self) -> Result<Option<Coordinate>> {
        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(anyhow!("Configured location ({lat}, {lon}) is out of range"));
                }
                Ok(Some(Coordinate::new(lat, lon)))
            }
            (None, None) => Ok(None),
            _ => Err(anyhow!(
                "Configured location needs both latitude and longitude.\n\
                 Hint: run `weather configure` to set them again."
            )),
        }
    }

    pub fn set_fixed_location(&mut self, location: Option<Coordinate>) {
        self.location.latitude = location.map(|c| c.latitude);
        self.location.longitude = location.map(|c| c.longitude);
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!(path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
