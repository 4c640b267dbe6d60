use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

pub const ENV_API_BASE_URL: &str = "SKYGLOBE_API_BASE_URL";
pub const ENV_MAP_ACCESS_TOKEN: &str = "SKYGLOBE_MAP_ACCESS_TOKEN";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "SKYGLOBE_REQUEST_TIMEOUT_SECS";

/// Runtime configuration, built once at startup and passed to constructors.
///
/// Example TOML:
/// ```toml
/// api_base_url = "http://localhost:5000"
/// map_access_token = "pk.xxx"
/// request_timeout_secs = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the geocoding and weather backend.
    pub api_base_url: String,

    /// Access token for the map rendering provider.
    pub map_access_token: Option<String>,

    /// Upper bound for every gateway call.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            map_access_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Non-fatal findings about a configuration, reported once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupDiagnostic {
    MissingMapAccessToken,
}

impl StartupDiagnostic {
    pub fn message(&self) -> String {
        match self {
            StartupDiagnostic::MissingMapAccessToken => format!(
                "No map access token configured; the globe cannot load map tiles.\n\
                 Hint: set {ENV_MAP_ACCESS_TOKEN} or run `skyglobe configure`."
            ),
        }
    }
}

impl std::fmt::Display for StartupDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
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
        toml::from_str(contents).context("Invalid configuration TOML")
    }

    /// Override fields from environment-style lookups.
    ///
    /// Takes the lookup as a closure so callers other than `load` can feed
    /// values from anywhere.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }

        if let Some(token) = lookup(ENV_MAP_ACCESS_TOKEN) {
            self.map_access_token = Some(token);
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS) {
            self.request_timeout_secs = raw.trim().parse().with_context(|| {
                format!("{ENV_REQUEST_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'")
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL '{}'", self.api_base_url))?;

        if self.request_timeout_secs == 0 {
            return Err(anyhow!("Request timeout must be at least one second"));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Returns the map token only when it is present and non-blank.
    pub fn map_access_token(&self) -> Option<&str> {
        self.map_access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn diagnostics(&self) -> Vec<StartupDiagnostic> {
        let mut found = Vec::new();
        if self.map_access_token().is_none() {
            found.push(StartupDiagnostic::MissingMapAccessToken);
        }
        found
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

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skyglobe", "skyglobe")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
