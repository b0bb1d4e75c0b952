//! TOML-based application configuration.
//!
//! Holds:
//! - CRM credentials and endpoint settings
//! - Outlet store location and read-failure policy
//! - Default logging target and level
//!
//! Configuration is stored at `~/.config/pharmasync/config.toml` unless a
//! path is given explicitly.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::store::ReadFailurePolicy;

/// Environment variable that overrides `salesforce.password`.
pub const PASSWORD_ENV: &str = "PHARMASYNC_SALESFORCE_PASSWORD";

/// Returns `~/.config/pharmasync[-dev]/` based on PHARMASYNC_ENV.
///
/// Set PHARMASYNC_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PHARMASYNC_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pharmasync-dev")
    } else {
        base_dir.join("pharmasync")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

/// CRM connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesforceConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub security_token: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Overrides the login host derived from `sandbox`.
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Outlet store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Defaults to `swdb.sqlite3` in the data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub read_failure: ReadFailurePolicy,
}

/// Logging defaults; the CLI flags take precedence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub salesforce: SalesforceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_api_version() -> String {
    "38.0".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_busy_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "ERROR".into()
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            security_token: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            sandbox: false,
            api_version: default_api_version(),
            login_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            read_failure: ReadFailurePolicy::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: None,
            level: default_log_level(),
        }
    }
}

impl SalesforceConfig {
    /// Login host: explicit override, else production or sandbox.
    pub fn login_url(&self) -> &str {
        match &self.login_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.sandbox => "https://test.salesforce.com",
            None => "https://login.salesforce.com",
        }
    }

    /// Password from the environment if set, else from the file.
    pub fn resolved_password(&self) -> String {
        std::env::var(PASSWORD_ENV).unwrap_or_else(|_| self.password.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that every credential the token grant needs is present.
    ///
    /// # Errors
    /// Returns the first missing key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("salesforce.username", self.username.as_str()),
            ("salesforce.client_id", self.client_id.as_str()),
            ("salesforce.client_secret", self.client_secret.as_str()),
        ];
        for (key, value) in required {
            if value.is_empty() {
                return Err(ConfigError::MissingKey(key.to_string()));
            }
        }
        if self.resolved_password().is_empty() {
            return Err(ConfigError::MissingKey("salesforce.password".to_string()));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// # Errors
    /// Returns an error if the default location is needed and the data
    /// directory is unavailable.
    pub fn resolved_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.path {
            Some(p) => Ok(p.clone()),
            None => Ok(data_dir()?.join("swdb.sqlite3")),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Default config file location.
    ///
    /// # Errors
    /// Returns an error if the data directory is unavailable.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if no file exists.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load from an explicit path. A missing file is an error here.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Persist to `path`.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    ///
    /// Secrets are never returned.
    pub fn get(&self, key: &str) -> Option<String> {
        if matches!(
            key,
            "salesforce.password" | "salesforce.security_token" | "salesforce.client_secret"
        ) {
            return None;
        }
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
