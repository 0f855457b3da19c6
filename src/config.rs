use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "TASKFLOW_API_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  /// Set to false to run purely against local storage.
  pub enabled: bool,
  pub base_url: String,
  /// TTL for cached catalog data
  pub cache_timeout_ms: u64,
  /// Total tries per read, including the first
  pub retry_attempts: u32,
  /// Linear backoff base
  pub retry_delay_ms: u64,
  pub request_timeout_ms: u64,
  /// Prefix under which the static catalog files are served
  pub data_path: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      base_url: "http://localhost:3000/".to_string(),
      cache_timeout_ms: 300_000,
      retry_attempts: 3,
      retry_delay_ms: 1000,
      request_timeout_ms: 30_000,
      data_path: "data/".to_string(),
    }
  }
}

impl ApiConfig {
  pub fn cache_timeout(&self) -> Duration {
    Duration::from_millis(self.cache_timeout_ms)
  }

  pub fn retry_delay(&self) -> Duration {
    Duration::from_millis(self.retry_delay_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Reserved bound on entry count; reported, not enforced
  pub max_size: usize,
  /// Janitor period; 0 disables the sweep
  pub cleanup_interval_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_size: 100,
      cleanup_interval_ms: 600_000,
    }
  }
}

impl CacheConfig {
  pub fn cleanup_interval(&self) -> Option<Duration> {
    (self.cleanup_interval_ms > 0).then(|| Duration::from_millis(self.cleanup_interval_ms))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file; defaults to the platform data directory
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  pub level: String,
  /// When set, a daily rolling log file is written here as well
  pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./taskflow.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/taskflow/config.yaml
  /// 4. Built-in defaults
  ///
  /// `TASKFLOW_API_URL` overrides the API base URL in every case.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      if !url.trim().is_empty() {
        config.api.base_url = url;
      }
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("taskflow.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("taskflow").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file deserializes to unit, not to an empty mapping.
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }
}
