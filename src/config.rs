use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::store::StoreError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub caching: CachingConfig,
  /// Number of dispatched action names kept in the store history
  #[serde(default = "default_history_limit")]
  pub history_limit: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL that route templates are joined onto
  pub base_url: String,
  /// Request timeout enforced by the HTTP transport
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  /// Endpoint registry: resource name -> route templates
  #[serde(default)]
  pub routes: BTreeMap<String, Routes>,
}

/// Route templates for one resource, relative to `api.base_url`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Routes {
  pub get: Option<String>,
  pub post: Option<String>,
  pub put: Option<String>,
  pub delete: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
  Get,
  Post,
  Put,
  Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CachingConfig {
  /// Default cache TTL in minutes; zero or negative disables caching
  #[serde(default = "default_ttl_minutes")]
  pub ttl_minutes: i64,
  /// Suppress a fetch while the same resource already has one in flight
  #[serde(default = "default_true")]
  pub dedupe_in_flight: bool,
}

fn default_history_limit() -> usize {
  256
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_ttl_minutes() -> i64 {
  1
}

fn default_true() -> bool {
  true
}

impl Default for ApiConfig {
  fn default() -> Self {
    let mut routes = BTreeMap::new();
    routes.insert(
      "bugs".to_string(),
      Routes {
        get: Some("bugs".to_string()),
        post: Some("bugs".to_string()),
        ..Routes::default()
      },
    );
    routes.insert(
      "users".to_string(),
      Routes {
        get: Some("users".to_string()),
        ..Routes::default()
      },
    );

    Self {
      base_url: "http://localhost:9001/api/".to_string(),
      timeout_secs: default_timeout_secs(),
      routes,
    }
  }
}

impl Default for CachingConfig {
  fn default() -> Self {
    Self {
      ttl_minutes: default_ttl_minutes(),
      dedupe_in_flight: true,
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      api: ApiConfig::default(),
      caching: CachingConfig::default(),
      history_limit: default_history_limit(),
    }
  }
}

impl Config {
  /// Load configuration, from `explicit_path` when given or else from the
  /// first of `./bugcache.yaml` and `$XDG_CONFIG_HOME/bugcache/config.yaml`
  /// that exists. Built-in defaults apply when neither is present.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = match explicit_path {
      Some(p) if !p.exists() => return Err(eyre!("Config file not found: {}", p.display())),
      Some(p) => Some(p.to_path_buf()),
      None => Self::candidate_paths().into_iter().find(|p| p.exists()),
    };

    let Some(path) = path else {
      tracing::info!("no configuration file found, using defaults");
      return Ok(Self::default());
    };

    let contents = std::fs::read_to_string(&path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn candidate_paths() -> Vec<PathBuf> {
    let xdg = dirs::config_dir().map(|dir| dir.join("bugcache").join("config.yaml"));
    std::iter::once(PathBuf::from("bugcache.yaml"))
      .chain(xdg)
      .collect()
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Resolve an endpoint from the route registry.
  pub fn route(&self, resource: &'static str, verb: Verb) -> Result<&str, StoreError> {
    let routes = self.api.routes.get(resource);
    let route = routes.and_then(|r| match verb {
      Verb::Get => r.get.as_deref(),
      Verb::Post => r.post.as_deref(),
      Verb::Put => r.put.as_deref(),
      Verb::Delete => r.delete.as_deref(),
    });

    route.ok_or(StoreError::MissingRoute { resource, verb })
  }
}
