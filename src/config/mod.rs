//! Configuration types for the offline cache.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Version string of the current cache store.
pub const DEFAULT_CACHE_NAME: &str = "daily-report-v1";

/// Assets pre-cached on install, in order.
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/static/style.css",
    "/static/vendor/bootstrap.min.css",
    "/static/vendor/bootstrap.bundle.min.js",
    "/static/vendor/bootstrap-icons.css",
];

/// Origin the asset paths are resolved against.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:5000";

/// Environment variable that overrides the store directory.
pub const STORE_DIR_ENV: &str = "OFFLINE_CACHE_DIR";

/// Configuration for the cache controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name (version string) of the current cache store.
    pub cache_name: String,
    /// Asset paths to pre-cache on install.
    pub assets: Vec<String>,
    /// Origin used to turn asset paths into absolute URLs.
    pub origin: String,
    /// Optional per-request network timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            assets: DEFAULT_ASSETS.iter().map(ToString::to_string).collect(),
            origin: DEFAULT_ORIGIN.to_string(),
            request_timeout_secs: None,
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache name.
    #[must_use]
    pub fn with_cache_name(mut self, name: impl Into<String>) -> Self {
        self.cache_name = name.into();
        self
    }

    /// Sets the asset list.
    #[must_use]
    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets = assets.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the network timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, secs: Option<u64>) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Resolves a path (or absolute URL) against the origin.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the origin or the joined URL cannot be parsed.
    pub fn resolve(&self, path: &str) -> Result<String> {
        let invalid = |url: &str, e: &dyn std::fmt::Display| Error::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let base = reqwest::Url::parse(&self.origin).map_err(|e| invalid(&self.origin, &e))?;
        let url = base.join(path).map_err(|e| invalid(path, &e))?;
        Ok(url.to_string())
    }

    /// Absolute URLs of every asset, in list order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] for the first asset that cannot be resolved.
    pub fn asset_urls(&self) -> Result<Vec<String>> {
        self.assets.iter().map(|path| self.resolve(path)).collect()
    }
}

/// Path configuration for the config file and the store directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root directory holding one sub-directory per cache store.
    pub store_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        let store_dir = std::env::var_os(STORE_DIR_ENV).map_or_else(
            || {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("offline-cache")
                    .join("caches")
            },
            PathBuf::from,
        );
        Self { store_dir }
    }
}

impl PathConfig {
    /// Default location of the configuration file.
    #[must_use]
    pub fn default_config_file() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("offline-cache")
            .join("config.toml")
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Cache controller configuration.
    pub cache: CacheConfig,
    /// Path configuration.
    pub paths: PathConfig,
}

impl AppConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads configuration.
    ///
    /// An explicit path must exist. Without one, the default config file is
    /// read if present, and defaults are used otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = PathConfig::default_config_file();
                if !path.exists() {
                    log::debug!("No config file at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };
        let contents = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&contents)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
