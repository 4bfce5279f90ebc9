//! Configuration loading.
//!
//! Configuration comes from an optional TOML file, then environment
//! overrides. Every field has a default, so running with no file at all
//! gives the stock driveseed setup.

pub mod browser;

pub use browser::{BrowserEngineConfig, BrowserEngineType};

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::resolver::{default_variants, PollPolicy, VariantSpec};
use crate::scrapers::extract::DEFAULT_LINK_MARKERS;
use crate::scrapers::ImpersonateProfile;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "getlink.toml";

/// Errors from loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Impersonated HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Browser profile whose headers are presented.
    #[serde(default)]
    pub profile: ImpersonateProfile,

    /// Request timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout: u64,

    /// Proxy server URL. Falls back to `SOCKS_PROXY`.
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            profile: ImpersonateProfile::default(),
            timeout: default_http_timeout(),
            proxy: None,
        }
    }
}

/// Resolver pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolverConfig {
    /// Extraction attempts on a rendered page before giving up.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,

    /// Delay between rendered extraction attempts, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Settling delay after rendering the start page, in milliseconds.
    #[serde(default = "default_start_settle_ms")]
    pub start_settle_ms: u64,

    /// Settling delay after rendering the redirect target, in milliseconds.
    #[serde(default = "default_redirect_settle_ms")]
    pub redirect_settle_ms: u64,

    /// Substrings marking an anchor as a file-host link.
    #[serde(default = "default_link_markers")]
    pub link_markers: Vec<String>,

    /// Variant endpoints probed for every resolved file.
    #[serde(default = "default_variants")]
    pub variants: Vec<VariantSpec>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            poll_attempts: default_poll_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            start_settle_ms: default_start_settle_ms(),
            redirect_settle_ms: default_redirect_settle_ms(),
            link_markers: default_link_markers(),
            variants: default_variants(),
        }
    }
}

impl ResolverConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            attempts: self.poll_attempts,
            interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn start_settle(&self) -> Duration {
        Duration::from_millis(self.start_settle_ms)
    }

    pub fn redirect_settle(&self) -> Duration {
        Duration::from_millis(self.redirect_settle_ms)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `getlink.toml` in the
    /// working directory is used when present, otherwise defaults.
    /// Environment overrides are applied and the result validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::read_file(fallback)?
                } else {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            }
        };

        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded config from {}", path.display());
        Self::from_toml(&text)
    }

    /// Apply environment variable overrides.
    ///
    /// - `IMPERSONATE` - impersonation profile name
    /// - `SOCKS_PROXY` - proxy for both strategies when none is configured
    /// - browser variables, see [`BrowserEngineConfig::with_env_overrides`]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("IMPERSONATE") {
            match val.parse::<ImpersonateProfile>() {
                Ok(profile) => self.http.profile = profile,
                Err(e) => warn!("Ignoring IMPERSONATE: {}", e),
            }
        }

        if self.http.proxy.is_none() {
            if let Ok(proxy) = std::env::var("SOCKS_PROXY") {
                if !proxy.is_empty() {
                    self.http.proxy = Some(proxy);
                }
            }
        }

        self.browser = self.browser.with_env_overrides();
        self
    }

    /// Check invariants the resolver relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.poll_attempts == 0 {
            return Err(ConfigError::Invalid(
                "resolver.poll_attempts must be at least 1".to_string(),
            ));
        }
        if self.http.timeout == 0 || self.browser.timeout == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for variant in &self.resolver.variants {
            variant.validate().map_err(ConfigError::Invalid)?;
            if !seen.insert(variant.key.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate variant key '{}'",
                    variant.key
                )));
            }
        }

        Ok(())
    }
}

fn default_http_timeout() -> u64 {
    25
}

fn default_poll_attempts() -> u32 {
    20
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_start_settle_ms() -> u64 {
    2000
}

fn default_redirect_settle_ms() -> u64 {
    1000
}

fn default_link_markers() -> Vec<String> {
    DEFAULT_LINK_MARKERS.iter().map(|m| m.to_string()).collect()
}
