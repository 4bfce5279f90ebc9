//! Browser engine configuration types.
//!
//! These types live here (always compiled) rather than behind
//! `#[cfg(feature = "browser")]` so that config parsing works without the
//! browser feature.

use serde::{Deserialize, Serialize};

/// Browser engine types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// Standard chromiumoxide with stealth patches (default).
    #[default]
    Stealth,

    /// No stealth patches (for debugging).
    Standard,
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Whether the rendered fallback strategy is available at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Browser engine type.
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode (default: true).
    /// Set to false for debugging or if headless detection is an issue.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Navigation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// User agent override for browser pages.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    /// Can also be set via BROWSER_URL environment variable.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Page to load once at startup so the first real request does not pay
    /// for browser cold start.
    #[serde(default)]
    pub warmup_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            proxy: None,
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            chrome_args: Vec::new(),
            remote_url: None,
            warmup_url: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `BROWSER_ENABLED` - `0`/`false`/`no` disables the rendered strategy
    /// - `SOCKS_PROXY` - SOCKS proxy for browser traffic (e.g., "socks5://127.0.0.1:9050")
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            if !val.is_empty() {
                self.remote_url = Some(val);
            }
        }

        if let Ok(val) = std::env::var("BROWSER_ENABLED") {
            if let Some(enabled) = parse_flag(&val) {
                self.enabled = enabled;
            }
        }

        // Set proxy from SOCKS_PROXY if not already configured
        if self.proxy.is_none() {
            if let Ok(proxy) = std::env::var("SOCKS_PROXY") {
                if !proxy.is_empty() {
                    self.proxy = Some(proxy);
                }
            }
        }

        self
    }

    /// Chrome arguments applied to every launched browser.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = [
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            "--blink-settings=imagesEnabled=false",
            "--no-first-run",
            "--no-default-browser-check",
            "--disable-background-networking",
            "--disable-sync",
            "--disable-translate",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if self.engine == BrowserEngineType::Stealth {
            args.push("--disable-blink-features=AutomationControlled".to_string());
            args.push("--disable-infobars".to_string());
        }

        if let Some(ref proxy) = self.proxy {
            args.push(format!("--proxy-server={}", proxy));
        }

        args.extend(self.chrome_args.iter().cloned());
        args
    }
}

/// Parse a boolean-ish environment flag.
pub(crate) fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn default_enabled() -> bool {
    true
}

pub fn default_headless() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    25
}

pub fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string()
}
