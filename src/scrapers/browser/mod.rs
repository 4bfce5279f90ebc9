//! Shared browser engine for the rendered strategy.
//!
//! One chromiumoxide browser per process, launched locally or reached over
//! a remote DevTools endpoint. Requests borrow it only to open a page;
//! each page is its own [`BrowserSession`].

mod session;
mod stealth;

pub use session::BrowserSession;
pub use stealth::STEALTH_SCRIPTS;

#[cfg(feature = "browser")]
use std::sync::Arc;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
use anyhow::Result;
use serde::Serialize;
use tokio::sync::RwLock;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;

use crate::config::BrowserEngineConfig;
use crate::resolver::FetchError;

/// Engine lifecycle as reported by `/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum EngineStatus {
    /// Turned off by configuration or not compiled in.
    Disabled,
    /// Enabled but not started yet.
    Idle,
    Starting,
    Ready,
    Failed(String),
    Closed,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "browser disabled"),
            Self::Idle => write!(f, "browser not started"),
            Self::Starting => write!(f, "browser still starting"),
            Self::Ready => write!(f, "browser ready"),
            Self::Failed(reason) => write!(f, "browser failed to start: {}", reason),
            Self::Closed => write!(f, "browser closed"),
        }
    }
}

enum EngineState {
    Disabled,
    Idle,
    Starting,
    #[cfg(feature = "browser")]
    Ready {
        browser: Arc<RwLock<Browser>>,
        handler: JoinHandle<()>,
    },
    Failed(String),
    Closed,
}

impl EngineState {
    fn status(&self) -> EngineStatus {
        match self {
            Self::Disabled => EngineStatus::Disabled,
            Self::Idle => EngineStatus::Idle,
            Self::Starting => EngineStatus::Starting,
            #[cfg(feature = "browser")]
            Self::Ready { .. } => EngineStatus::Ready,
            Self::Failed(reason) => EngineStatus::Failed(reason.clone()),
            Self::Closed => EngineStatus::Closed,
        }
    }
}

/// Process-wide browser handle.
///
/// State only changes in [`start`](Self::start) and
/// [`shutdown`](Self::shutdown); requests take read locks.
pub struct BrowserEngine {
    config: BrowserEngineConfig,
    state: RwLock<EngineState>,
}

impl BrowserEngine {
    /// Common Chrome executable paths to check.
    #[cfg(feature = "browser")]
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserEngineConfig) -> Self {
        let state = if config.enabled && cfg!(feature = "browser") {
            EngineState::Idle
        } else {
            EngineState::Disabled
        };
        Self {
            config,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &BrowserEngineConfig {
        &self.config
    }

    /// Whether the rendered strategy can ever be used in this process.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled && cfg!(feature = "browser")
    }

    pub async fn status(&self) -> EngineStatus {
        self.state.read().await.status()
    }

    /// Launch or connect to the browser.
    ///
    /// A no-op when disabled or already running. A failure is recorded in
    /// the status and returned.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            match &*state {
                EngineState::Idle | EngineState::Failed(_) => *state = EngineState::Starting,
                EngineState::Closed => anyhow::bail!("browser engine already shut down"),
                _ => return Ok(()),
            }
        }

        let launched = self.launch().await;

        let mut state = self.state.write().await;
        match launched {
            #[cfg(feature = "browser")]
            Ok((browser, handler)) => {
                *state = EngineState::Ready {
                    browser: Arc::new(RwLock::new(browser)),
                    handler,
                };
                info!("Browser engine ready");
                Ok(())
            }
            #[cfg(not(feature = "browser"))]
            Ok(()) => {
                *state = EngineState::Disabled;
                Ok(())
            }
            Err(e) => {
                warn!("Browser engine failed to start: {:#}", e);
                *state = EngineState::Failed(format!("{:#}", e));
                Err(e)
            }
        }
    }

    /// Load the configured warm-up page once. Best effort.
    pub async fn warm_up(&self) {
        let Some(url) = self.config.warmup_url.clone() else {
            return;
        };

        info!("Warming up browser with {}", url);
        match self.open_session().await {
            Ok(session) => {
                if let Err(e) = session.navigate(&url).await {
                    warn!("Browser warm-up failed: {}", e);
                }
                session.close().await;
            }
            Err(e) => warn!("Browser warm-up skipped: {}", e),
        }
    }

    /// Open a fresh page session.
    #[cfg(feature = "browser")]
    pub async fn open_session(&self) -> Result<BrowserSession, FetchError> {
        let browser = match &*self.state.read().await {
            EngineState::Ready { browser, .. } => browser.clone(),
            other => return Err(FetchError::EngineUnavailable(other.status().to_string())),
        };

        // Shared guard: concurrent sessions open pages in parallel.
        let page = {
            let browser = browser.read().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| FetchError::Browser(format!("Failed to open page: {}", e)))?
        };
        BrowserSession::prepare(page, &self.config).await
    }

    #[cfg(not(feature = "browser"))]
    pub async fn open_session(&self) -> Result<BrowserSession, FetchError> {
        Err(FetchError::EngineUnavailable(
            self.state.read().await.status().to_string(),
        ))
    }

    /// Close the browser. Later sessions report the engine as closed.
    pub async fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state.write().await, EngineState::Closed);
        Self::close_browser(previous).await;
    }

    #[cfg(feature = "browser")]
    async fn close_browser(previous: EngineState) {
        if let EngineState::Ready { browser, handler } = previous {
            info!("Closing browser");
            let mut browser = browser.write().await;
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser cleanly: {}", e);
            }
            let _ = browser.wait().await;
            handler.abort();
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn close_browser(_previous: EngineState) {}

    #[cfg(feature = "browser")]
    async fn launch(&self) -> Result<(Browser, JoinHandle<()>)> {
        if let Some(remote_url) = self.config.remote_url.clone() {
            return self.connect_remote(&remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(self.config.timeout))
            .window_size(1280, 720);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        for arg in self.config.launch_args() {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        Ok((browser, Self::spawn_handler(handler)))
    }

    #[cfg(not(feature = "browser"))]
    async fn launch(&self) -> Result<()> {
        Ok(())
    }

    #[cfg(feature = "browser")]
    fn find_chrome() -> Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it, set BROWSER_URL to a remote \
             DevTools endpoint, or set BROWSER_ENABLED=0"
        ))
    }

    /// Connect to a remote Chrome instance.
    #[cfg(feature = "browser")]
    async fn connect_remote(&self, url: &str) -> Result<(Browser, JoinHandle<()>)> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, self.config.timeout
        );

        let ws_url = if url.contains("/devtools/browser/") {
            url.to_string()
        } else {
            let http_url = url
                .replace("ws://", "http://")
                .replace("wss://", "https://");
            let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

            let resp: serde_json::Value = reqwest::Client::new()
                .get(&version_url)
                .timeout(Duration::from_secs(self.config.timeout))
                .send()
                .await
                .context("Failed to connect to remote browser")?
                .json()
                .await
                .context("Failed to parse browser version info")?;

            resp.get("webSocketDebuggerUrl")
                .and_then(|v| v.as_str())
                .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?
                .to_string()
        };

        info!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };

        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .context("Failed to connect to remote browser")?;

        Ok((browser, Self::spawn_handler(handler)))
    }

    #[cfg(feature = "browser")]
    fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled() -> BrowserEngine {
        BrowserEngine::new(BrowserEngineConfig {
            enabled: false,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_disabled_engine_reports_disabled() {
        let engine = disabled();
        assert!(!engine.is_enabled());
        assert_eq!(engine.status().await, EngineStatus::Disabled);

        engine.start().await.unwrap();
        assert_eq!(engine.status().await, EngineStatus::Disabled);
    }

    #[tokio::test]
    async fn test_open_session_without_browser_is_unavailable() {
        let engine = disabled();
        let err = engine.open_session().await.err().unwrap();
        assert!(matches!(err, FetchError::EngineUnavailable(_)));
    }

    #[tokio::test]
    async fn test_shutdown_closes_engine() {
        let engine = disabled();
        engine.shutdown().await;
        assert_eq!(engine.status().await, EngineStatus::Closed);
        assert!(engine.start().await.is_err());
    }

    #[tokio::test]
    async fn test_warm_up_without_url_is_noop() {
        let engine = disabled();
        engine.warm_up().await;
        assert_eq!(engine.status().await, EngineStatus::Disabled);
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let json = serde_json::to_value(EngineStatus::Failed("no chrome".into())).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["detail"], "no chrome");

        let json = serde_json::to_value(EngineStatus::Ready).unwrap();
        assert_eq!(json, serde_json::json!({"state": "ready"}));
    }

    /// Needs a local Chrome.
    ///
    /// Run with: cargo test concurrent_sessions_share_browser -- --ignored
    #[cfg(feature = "browser")]
    #[tokio::test]
    #[ignore]
    async fn test_concurrent_sessions_share_browser() {
        let engine = BrowserEngine::new(BrowserEngineConfig::default());
        engine.start().await.unwrap();
        assert_eq!(engine.status().await, EngineStatus::Ready);

        let opened = tokio::time::timeout(
            Duration::from_secs(30),
            futures::future::join_all((0..4).map(|_| engine.open_session())),
        )
        .await
        .unwrap();
        for session in opened {
            session.unwrap().close().await;
        }

        engine.shutdown().await;
        assert_eq!(engine.status().await, EngineStatus::Closed);
    }
}
