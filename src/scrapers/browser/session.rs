//! Page sessions on the shared browser.

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
#[cfg(feature = "browser")]
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
#[cfg(feature = "browser")]
use tracing::{debug, warn};

#[cfg(feature = "browser")]
use super::stealth::STEALTH_SCRIPTS;
#[cfg(feature = "browser")]
use crate::config::{BrowserEngineConfig, BrowserEngineType};
use crate::resolver::FetchError;

/// Resolves once the document has parsed.
#[cfg(feature = "browser")]
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// One page on the shared browser.
///
/// Owned by a single fetch. The page is closed by [`BrowserSession::close`],
/// or from `Drop` when the owner bails out early.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    page: Option<Page>,
    timeout: Duration,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Prepare a blank page: user agent, then stealth scripts so they run
    /// ahead of any page script on every later navigation.
    pub(super) async fn prepare(page: Page, config: &BrowserEngineConfig) -> Result<Self, FetchError> {
        let session = Self {
            page: Some(page),
            timeout: Duration::from_secs(config.timeout),
        };
        let page = session.page()?;

        page.execute(SetUserAgentOverrideParams::new(config.user_agent.clone()))
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to set user agent: {}", e)))?;

        if config.engine == BrowserEngineType::Stealth {
            for script in STEALTH_SCRIPTS {
                if let Err(e) = page
                    .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string()))
                    .await
                {
                    debug!("Stealth script install skipped: {}", e);
                }
            }
        }

        Ok(session)
    }

    fn page(&self) -> Result<&Page, FetchError> {
        self.page
            .as_ref()
            .ok_or_else(|| FetchError::Browser("page session already closed".to_string()))
    }

    /// Navigate and wait for the document to parse, bounded by the
    /// configured timeout.
    pub async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        let page = self.page()?;
        tracing::info!("Navigating to {}", url);

        match tokio::time::timeout(self.timeout, page.goto(url)).await {
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    after: self.timeout,
                })
            }
            Ok(Err(e)) => {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Ok(_)) => {}
        }

        match tokio::time::timeout(self.timeout, self.evaluate::<String>(WAIT_FOR_READY_SCRIPT)).await {
            Ok(Ok(state)) => debug!("Page ready state: {}", state),
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state on {}", url),
        }
        Ok(())
    }

    /// Evaluate a script in the page and deserialize its result.
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &str) -> Result<T, FetchError> {
        self.page()?
            .evaluate(script.to_string())
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?
            .into_value()
            .map_err(|e| FetchError::Browser(e.to_string()))
    }

    /// Attribute of the first element matching `selector`.
    pub async fn query_attribute(&self, selector: &str, attribute: &str) -> Option<String> {
        let element = self.page().ok()?.find_element(selector).await.ok()?;
        element
            .attribute(attribute)
            .await
            .ok()
            .flatten()
            .filter(|value| !value.trim().is_empty())
    }

    /// Serialized live DOM.
    pub async fn content(&self) -> Result<String, FetchError> {
        self.page()?
            .content()
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))
    }

    pub async fn current_url(&self) -> Option<String> {
        self.page().ok()?.url().await.ok().flatten()
    }

    pub async fn title(&self) -> Option<String> {
        self.page().ok()?.get_title().await.ok().flatten()
    }

    /// Close the page.
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close page: {}", e);
            }
        }
    }
}

#[cfg(feature = "browser")]
impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = page.close().await;
                });
            }
        }
    }
}

/// Without the `browser` feature no session can exist.
#[cfg(not(feature = "browser"))]
pub enum BrowserSession {}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub async fn navigate(&self, _url: &str) -> Result<(), FetchError> {
        match *self {}
    }

    pub async fn evaluate<T: DeserializeOwned>(&self, _script: &str) -> Result<T, FetchError> {
        match *self {}
    }

    pub async fn query_attribute(&self, _selector: &str, _attribute: &str) -> Option<String> {
        match *self {}
    }

    pub async fn content(&self) -> Result<String, FetchError> {
        match *self {}
    }

    pub async fn current_url(&self) -> Option<String> {
        match *self {}
    }

    pub async fn title(&self) -> Option<String> {
        match *self {}
    }

    pub async fn close(self) {
        match self {}
    }
}
