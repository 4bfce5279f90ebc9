//! Fetch strategies.
//!
//! Both strategies turn a URL into a [`Document`]. The impersonated one is a
//! single HTTP exchange and its document is a snapshot. The rendered one
//! keeps the browser page alive, so re-reading its markup observes content
//! injected by page scripts after load.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::FetchError;
use super::polling::sleep_or_cancel;
use crate::scrapers::browser::{BrowserEngine, BrowserSession};
use crate::scrapers::extract::page_title;
use crate::scrapers::HttpClient;

/// Which strategy produced a document or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Plain HTTP with a browser header fingerprint.
    Impersonated,
    /// Full browser rendering.
    Rendered,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Impersonated => write!(f, "impersonated"),
            StrategyKind::Rendered => write!(f, "rendered"),
        }
    }
}

/// A fetched page.
///
/// Callers must [`release`](Document::release) a document once they are
/// done with it. Rendered documents also close their page on drop.
#[async_trait]
pub trait Document: Send {
    /// URL the document ended up at.
    async fn current_url(&mut self) -> String;

    /// Current markup.
    async fn markup(&mut self) -> Result<String, FetchError>;

    /// `href` of the first element matching `selector`, if the document
    /// supports live queries.
    async fn selector_href(&mut self, _selector: &str) -> Option<String> {
        None
    }

    async fn title(&mut self) -> Option<String>;

    async fn release(&mut self) {}
}

/// Turns URLs into documents.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Fetch `url`, then wait `settle` for late scripts where that means
    /// anything. Cancellation aborts the fetch and the wait.
    async fn fetch(
        &self,
        url: &str,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Document>, FetchError>;
}

/// Snapshot of an HTTP response body.
#[derive(Debug, Clone)]
pub struct StaticDocument {
    url: String,
    body: String,
}

impl StaticDocument {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
impl Document for StaticDocument {
    async fn current_url(&mut self) -> String {
        self.url.clone()
    }

    async fn markup(&mut self) -> Result<String, FetchError> {
        Ok(self.body.clone())
    }

    async fn title(&mut self) -> Option<String> {
        page_title(&self.body)
    }
}

/// Impersonated HTTP fetch.
///
/// Wraps one [`HttpClient`], so every fetch through a strategy instance
/// shares its cookie jar.
pub struct ImpersonatedStrategy {
    client: HttpClient,
    timeout: Duration,
}

impl ImpersonatedStrategy {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl FetchStrategy for ImpersonatedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Impersonated
    }

    async fn fetch(
        &self,
        url: &str,
        _settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Document>, FetchError> {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = self.client.get_page(url) => result,
        };
        let page = result.map_err(|e| {
            let err = FetchError::from_reqwest(url, e, self.timeout);
            warn!("Impersonated fetch failed: {}", err);
            err
        })?;

        if !page.is_html() {
            debug!(
                "{} returned {}, heuristics may find nothing",
                page.url,
                page.content_type().unwrap_or("unknown content type")
            );
        }

        Ok(Box::new(StaticDocument::new(page.url, page.body)))
    }
}

/// A live browser page.
pub struct RenderedDocument {
    session: Option<BrowserSession>,
    url: String,
}

impl RenderedDocument {
    fn session(&self) -> Result<&BrowserSession, FetchError> {
        self.session
            .as_ref()
            .ok_or_else(|| FetchError::Browser("document already released".to_string()))
    }
}

#[async_trait]
impl Document for RenderedDocument {
    async fn current_url(&mut self) -> String {
        if let Ok(session) = self.session() {
            if let Some(url) = session.current_url().await {
                self.url = url;
            }
        }
        self.url.clone()
    }

    async fn markup(&mut self) -> Result<String, FetchError> {
        self.session()?.content().await
    }

    async fn selector_href(&mut self, selector: &str) -> Option<String> {
        self.session().ok()?.query_attribute(selector, "href").await
    }

    async fn title(&mut self) -> Option<String> {
        self.session().ok()?.title().await
    }

    async fn release(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }
}

/// Rendered fetch on the shared browser engine.
pub struct RenderedStrategy {
    engine: Arc<BrowserEngine>,
}

impl RenderedStrategy {
    pub fn new(engine: Arc<BrowserEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl FetchStrategy for RenderedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rendered
    }

    async fn fetch(
        &self,
        url: &str,
        settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Document>, FetchError> {
        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            session = self.engine.open_session() => session?,
        };

        let navigated = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = session.navigate(url) => result,
        };
        let settled = match navigated {
            Ok(()) => sleep_or_cancel(settle, cancel).await,
            Err(e) => Err(e),
        };
        if let Err(e) = settled {
            if !matches!(e, FetchError::Cancelled) {
                warn!("Rendered fetch of {} failed: {}", url, e);
            }
            session.close().await;
            return Err(e);
        }

        Ok(Box::new(RenderedDocument {
            session: Some(session),
            url: url.to_string(),
        }))
    }
}
