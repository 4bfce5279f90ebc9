//! In-memory strategy for pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::FetchError;
use super::strategy::{Document, FetchStrategy, StrategyKind};
use crate::scrapers::extract::page_title;

/// Canned page served by [`FakeStrategy`].
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    body: String,
    final_url: Option<String>,
    selectors: HashMap<String, String>,
    revealed: Option<(u32, String)>,
}

impl FakePage {
    pub fn html(body: &str) -> Self {
        Self {
            body: body.to_string(),
            ..Default::default()
        }
    }

    /// Answer selector queries with `href`.
    pub fn with_selector(mut self, selector: &str, href: &str) -> Self {
        self.selectors.insert(selector.to_string(), href.to_string());
        self
    }

    /// Report a different final URL, as after a server redirect.
    pub fn redirected_to(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }

    /// Serve `body` from the `read`-th markup read onward.
    pub fn revealing_after(mut self, read: u32, body: &str) -> Self {
        self.revealed = Some((read, body.to_string()));
        self
    }
}

/// Strategy serving [`FakePage`]s by URL. Unknown URLs fail to fetch.
pub struct FakeStrategy {
    kind: StrategyKind,
    pages: HashMap<String, FakePage>,
    fetched: Arc<Mutex<Vec<String>>>,
    reads: Arc<AtomicU32>,
    released: Arc<AtomicUsize>,
}

impl FakeStrategy {
    pub fn impersonated() -> Self {
        Self::new(StrategyKind::Impersonated)
    }

    pub fn rendered() -> Self {
        Self::new(StrategyKind::Rendered)
    }

    fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            pages: HashMap::new(),
            fetched: Arc::default(),
            reads: Arc::default(),
            released: Arc::default(),
        }
    }

    pub fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    /// URLs requested so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Markup reads across all documents.
    pub fn markup_reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Documents released so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchStrategy for FakeStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    async fn fetch(
        &self,
        url: &str,
        _settle: Duration,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Document>, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }

        let page = self.pages.get(url).cloned().ok_or_else(|| FetchError::Transport {
            url: url.to_string(),
            message: "connection refused".to_string(),
        })?;

        Ok(Box::new(FakeDocument {
            url: page.final_url.clone().unwrap_or_else(|| url.to_string()),
            page,
            local_reads: 0,
            reads: self.reads.clone(),
            released: self.released.clone(),
        }))
    }
}

struct FakeDocument {
    url: String,
    page: FakePage,
    local_reads: u32,
    reads: Arc<AtomicU32>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl Document for FakeDocument {
    async fn current_url(&mut self) -> String {
        self.url.clone()
    }

    async fn markup(&mut self) -> Result<String, FetchError> {
        self.local_reads += 1;
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.page.revealed {
            Some((read, ref body)) if self.local_reads >= read => Ok(body.clone()),
            _ => Ok(self.page.body.clone()),
        }
    }

    async fn selector_href(&mut self, selector: &str) -> Option<String> {
        self.page.selectors.get(selector).cloned()
    }

    async fn title(&mut self) -> Option<String> {
        page_title(&self.page.body)
    }

    async fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
