//! Landing page to download links.
//!
//! A resolution runs the whole pipeline under one strategy: fetch the
//! landing page, find its script-set redirect, follow it, take the file
//! identifier from the final URL and probe every variant for that file.
//! The impersonated strategy goes first. If it cannot get past the landing
//! page, the rendered strategy reruns the pipeline from the start.

mod error;
mod polling;
mod strategy;
#[cfg(test)]
pub(crate) mod testing;
mod types;
mod variants;

pub use error::{ErrorPayload, FetchError, PageContext, ResolveError};
pub use polling::PollPolicy;
pub use strategy::{
    Document, FetchStrategy, ImpersonatedStrategy, RenderedDocument, RenderedStrategy,
    StaticDocument, StrategyKind,
};
pub use types::{DownloadLinks, ResolutionResult};
pub use variants::{collect_variants, default_variants, VariantSpec};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Config, HttpConfig, ResolverConfig};
use crate::scrapers::browser::BrowserEngine;
use crate::scrapers::extract::{file_identifier, resolve_against, RedirectCandidate, RedirectExtractor};
use crate::scrapers::HttpClient;

/// Failure of one strategy run, tagged with the hop that failed.
enum RunError {
    /// The landing page could not be fetched or yielded no redirect.
    FirstHop(ResolveError),
    Later(ResolveError),
}

/// Resolves landing pages. Shared across requests.
pub struct Resolver {
    http: HttpConfig,
    settings: ResolverConfig,
    extractor: RedirectExtractor,
    engine: Arc<BrowserEngine>,
}

impl Resolver {
    pub fn new(config: &Config, engine: Arc<BrowserEngine>) -> Self {
        Self {
            http: config.http.clone(),
            settings: config.resolver.clone(),
            extractor: RedirectExtractor::new(config.resolver.link_markers.clone()),
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<BrowserEngine> {
        &self.engine
    }

    pub fn variants(&self) -> &[VariantSpec] {
        &self.settings.variants
    }

    /// Resolve `start_url` into download links.
    ///
    /// Builds a fresh impersonated client for this resolution. The rendered
    /// strategy is offered as fallback only when the browser is enabled.
    pub async fn resolve(
        &self,
        start_url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, ResolveError> {
        let start_url = parse_start_url(start_url)?;

        let client = HttpClient::from_config(&self.http).map_err(|e| {
            ResolveError::fetch(
                FetchError::Transport {
                    url: start_url.clone(),
                    message: format!("failed to build HTTP client: {}", e),
                },
                PageContext::default(),
            )
        })?;
        let impersonated =
            ImpersonatedStrategy::new(client, Duration::from_secs(self.http.timeout));
        let rendered = RenderedStrategy::new(self.engine.clone());
        let fallback: Option<&dyn FetchStrategy> = if self.engine.is_enabled() {
            Some(&rendered)
        } else {
            None
        };

        self.resolve_with(&impersonated, fallback, &start_url, cancel)
            .await
    }

    /// Run the pipeline with `primary`, rerunning it with `fallback` when
    /// `primary` fails on the first hop.
    pub async fn resolve_with(
        &self,
        primary: &dyn FetchStrategy,
        fallback: Option<&dyn FetchStrategy>,
        start_url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, ResolveError> {
        let err = match self.run(primary, start_url, cancel).await {
            Ok(result) => return Ok(result),
            Err(RunError::Later(err)) => return Err(err),
            Err(RunError::FirstHop(err)) => err,
        };

        let fallback = match fallback {
            Some(fallback) if err.allows_fallback() => fallback,
            _ => return Err(err),
        };

        info!(
            "{} strategy failed on {} ({}), retrying with {}",
            primary.kind(),
            start_url,
            err,
            fallback.kind()
        );

        match self.run(fallback, start_url, cancel).await {
            Ok(result) => Ok(result),
            Err(RunError::FirstHop(err)) | Err(RunError::Later(err)) => Err(err),
        }
    }

    async fn run(
        &self,
        strategy: &dyn FetchStrategy,
        start_url: &str,
        cancel: &CancellationToken,
    ) -> Result<ResolutionResult, RunError> {
        let kind = strategy.kind();
        info!("Resolving {} ({})", start_url, kind);

        // Hop 1: landing page
        let settle = self.settle_for(kind, self.settings.start_settle());
        let mut start_doc = strategy
            .fetch(start_url, settle, cancel)
            .await
            .map_err(|e| RunError::FirstHop(ResolveError::fetch(e, PageContext::url(start_url))))?;

        let found = self.find_redirect(start_doc.as_mut(), kind, cancel).await;
        let landing_url = start_doc.current_url().await;
        let context = PageContext {
            last_url: Some(landing_url.clone()),
            title: start_doc.title().await,
        };
        start_doc.release().await;

        let candidate = match found {
            Ok(Some(candidate)) => candidate,
            Ok(None) => {
                warn!("No redirect found on {} ({})", landing_url, kind);
                return Err(RunError::FirstHop(ResolveError::RedirectNotFound { context }));
            }
            Err(e) => return Err(RunError::FirstHop(ResolveError::fetch(e, context))),
        };
        debug!("Redirect candidate {:?} via {:?}", candidate.href, candidate.source);

        // Hop 2: file page
        let redirect_url = resolve_against(&landing_url, &candidate.href).unwrap_or(candidate.href);
        let settle = self.settle_for(kind, self.settings.redirect_settle());
        let mut final_doc = strategy
            .fetch(&redirect_url, settle, cancel)
            .await
            .map_err(|e| RunError::Later(ResolveError::fetch(e, PageContext::url(&redirect_url))))?;
        let final_url = final_doc.current_url().await;
        final_doc.release().await;

        let file_id = file_identifier(&final_url);
        if file_id.is_empty() {
            return Err(RunError::Later(ResolveError::EmptyFileId { final_url }));
        }
        info!("Resolved {} to file {}", start_url, file_id);

        let download_links = collect_variants(
            strategy,
            &self.settings.variants,
            &file_id,
            &self.extractor,
            cancel,
        )
        .await;
        if cancel.is_cancelled() {
            return Err(RunError::Later(ResolveError::Cancelled));
        }

        Ok(ResolutionResult {
            final_url,
            file_id,
            download_links,
            strategy: kind,
        })
    }

    /// Look for the redirect on a landing page.
    ///
    /// Impersonated documents are snapshots, so one pass with the
    /// first-anchor fallback. Rendered pages are re-read under the poll
    /// policy until a script or DOM heuristic matches.
    async fn find_redirect(
        &self,
        doc: &mut dyn Document,
        kind: StrategyKind,
        cancel: &CancellationToken,
    ) -> Result<Option<RedirectCandidate>, FetchError> {
        match kind {
            StrategyKind::Impersonated => {
                let markup = doc.markup().await?;
                Ok(self.extractor.extract_redirect_or_first_anchor(&markup))
            }
            StrategyKind::Rendered => {
                let policy = self.settings.poll_policy();
                for attempt in 1..=policy.attempts {
                    let markup = doc.markup().await?;
                    if let Some(candidate) = self.extractor.extract_redirect(&markup) {
                        debug!("Redirect found on attempt {}/{}", attempt, policy.attempts);
                        return Ok(Some(candidate));
                    }
                    if policy.has_next(attempt) {
                        debug!("No redirect yet, attempt {}/{}", attempt, policy.attempts);
                        policy.pause(cancel).await?;
                    }
                }
                Ok(None)
            }
        }
    }

    fn settle_for(&self, kind: StrategyKind, settle: Duration) -> Duration {
        match kind {
            StrategyKind::Impersonated => Duration::ZERO,
            StrategyKind::Rendered => settle,
        }
    }
}

/// Accept absolute http(s) URLs only.
fn parse_start_url(raw: &str) -> Result<String, ResolveError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ResolveError::InvalidInput("empty URL".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| ResolveError::InvalidInput(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url.to_string()),
        _ => Err(ResolveError::InvalidInput(format!(
            "{}: only http and https URLs are supported",
            raw
        ))),
    }
}
