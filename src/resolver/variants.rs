//! Variant endpoint probing.
//!
//! Every resolved file is offered under a few variant pages, each holding a
//! single download link. All variants are probed at once and a failed probe
//! only blanks its own entry.

use std::time::Duration;

use futures::future::join_all;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::strategy::{Document, FetchStrategy, StrategyKind};
use super::types::DownloadLinks;
use crate::scrapers::extract::{first_anchor, resolve_against, RedirectExtractor};

/// Placeholder replaced by the file identifier in variant templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// One variant endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantSpec {
    /// Key in the result's `download_links`.
    pub key: String,
    /// URL template containing `{id}`.
    pub template: String,
    /// Where the link sits on a rendered variant page.
    #[serde(default)]
    pub selector: Option<String>,
}

impl VariantSpec {
    pub fn new(key: &str, template: &str, selector: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            template: template.to_string(),
            selector: selector.map(str::to_string),
        }
    }

    /// Variant page URL for a file identifier.
    pub fn url_for(&self, file_id: &str) -> String {
        self.template.replace(ID_PLACEHOLDER, file_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.key.trim().is_empty() {
            return Err("variant key must not be empty".to_string());
        }
        if !self.template.contains(ID_PLACEHOLDER) {
            return Err(format!(
                "variant '{}' template must contain {}",
                self.key, ID_PLACEHOLDER
            ));
        }
        if let Some(ref selector) = self.selector {
            Selector::parse(selector)
                .map_err(|e| format!("variant '{}' selector is invalid: {}", self.key, e))?;
        }
        Ok(())
    }
}

const WFILE_SELECTOR: &str = "body > div > div > div.card-body > div > div > a";

/// The driveseed variants.
pub fn default_variants() -> Vec<VariantSpec> {
    vec![
        VariantSpec::new(
            "zfile",
            "https://driveseed.org/zfile/{id}",
            Some("#cf_captcha > div.card-body > div > a"),
        ),
        VariantSpec::new(
            "wfile_type1",
            "https://driveseed.org/wfile/{id}?type=1",
            Some(WFILE_SELECTOR),
        ),
        VariantSpec::new(
            "wfile_type2",
            "https://driveseed.org/wfile/{id}?type=2",
            Some(WFILE_SELECTOR),
        ),
    ]
}

/// Probe every variant concurrently.
///
/// The map always has one entry per spec.
pub async fn collect_variants(
    strategy: &dyn FetchStrategy,
    specs: &[VariantSpec],
    file_id: &str,
    extractor: &RedirectExtractor,
    cancel: &CancellationToken,
) -> DownloadLinks {
    let probes = specs.iter().map(|spec| async move {
        let link = probe_variant(strategy, spec, file_id, extractor, cancel).await;
        (spec.key.clone(), link)
    });

    let links: DownloadLinks = join_all(probes).await.into_iter().collect();
    info!(
        "Collected {}/{} variant links for {}",
        links.values().filter(|v| v.is_some()).count(),
        links.len(),
        file_id
    );
    links
}

async fn probe_variant(
    strategy: &dyn FetchStrategy,
    spec: &VariantSpec,
    file_id: &str,
    extractor: &RedirectExtractor,
    cancel: &CancellationToken,
) -> Option<String> {
    let url = spec.url_for(file_id);
    let mut doc = match strategy.fetch(&url, Duration::ZERO, cancel).await {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Variant {} fetch failed: {}", spec.key, e);
            return None;
        }
    };

    let link = variant_link(doc.as_mut(), strategy.kind(), spec, extractor).await;
    doc.release().await;

    if link.is_none() {
        debug!("No link on variant {} ({})", spec.key, url);
    }
    link
}

async fn variant_link(
    doc: &mut dyn Document,
    kind: StrategyKind,
    spec: &VariantSpec,
    extractor: &RedirectExtractor,
) -> Option<String> {
    let href = match kind {
        StrategyKind::Impersonated => {
            let markup = doc.markup().await.ok()?;
            extractor
                .extract_redirect_or_first_anchor(&markup)
                .map(|candidate| candidate.href)
        }
        StrategyKind::Rendered => {
            let from_selector = match spec.selector {
                Some(ref selector) => doc.selector_href(selector).await,
                None => None,
            };
            match from_selector {
                Some(href) => Some(href),
                None => first_anchor(&doc.markup().await.ok()?),
            }
        }
    }?;

    let page_url = doc.current_url().await;
    Some(resolve_against(&page_url, &href).unwrap_or(href))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::testing::{FakePage, FakeStrategy};

    #[test]
    fn test_url_for_substitutes_id() {
        let spec = VariantSpec::new("zfile", "https://driveseed.org/zfile/{id}", None);
        assert_eq!(spec.url_for("abc123"), "https://driveseed.org/zfile/abc123");
    }

    #[test]
    fn test_default_variants_validate() {
        let specs = default_variants();
        assert_eq!(specs.len(), 3);
        for spec in &specs {
            spec.validate().unwrap();
        }
        assert_eq!(
            specs[1].url_for("x"),
            "https://driveseed.org/wfile/x?type=1"
        );
    }

    #[test]
    fn test_validate_rejects_bad_selector() {
        let spec = VariantSpec::new("k", "https://a/{id}", Some("div >>> ["));
        assert!(spec.validate().is_err());
        let spec = VariantSpec::new(" ", "https://a/{id}", None);
        assert!(spec.validate().is_err());
    }

    #[tokio::test]
    async fn test_one_entry_per_key_when_all_fail() {
        let strategy = FakeStrategy::impersonated();
        let links = collect_variants(
            &strategy,
            &default_variants(),
            "abc123",
            &RedirectExtractor::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(links.len(), 3);
        assert!(links.values().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_impersonated_resolves_relative_link_against_variant_page() {
        let strategy = FakeStrategy::impersonated().page(
            "https://driveseed.org/zfile/abc123",
            FakePage::html(r#"<a href="/dl/abc123.mkv">Download</a>"#),
        );
        let links = collect_variants(
            &strategy,
            &default_variants(),
            "abc123",
            &RedirectExtractor::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(
            links["zfile"].as_deref(),
            Some("https://driveseed.org/dl/abc123.mkv")
        );
        assert_eq!(links["wfile_type1"], None);
        assert_eq!(links["wfile_type2"], None);
    }

    #[tokio::test]
    async fn test_rendered_prefers_selector_then_first_anchor() {
        let strategy = FakeStrategy::rendered()
            .page(
                "https://driveseed.org/zfile/abc",
                FakePage::html(r#"<a href="https://other/first">x</a>"#)
                    .with_selector("#cf_captcha > div.card-body > div > a", "https://cdn/z"),
            )
            .page(
                "https://driveseed.org/wfile/abc?type=1",
                FakePage::html(r#"<a href="https://cdn/w1">x</a>"#),
            );
        let links = collect_variants(
            &strategy,
            &default_variants(),
            "abc",
            &RedirectExtractor::default(),
            &CancellationToken::new(),
        )
        .await;

        assert_eq!(links["zfile"].as_deref(), Some("https://cdn/z"));
        assert_eq!(links["wfile_type1"].as_deref(), Some("https://cdn/w1"));
        assert_eq!(links["wfile_type2"], None);
        assert_eq!(strategy.released(), 2);
    }
}
