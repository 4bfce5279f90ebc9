//! Resolver output types.

use std::collections::BTreeMap;

use serde::Serialize;

use super::strategy::StrategyKind;

/// Variant key to direct link. `None` when the probe found nothing.
pub type DownloadLinks = BTreeMap<String, Option<String>>;

/// A completed resolution.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResolutionResult {
    /// File page URL after following the landing page redirect.
    pub final_url: String,
    pub file_id: String,
    /// One entry per configured variant.
    pub download_links: DownloadLinks,
    /// Strategy that produced this result.
    pub strategy: StrategyKind,
}

impl ResolutionResult {
    /// Number of variants that yielded a link.
    pub fn found_count(&self) -> usize {
        self.download_links.values().filter(|v| v.is_some()).count()
    }
}
