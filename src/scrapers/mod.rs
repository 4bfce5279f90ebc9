//! Page fetching and markup heuristics.

pub mod browser;
pub mod extract;
mod http_client;

pub use browser::{BrowserEngine, BrowserSession, EngineStatus};
pub use extract::{RedirectCandidate, RedirectExtractor};
pub use http_client::{
    HttpClient, HttpClientBuilder, ImpersonateProfile, PageResponse, IMPERSONATE_USER_AGENTS,
};
