//! HTTP client that presents a real browser's header fingerprint.
//!
//! Each client owns its own cookie jar. The resolver builds one per
//! resolution so cookies set by one hop reach the next without leaking
//! between requests.

mod response;
mod user_agent;

pub use response::PageResponse;
pub use user_agent::{ImpersonateProfile, IMPERSONATE_USER_AGENTS};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy, Response};
use tracing::{debug, warn};

use crate::config::HttpConfig;

fn extract_response_headers(response: &Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

/// Builder for constructing `HttpClient` with optional configuration.
pub struct HttpClientBuilder {
    timeout: Duration,
    profile: ImpersonateProfile,
    proxy: Option<String>,
}

impl HttpClientBuilder {
    /// Set the browser profile to impersonate.
    pub fn profile(mut self, profile: ImpersonateProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Route requests through a proxy (e.g. "socks5://127.0.0.1:1080").
    pub fn proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_string);
        self
    }

    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in self.profile.headers() {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }

        let mut builder = Client::builder()
            .user_agent(self.profile.user_agent())
            .default_headers(headers)
            .cookie_provider(Arc::new(reqwest::cookie::Jar::default()))
            .timeout(self.timeout)
            .gzip(true)
            .brotli(true);

        if let Some(ref proxy) = self.proxy {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        Ok(HttpClient {
            client: builder.build()?,
            profile: self.profile,
        })
    }
}

/// Impersonating HTTP client.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    profile: ImpersonateProfile,
}

impl HttpClient {
    /// Start building a client with the given request timeout.
    pub fn builder(timeout: Duration) -> HttpClientBuilder {
        HttpClientBuilder {
            timeout,
            profile: ImpersonateProfile::default(),
            proxy: None,
        }
    }

    /// Build a client from the `[http]` config section.
    pub fn from_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Self::builder(Duration::from_secs(config.timeout))
            .profile(config.profile)
            .proxy(config.proxy.as_deref())
            .build()
    }

    pub fn profile(&self) -> ImpersonateProfile {
        self.profile
    }

    /// GET a page and read its body as text.
    ///
    /// Server redirects are followed; the returned URL is the final one.
    /// Non-2xx statuses are returned, not treated as errors.
    pub async fn get_page(&self, url: &str) -> Result<PageResponse, reqwest::Error> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;

        let status = response.status();
        let final_url = response.url().to_string();
        let headers = extract_response_headers(&response);
        let body = response.text().await?;

        debug!(
            "GET {} -> {} ({} bytes, {}ms, profile {})",
            url,
            status.as_u16(),
            body.len(),
            start.elapsed().as_millis(),
            self.profile
        );
        if !status.is_success() {
            warn!("GET {} returned status {}", url, status.as_u16());
        }

        Ok(PageResponse {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}
