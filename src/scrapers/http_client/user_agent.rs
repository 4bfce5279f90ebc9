//! Browser impersonation profiles for HTTP requests.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Real browser user agents for impersonate mode.
pub const IMPERSONATE_USER_AGENTS: &[(&str, &str)] = &[
    (
        "chrome124",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    (
        "chrome131",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    ),
    (
        "edge131",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    ),
    (
        "firefox133",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    ),
    (
        "safari18",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    ),
];

/// Named browser fingerprint to present on impersonated requests.
///
/// Covers the header layer of a fingerprint: user agent, accept headers,
/// client hints and fetch metadata, in the order the browser sends them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpersonateProfile {
    #[default]
    Chrome124,
    Chrome131,
    Edge131,
    Firefox133,
    Safari18,
}

impl ImpersonateProfile {
    /// Profile name as used in config and the `IMPERSONATE` env var.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome124 => "chrome124",
            Self::Chrome131 => "chrome131",
            Self::Edge131 => "edge131",
            Self::Firefox133 => "firefox133",
            Self::Safari18 => "safari18",
        }
    }

    pub fn user_agent(&self) -> &'static str {
        IMPERSONATE_USER_AGENTS
            .iter()
            .find(|(name, _)| *name == self.name())
            .map(|(_, ua)| *ua)
            .unwrap_or(IMPERSONATE_USER_AGENTS[0].1)
    }

    /// Default headers sent with every request, excluding the user agent.
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        let accept_html =
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

        match self {
            Self::Chrome124 | Self::Chrome131 | Self::Edge131 => {
                let client_hint = match self {
                    Self::Chrome124 => {
                        "\"Chromium\";v=\"124\", \"Google Chrome\";v=\"124\", \"Not-A.Brand\";v=\"99\""
                    }
                    Self::Chrome131 => {
                        "\"Google Chrome\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\""
                    }
                    _ => "\"Microsoft Edge\";v=\"131\", \"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"",
                };
                vec![
                    ("sec-ch-ua", client_hint),
                    ("sec-ch-ua-mobile", "?0"),
                    ("sec-ch-ua-platform", "\"Windows\""),
                    ("upgrade-insecure-requests", "1"),
                    (
                        "accept",
                        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
                    ),
                    ("sec-fetch-site", "none"),
                    ("sec-fetch-mode", "navigate"),
                    ("sec-fetch-user", "?1"),
                    ("sec-fetch-dest", "document"),
                    ("accept-language", "en-US,en;q=0.9"),
                ]
            }
            Self::Firefox133 => vec![
                ("accept", accept_html),
                ("accept-language", "en-US,en;q=0.5"),
                ("upgrade-insecure-requests", "1"),
                ("sec-fetch-dest", "document"),
                ("sec-fetch-mode", "navigate"),
                ("sec-fetch-site", "none"),
                ("sec-fetch-user", "?1"),
            ],
            Self::Safari18 => vec![
                ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
                ("accept-language", "en-US,en;q=0.9"),
                ("sec-fetch-dest", "document"),
                ("sec-fetch-mode", "navigate"),
                ("sec-fetch-site", "none"),
            ],
        }
    }

    /// Parse a profile name, ignoring case, dashes and underscores.
    pub fn from_name(s: &str) -> Option<Self> {
        let normalized = s.to_lowercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "chrome" | "chrome124" => Some(Self::Chrome124),
            "chrome131" => Some(Self::Chrome131),
            "edge" | "edge131" => Some(Self::Edge131),
            "firefox" | "firefox133" => Some(Self::Firefox133),
            "safari" | "safari18" => Some(Self::Safari18),
            _ => None,
        }
    }
}

impl fmt::Display for ImpersonateProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImpersonateProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            let valid: Vec<&str> = IMPERSONATE_USER_AGENTS.iter().map(|(n, _)| *n).collect();
            format!(
                "Unknown impersonation profile '{}'. Valid options: {}",
                s,
                valid.join(", ")
            )
        })
    }
}
