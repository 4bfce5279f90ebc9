//! Resolver error types.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure to obtain a document under either strategy.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Timed out after {}s fetching {url}", after.as_secs())]
    Timeout { url: String, after: Duration },

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Browser engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                after: timeout,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Last page the resolver saw before failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub last_url: Option<String>,
    pub title: Option<String>,
}

impl PageContext {
    pub fn url(url: &str) -> Self {
        Self {
            last_url: Some(url.to_string()),
            title: None,
        }
    }
}

/// Why a resolution failed.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Invalid start URL: {0}")]
    InvalidInput(String),

    #[error("Browser engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("{source}")]
    Fetch {
        source: FetchError,
        context: PageContext,
    },

    #[error("Redirect link not found")]
    RedirectNotFound { context: PageContext },

    #[error("No file identifier in {final_url}")]
    EmptyFileId { final_url: String },

    #[error("Resolution cancelled")]
    Cancelled,
}

impl ResolveError {
    /// Wrap a fetch failure, lifting cancellation and engine availability
    /// into their own kinds.
    pub fn fetch(source: FetchError, context: PageContext) -> Self {
        match source {
            FetchError::Cancelled => ResolveError::Cancelled,
            FetchError::EngineUnavailable(reason) => ResolveError::EngineUnavailable(reason),
            source => ResolveError::Fetch { source, context },
        }
    }

    /// Stable machine-readable name.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::InvalidInput(_) => "invalid_input",
            ResolveError::EngineUnavailable(_) => "engine_unavailable",
            ResolveError::Fetch { .. } => "fetch_error",
            ResolveError::RedirectNotFound { .. } => "redirect_not_found",
            ResolveError::EmptyFileId { .. } => "empty_file_id",
            ResolveError::Cancelled => "cancelled",
        }
    }

    pub fn context(&self) -> Option<&PageContext> {
        match self {
            ResolveError::Fetch { context, .. } | ResolveError::RedirectNotFound { context } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether a first-hop failure of this kind warrants retrying with the
    /// rendered strategy.
    pub(crate) fn allows_fallback(&self) -> bool {
        matches!(
            self,
            ResolveError::Fetch { .. } | ResolveError::RedirectNotFound { .. }
        )
    }

    pub fn payload(&self) -> ErrorPayload {
        let (last_url, title) = match self.context() {
            Some(context) => (context.last_url.clone(), context.title.clone()),
            None => match self {
                ResolveError::EmptyFileId { final_url } => (Some(final_url.clone()), None),
                _ => (None, None),
            },
        };

        ErrorPayload {
            error: self.to_string(),
            kind: self.kind(),
            last_url,
            title,
        }
    }
}

/// JSON body returned for a failed resolution.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorPayload {
    pub error: String,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}
