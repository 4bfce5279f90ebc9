//! HTTP response wrappers.

use std::collections::HashMap;

use reqwest::StatusCode;

/// A fully-read page response.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: StatusCode,
    /// URL after following any server-side redirects.
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl PageResponse {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Whether the body looks like markup we can run heuristics over.
    pub fn is_html(&self) -> bool {
        match self.content_type() {
            Some(ct) => ct.contains("html") || ct.contains("xml") || ct.starts_with("text/"),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(content_type: Option<&str>) -> PageResponse {
        let mut headers = HashMap::new();
        if let Some(ct) = content_type {
            headers.insert("content-type".to_string(), ct.to_string());
        }
        PageResponse {
            status: StatusCode::OK,
            url: "https://example.com/".to_string(),
            headers,
            body: String::new(),
        }
    }

    #[test]
    fn test_is_html() {
        assert!(response(Some("text/html; charset=utf-8")).is_html());
        assert!(response(None).is_html());
        assert!(!response(Some("application/pdf")).is_html());
    }

    #[test]
    fn test_is_success() {
        let mut r = response(None);
        assert!(r.is_success());
        r.status = StatusCode::FORBIDDEN;
        assert!(!r.is_success());
    }
}
