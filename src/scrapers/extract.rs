//! Redirect and download-link heuristics over fetched markup.
//!
//! The target site never exposes its destination as a plain link. It sets it
//! from inline script, so script text is inspected first and DOM heuristics
//! only apply when no script assignment is present.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

/// Default substrings that mark an anchor as pointing at the file host.
pub const DEFAULT_LINK_MARKERS: &[&str] = &["driveseed.org", "/zfile/", "/wfile/", "/file/"];

/// Id of the anchor the landing page script fills in.
const REDIRECT_ANCHOR_ID: &str = "c";

/// Script patterns in priority order. Each captures the URL in group 1.
static SCRIPT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r#"c\.setAttribute\(\s*["']href["']\s*,\s*["']([^"']+)["']\s*\)"#,
            "anchor setAttribute",
        ),
        (
            r#"window\.location(?:\.href)?\s*=\s*["']([^"']+)["']"#,
            "window.location assignment",
        ),
        (
            r#"location\.assign\(\s*["']([^"']+)["']\s*\)"#,
            "location.assign call",
        ),
    ]
    .into_iter()
    .filter_map(|(pattern, name)| Regex::new(pattern).ok().map(|re| (re, name)))
    .collect()
});

static SCRIPT_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("script").ok());
static ANCHOR_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("a[href]").ok());
static TITLE_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse("title").ok());

/// Which heuristic produced a redirect candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSource {
    /// An inline script assignment or call.
    Script,
    /// The well-known `#c` anchor.
    RedirectAnchor,
    /// An anchor whose href contains a known marker.
    MarkedAnchor,
    /// The first anchor on the page, used only as a last resort.
    FirstAnchor,
}

/// A URL found in a page, not yet resolved against the page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectCandidate {
    pub href: String,
    pub source: MatchSource,
}

/// Heuristic redirect extractor.
#[derive(Debug, Clone)]
pub struct RedirectExtractor {
    markers: Vec<String>,
}

impl Default for RedirectExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_LINK_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl RedirectExtractor {
    /// Create an extractor with the given anchor markers.
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// Run the script and DOM heuristics, without the first-anchor fallback.
    pub fn extract_redirect(&self, html: &str) -> Option<RedirectCandidate> {
        let document = Html::parse_document(html);
        self.extract_from(&document)
    }

    /// Run every heuristic, falling back to the first anchor on the page.
    pub fn extract_redirect_or_first_anchor(&self, html: &str) -> Option<RedirectCandidate> {
        let document = Html::parse_document(html);
        self.extract_from(&document).or_else(|| {
            first_anchor_in(&document).map(|href| RedirectCandidate {
                href,
                source: MatchSource::FirstAnchor,
            })
        })
    }

    fn extract_from(&self, document: &Html) -> Option<RedirectCandidate> {
        if let Some(href) = script_redirect(document) {
            return Some(RedirectCandidate {
                href,
                source: MatchSource::Script,
            });
        }

        if let Some(href) = redirect_anchor(document) {
            debug!("Redirect taken from #{} anchor", REDIRECT_ANCHOR_ID);
            return Some(RedirectCandidate {
                href,
                source: MatchSource::RedirectAnchor,
            });
        }

        self.marked_anchor(document).map(|href| {
            debug!("Redirect taken from marked anchor");
            RedirectCandidate {
                href,
                source: MatchSource::MarkedAnchor,
            }
        })
    }

    fn marked_anchor(&self, document: &Html) -> Option<String> {
        let selector = ANCHOR_SELECTOR.as_ref()?;
        document
            .select(selector)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| {
                !href.is_empty() && self.markers.iter().any(|m| href.contains(m.as_str()))
            })
            .map(str::to_string)
    }
}

/// Scan inline scripts in document order, patterns in priority order per script.
fn script_redirect(document: &Html) -> Option<String> {
    let selector = SCRIPT_SELECTOR.as_ref()?;

    for script in document.select(selector) {
        let text: String = script.text().collect();
        if text.trim().is_empty() {
            continue;
        }

        for (re, name) in SCRIPT_PATTERNS.iter() {
            if let Some(url) = re.captures(&text).and_then(|c| c.get(1)) {
                debug!("Redirect matched {}", name);
                return Some(url.as_str().to_string());
            }
        }
    }

    None
}

fn redirect_anchor(document: &Html) -> Option<String> {
    let selector = Selector::parse(&format!("#{}", REDIRECT_ANCHOR_ID)).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

fn first_anchor_in(document: &Html) -> Option<String> {
    let selector = ANCHOR_SELECTOR.as_ref()?;
    document
        .select(selector)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

/// First non-empty `a[href]` in the markup.
pub fn first_anchor(html: &str) -> Option<String> {
    first_anchor_in(&Html::parse_document(html))
}

/// Text of the page `<title>`, if any.
pub fn page_title(html: &str) -> Option<String> {
    let selector = TITLE_SELECTOR.as_ref()?;
    let document = Html::parse_document(html);
    document
        .select(selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve a possibly relative href against the URL of the page it came from.
pub fn resolve_against(base_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }

    url::Url::parse(base_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .ok()
}

/// Final `/`-delimited segment of a URL path. Empty when the path ends in `/`.
pub fn file_identifier(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.path().rsplit('/').next().unwrap_or_default().to_string(),
        Err(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> RedirectExtractor {
        RedirectExtractor::default()
    }

    #[test]
    fn test_window_location_href_assignment() {
        let html = r#"<html><body>
            <a href="https://elsewhere.example/other">decoy</a>
            <script>setTimeout(function(){ window.location.href = "https://host/go/abc123"; }, 500);</script>
        </body></html>"#;

        let found = extractor().extract_redirect(html).unwrap();
        assert_eq!(found.href, "https://host/go/abc123");
        assert_eq!(found.source, MatchSource::Script);
    }

    #[test]
    fn test_script_wins_over_marked_anchor() {
        let html = r#"<html><body>
            <a id="c" href="https://driveseed.org/file/from-anchor">go</a>
            <script>location.assign('/file/from-script')</script>
        </body></html>"#;

        let found = extractor().extract_redirect(html).unwrap();
        assert_eq!(found.href, "/file/from-script");
    }

    #[test]
    fn test_scripts_scanned_in_document_order() {
        let html = r#"<html><head>
            <script>location.assign("https://first.example/a")</script>
            <script>c.setAttribute("href","https://second.example/b")</script>
        </head></html>"#;

        // The first script only matches the lowest-priority pattern, but it
        // comes first in the document.
        let found = extractor().extract_redirect(html).unwrap();
        assert_eq!(found.href, "https://first.example/a");
    }

    #[test]
    fn test_pattern_priority_within_script() {
        let html = r#"<script>
            window.location = "https://second.example/b";
            c.setAttribute("href","https://first.example/a");
        </script>"#;

        let found = extractor().extract_redirect(html).unwrap();
        assert_eq!(found.href, "https://first.example/a");
    }

    #[test]
    fn test_set_attribute_tolerates_spacing_and_quotes() {
        let html = r#"<script>c.setAttribute( 'href' , 'https://x.example/y' );</script>"#;
        assert_eq!(
            extractor().extract_redirect(html).unwrap().href,
            "https://x.example/y"
        );
    }

    #[test]
    fn test_redirect_anchor_by_id() {
        let html = r#"<html><body>
            <script>console.log("nothing here")</script>
            <a href="/somewhere">first</a>
            <a id="c" href="https://host/r/xyz">continue</a>
        </body></html>"#;

        let found = extractor().extract_redirect(html).unwrap();
        assert_eq!(found.href, "https://host/r/xyz");
        assert_eq!(found.source, MatchSource::RedirectAnchor);
    }

    #[test]
    fn test_empty_redirect_anchor_is_skipped() {
        let html = r#"<a id="c" href="">x</a><a href="https://driveseed.org/file/k">y</a>"#;
        let found = extractor().extract_redirect(html).unwrap();
        assert_eq!(found.href, "https://driveseed.org/file/k");
        assert_eq!(found.source, MatchSource::MarkedAnchor);
    }

    #[test]
    fn test_marked_anchor() {
        let html = r#"<html><body>
            <a href="/about">about</a>
            <a href="/wfile/abc?type=1">dl</a>
        </body></html>"#;

        let found = extractor().extract_redirect(html).unwrap();
        assert_eq!(found.href, "/wfile/abc?type=1");
    }

    #[test]
    fn test_custom_markers() {
        let html = r#"<a href="/about">about</a><a href="https://cdn.example/x">x</a>"#;
        let ex = RedirectExtractor::new(vec!["cdn.example".to_string()]);
        assert_eq!(ex.extract_redirect(html).unwrap().href, "https://cdn.example/x");
    }

    #[test]
    fn test_not_found() {
        let html = r#"<html><body><a href="/about">about</a></body></html>"#;
        assert!(extractor().extract_redirect(html).is_none());
    }

    #[test]
    fn test_first_anchor_last_resort() {
        let html = r#"<html><body><a href="">empty</a><a href="/about">about</a></body></html>"#;

        let found = extractor().extract_redirect_or_first_anchor(html).unwrap();
        assert_eq!(found.href, "/about");
        assert_eq!(found.source, MatchSource::FirstAnchor);
        assert!(extractor()
            .extract_redirect_or_first_anchor("<p>no links</p>")
            .is_none());
    }

    #[test]
    fn test_resolve_against_uses_base() {
        assert_eq!(
            resolve_against("https://a.example/landing/page", "/go/abc").unwrap(),
            "https://a.example/go/abc"
        );
        assert_eq!(
            resolve_against("https://a.example/landing/page", "next").unwrap(),
            "https://a.example/landing/next"
        );
        assert_eq!(
            resolve_against("https://a.example/", "https://b.example/x").unwrap(),
            "https://b.example/x"
        );
        assert!(resolve_against("not a url", "relative").is_none());
    }

    #[test]
    fn test_file_identifier() {
        assert_eq!(file_identifier("https://host/file/abc123"), "abc123");
        assert_eq!(file_identifier("https://host/file/abc123?x=1#frag"), "abc123");
        assert_eq!(file_identifier("https://host/file/"), "");
        assert_eq!(file_identifier("https://host"), "");
        assert_eq!(file_identifier("https://host/a%20b"), "a%20b");
    }

    #[test]
    fn test_page_title() {
        assert_eq!(
            page_title("<html><head><title> Just a moment </title></head></html>"),
            Some("Just a moment".to_string())
        );
        assert_eq!(page_title("<html></html>"), None);
    }
}
