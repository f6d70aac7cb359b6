//! Page content extraction — one URL in, cleaned main-body text out.
//!
//! Strips non-content elements, picks the first matching content-area
//! container (falling back to the full body), extracts visible text, and
//! normalizes whitespace. Pages that yield fewer than 100 characters are
//! treated as "no usable content", not as failures.

use crate::error::AcquireError;
use crate::fetch::FetchClient;
use crate::renderer::Renderer;
use crate::snapshot::SnapshotRecorder;
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::{Arc, OnceLock};

/// Minimum text length for a page to count as usable content.
const MIN_CONTENT_LEN: usize = 100;

/// Content-area heuristics, tried in order. Falls back to `body`.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    "#content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-body",
];

/// Elements that never contribute visible prose.
const STRIP_TAGS: &[&str] = &[
    "script", "style", "nav", "header", "footer", "aside", "noscript", "iframe", "form", "button",
];

/// Class-name fragments marking ad and chrome containers.
const JUNK_CLASS_HINTS: &[&str] = &["ad-", "ads", "advert", "banner", "sidebar", "cookie", "popup"];

/// Tags that imply a line break around their text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "section",
    "blockquote", "pre", "tr", "table",
];

/// Extracted text associated with one fetched URL, prior to aggregation.
#[derive(Debug, Clone)]
pub struct CandidateDocument {
    pub source_url: String,
    pub text: String,
    pub extracted_at: DateTime<Utc>,
}

/// Extract cleaned main-body text from raw HTML.
///
/// Returns `None` when the result is under [`MIN_CONTENT_LEN`] characters.
pub fn extract_content(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);

    let container = CONTENT_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| doc.select(&sel).next())
        .or_else(|| {
            let body = Selector::parse("body").ok()?;
            doc.select(&body).next()
        })?;

    let mut raw = String::new();
    collect_visible_text(container, &mut raw);
    let text = normalize_whitespace(&raw);

    (text.len() >= MIN_CONTENT_LEN).then_some(text)
}

/// Walk the subtree, accumulating text while skipping stripped elements.
fn collect_visible_text(el: ElementRef<'_>, out: &mut String) {
    let name = el.value().name();
    if STRIP_TAGS.contains(&name) {
        return;
    }
    if let Some(class) = el.value().attr("class") {
        let class = class.to_lowercase();
        if JUNK_CLASS_HINTS.iter().any(|h| class.contains(h)) {
            return;
        }
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            collect_visible_text(child_el, out);
        } else if let Node::Text(t) = child.value() {
            out.push_str(&t.text);
        }
    }
    if block {
        out.push('\n');
    }
}

/// Collapse runs of spaces within lines and runs of 3+ newlines down to 2.
pub fn normalize_whitespace(text: &str) -> String {
    static SPACE_RUNS: OnceLock<Regex> = OnceLock::new();
    static NEWLINE_RUNS: OnceLock<Regex> = OnceLock::new();
    let space_runs = SPACE_RUNS.get_or_init(|| Regex::new(r"[ \t\u{a0}]+").unwrap());
    let newline_runs = NEWLINE_RUNS.get_or_init(|| Regex::new(r"\n{3,}").unwrap());

    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<String> = unified
        .split('\n')
        .map(|line| space_runs.replace_all(line, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    newline_runs.replace_all(&joined, "\n\n").trim().to_string()
}

/// Loads pages and turns them into [`CandidateDocument`]s.
///
/// Prefers a browser context when one is available (dynamic pages get a
/// settle delay after navigation); otherwise falls back to a plain GET.
pub struct PageContentExtractor {
    fetch: FetchClient,
    renderer: Option<Arc<dyn Renderer>>,
    snapshots: Option<SnapshotRecorder>,
    page_timeout_ms: u64,
    settle_ms: u64,
}

impl PageContentExtractor {
    pub fn new(
        fetch: FetchClient,
        renderer: Option<Arc<dyn Renderer>>,
        snapshots: Option<SnapshotRecorder>,
        page_timeout_ms: u64,
        settle_ms: u64,
    ) -> Self {
        Self {
            fetch,
            renderer,
            snapshots,
            page_timeout_ms,
            settle_ms,
        }
    }

    /// Load one URL and extract its content.
    ///
    /// `Ok(None)` means the page loaded but held no usable text. `Err` means
    /// the load itself failed; the caller records it and moves on.
    pub async fn extract_url(
        &self,
        url: &str,
        session_id: &str,
    ) -> Result<Option<CandidateDocument>, AcquireError> {
        let html = self.load_html(url, session_id).await?;

        Ok(extract_content(&html).map(|text| CandidateDocument {
            source_url: url.to_string(),
            text,
            extracted_at: Utc::now(),
        }))
    }

    async fn load_html(&self, url: &str, session_id: &str) -> Result<String, AcquireError> {
        if let Some(renderer) = &self.renderer {
            match self.load_html_browser(renderer, url, session_id).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    tracing::debug!("browser load failed for {url}, falling back to HTTP: {e}");
                }
            }
        }

        let resp = self
            .fetch
            .get(url, self.page_timeout_ms)
            .await
            .map_err(|e| AcquireError::source_unavailable(url, e.to_string()))?;
        if resp.status >= 400 {
            return Err(AcquireError::source_unavailable(
                url,
                format!("HTTP {}", resp.status),
            ));
        }
        Ok(resp.body)
    }

    async fn load_html_browser(
        &self,
        renderer: &Arc<dyn Renderer>,
        url: &str,
        session_id: &str,
    ) -> anyhow::Result<String> {
        let mut ctx = renderer.new_context().await?;
        let nav = ctx.navigate(url, self.page_timeout_ms).await;
        if let Err(e) = nav {
            let _ = ctx.close().await;
            return Err(e);
        }
        // Settle delay for dynamic content
        tokio::time::sleep(std::time::Duration::from_millis(self.settle_ms)).await;

        if let Some(recorder) = &self.snapshots {
            if let Ok(png) = ctx.screenshot().await {
                recorder.capture(session_id, &snapshot_label(url), &png);
            }
        }

        let html = ctx.get_html().await;
        let _ = ctx.close().await;
        html
    }
}

/// Derive a filesystem-safe snapshot label from a URL.
fn snapshot_label(url: &str) -> String {
    let host = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .unwrap_or_else(|| "page".to_string());
    format!("extract-{}", host.replace('.', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_prefers_article_over_body() {
        let html = r#"
            <html><body>
            <nav>Home | About | Contact</nav>
            <article><p>The lighthouse stood at the edge of the cliffs, its beam
            sweeping through fog that had settled over the town for three days
            without a break in the gray.</p></article>
            <footer>Copyright 2026</footer>
            </body></html>"#;
        let text = extract_content(html).unwrap();
        assert!(text.contains("lighthouse stood at the edge"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Copyright"));
    }

    #[test]
    fn test_extract_strips_scripts_and_styles() {
        let html = r#"
            <html><body><main>
            <script>var tracking = "evil";</script>
            <style>.x { color: red }</style>
            <p>Fog rolled in thick over the coastal town, coating every street
            in a gray shroud that seemed to swallow sound and light alike.</p>
            </main></body></html>"#;
        let text = extract_content(html).unwrap();
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color: red"));
        assert!(text.contains("Fog rolled in thick"));
    }

    #[test]
    fn test_extract_skips_ad_containers() {
        let html = r#"
            <html><body>
            <div class="ad-banner">Buy now! Limited offer!</div>
            <p>The keeper's logbook recorded every storm for forty years, each
            entry written in the same careful hand, until the night the entries
            simply stopped.</p>
            </body></html>"#;
        let text = extract_content(html).unwrap();
        assert!(!text.contains("Buy now"));
        assert!(text.contains("logbook"));
    }

    #[test]
    fn test_short_content_is_none() {
        let html = "<html><body><p>Too short.</p></body></html>";
        assert!(extract_content(html).is_none());
    }

    #[test]
    fn test_normalize_whitespace_collapses_runs() {
        let input = "a   b\t\tc\n\n\n\n\nd  e";
        assert_eq!(normalize_whitespace(input), "a b c\n\nd e");
    }

    #[test]
    fn test_normalize_preserves_paragraph_breaks() {
        let input = "first paragraph\n\nsecond paragraph";
        assert_eq!(normalize_whitespace(input), "first paragraph\n\nsecond paragraph");
    }

    #[test]
    fn test_snapshot_label_from_url() {
        assert_eq!(
            snapshot_label("https://example.com/page"),
            "extract-example-com"
        );
        assert_eq!(snapshot_label("not a url"), "extract-page");
    }
}
