//! External search backends — a small closed set of variants.
//!
//! Each backend turns a query into an ordered list of candidate URLs, or
//! fails with a source-unavailable condition. Result-page structure is a
//! volatile, best-effort dependency: a parse that finds nothing is treated
//! exactly like a timeout, and one backend's failure never blocks another.

use crate::error::AcquireError;
use crate::fetch::FetchClient;
use crate::renderer::Renderer;
use crate::snapshot::SnapshotRecorder;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Candidate URLs requested per source, to cap page-load fan-out.
const MAX_CANDIDATES: usize = 3;

/// The closed set of search backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    DuckDuckGo,
    Bing,
    Brave,
}

impl SearchBackend {
    pub const ALL: [SearchBackend; 3] = [
        SearchBackend::DuckDuckGo,
        SearchBackend::Bing,
        SearchBackend::Brave,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Bing => "bing",
            Self::Brave => "brave",
        }
    }

    fn base_url(self) -> &'static str {
        match self {
            Self::DuckDuckGo => "https://html.duckduckgo.com/html/",
            Self::Bing => "https://www.bing.com/search",
            Self::Brave => "https://search.brave.com/search",
        }
    }

    /// Selector for result links. Best-effort: these pages change without
    /// notice, and a miss is just a `SourceUnavailable` for this backend.
    fn result_selector(self) -> &'static str {
        match self {
            Self::DuckDuckGo => "a.result__a",
            Self::Bing => "li.b_algo h2 a",
            Self::Brave => "div.snippet a",
        }
    }

    /// Host fragments identifying the backend's own pages, excluded from
    /// candidates.
    fn own_host_fragments(self) -> &'static [&'static str] {
        match self {
            Self::DuckDuckGo => &["duckduckgo."],
            Self::Bing => &["bing.", "microsoft."],
            Self::Brave => &["brave."],
        }
    }
}

/// One search backend bound to the transports it needs.
pub struct SearchSource {
    backend: SearchBackend,
    base_url: String,
    fetch: FetchClient,
    renderer: Option<Arc<dyn Renderer>>,
    snapshots: Option<SnapshotRecorder>,
    search_timeout_ms: u64,
    settle_ms: u64,
}

impl SearchSource {
    pub fn new(
        backend: SearchBackend,
        fetch: FetchClient,
        renderer: Option<Arc<dyn Renderer>>,
        snapshots: Option<SnapshotRecorder>,
        search_timeout_ms: u64,
        settle_ms: u64,
    ) -> Self {
        Self {
            backend,
            base_url: backend.base_url().to_string(),
            fetch,
            renderer,
            snapshots,
            search_timeout_ms,
            settle_ms,
        }
    }

    /// Override the backend endpoint. Used by tests to point a source at a
    /// local stub server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Run one search, returning up to [`MAX_CANDIDATES`] external URLs.
    ///
    /// Any transport failure, non-2xx status, or empty result set maps to
    /// [`AcquireError::SourceUnavailable`].
    pub async fn search(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<Vec<String>, AcquireError> {
        let url = self.query_url(query)?;
        let html = self.load_results_page(&url, session_id).await?;

        let links = parse_result_links(
            &html,
            self.backend.result_selector(),
            self.backend.own_host_fragments(),
            MAX_CANDIDATES,
        );

        if links.is_empty() {
            return Err(AcquireError::source_unavailable(
                self.name(),
                "no results on page",
            ));
        }
        Ok(links)
    }

    fn query_url(&self, query: &str) -> Result<String, AcquireError> {
        Url::parse_with_params(&self.base_url, &[("q", query)])
            .map(|u| u.to_string())
            .map_err(|e| AcquireError::source_unavailable(self.name(), e.to_string()))
    }

    async fn load_results_page(
        &self,
        url: &str,
        session_id: &str,
    ) -> Result<String, AcquireError> {
        if let Some(renderer) = &self.renderer {
            match self.load_results_browser(renderer, url, session_id).await {
                Ok(html) => return Ok(html),
                Err(e) => {
                    tracing::debug!(
                        "browser search failed for {}, falling back to HTTP: {e}",
                        self.name()
                    );
                }
            }
        }

        let resp = self
            .fetch
            .get(url, self.search_timeout_ms)
            .await
            .map_err(|e| AcquireError::source_unavailable(self.name(), e.to_string()))?;
        if resp.status >= 400 {
            return Err(AcquireError::source_unavailable(
                self.name(),
                format!("HTTP {}", resp.status),
            ));
        }
        Ok(resp.body)
    }

    async fn load_results_browser(
        &self,
        renderer: &Arc<dyn Renderer>,
        url: &str,
        session_id: &str,
    ) -> anyhow::Result<String> {
        let mut ctx = renderer.new_context().await?;
        if let Err(e) = ctx.navigate(url, self.search_timeout_ms).await {
            let _ = ctx.close().await;
            return Err(e);
        }
        // Settle delay for dynamic result pages
        tokio::time::sleep(std::time::Duration::from_millis(self.settle_ms)).await;

        if let Some(recorder) = &self.snapshots {
            if let Ok(png) = ctx.screenshot().await {
                let label = format!("search-{}", self.name());
                recorder.capture(session_id, &label, &png);
            }
        }

        let html = ctx.get_html().await;
        let _ = ctx.close().await;
        html
    }
}

/// Pull external http(s) links out of a result page.
fn parse_result_links(
    html: &str,
    selector: &str,
    own_host_fragments: &[&str],
    max: usize,
) -> Vec<String> {
    let sel = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(resolved) = resolve_result_href(href) else {
            continue;
        };
        let Ok(parsed) = Url::parse(&resolved) else {
            continue;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            continue;
        }
        let host = parsed.host_str().unwrap_or_default().to_lowercase();
        if own_host_fragments.iter().any(|f| host.contains(f)) {
            continue;
        }
        if seen.insert(resolved.clone()) {
            links.push(resolved);
            if links.len() >= max {
                break;
            }
        }
    }

    links
}

/// Unwrap redirect-style hrefs (DuckDuckGo's `uddg` indirection) and
/// normalize protocol-relative links.
fn resolve_result_href(href: &str) -> Option<String> {
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    if parsed.path().starts_with("/l/") || parsed.query().unwrap_or_default().contains("uddg=") {
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
            return Some(target.into_owned());
        }
    }
    Some(absolute)
}
