//! Acquisition orchestration — concurrent fan-out over search sources.
//!
//! Every enabled source runs in parallel and the orchestrator waits for all
//! of them regardless of individual outcome: settle all, fail none. A
//! source that errors or times out is logged and excluded; it never aborts
//! its siblings. Within one source, candidate URLs are extracted
//! sequentially to bound concurrent page loads.

use crate::error::AcquireError;
use crate::events::{EventBus, ForageEvent};
use crate::extract::{CandidateDocument, PageContentExtractor};
use crate::session::{SessionState, SessionTracker};
use crate::sources::SearchSource;
use futures::future;
use std::sync::Arc;
use std::time::Duration;

pub struct AcquisitionOrchestrator {
    sources: Vec<SearchSource>,
    extractor: PageContentExtractor,
    tracker: Arc<SessionTracker>,
    events: Arc<EventBus>,
    /// Overall budget per source branch; exceeding it counts as
    /// `SourceUnavailable`, same as any other failure.
    source_budget: Duration,
}

impl AcquisitionOrchestrator {
    pub fn new(
        sources: Vec<SearchSource>,
        extractor: PageContentExtractor,
        tracker: Arc<SessionTracker>,
        events: Arc<EventBus>,
        source_budget: Duration,
    ) -> Self {
        Self {
            sources,
            extractor,
            tracker,
            events,
            source_budget,
        }
    }

    /// Fan a query out to all sources and collect every extracted document.
    ///
    /// Errs with [`AcquireError::AggregateFailure`] only when every source
    /// failed or yielded nothing — the fallback chain handles that; it is
    /// never surfaced to the caller.
    pub async fn acquire(
        &self,
        query: &str,
        session_id: &str,
    ) -> Result<Vec<CandidateDocument>, AcquireError> {
        let branches = self
            .sources
            .iter()
            .map(|source| self.run_source(source, query, session_id));

        // Barrier: wait for all branches, no short-circuit either way
        let results = future::join_all(branches).await;
        let docs: Vec<CandidateDocument> = results.into_iter().flatten().collect();

        if docs.is_empty() {
            return Err(AcquireError::AggregateFailure);
        }
        tracing::info!(
            "orchestrator collected {} document(s) for session {session_id}",
            docs.len()
        );
        Ok(docs)
    }

    /// One source branch: search, then extract its candidates sequentially.
    /// All failures are absorbed here and reported as an empty result.
    async fn run_source(
        &self,
        source: &SearchSource,
        query: &str,
        session_id: &str,
    ) -> Vec<CandidateDocument> {
        let name = source.name();
        self.tracker
            .advance(session_id, SessionState::Searching(name.to_string()));
        self.events.emit(ForageEvent::SearchStarted {
            session_id: session_id.to_string(),
            source: name.to_string(),
        });

        let branch = self.search_and_extract(source, query, session_id);
        match tokio::time::timeout(self.source_budget, branch).await {
            Ok(Ok(docs)) => docs,
            Ok(Err(e)) => {
                self.record_source_failure(session_id, name, &e.to_string());
                Vec::new()
            }
            Err(_) => {
                let reason = format!("budget of {:?} exceeded", self.source_budget);
                self.record_source_failure(session_id, name, &reason);
                Vec::new()
            }
        }
    }

    async fn search_and_extract(
        &self,
        source: &SearchSource,
        query: &str,
        session_id: &str,
    ) -> Result<Vec<CandidateDocument>, AcquireError> {
        let urls = source.search(query, session_id).await?;

        let mut docs = Vec::new();
        // Sequential within a source, to bound concurrent page loads
        for url in urls {
            self.tracker
                .advance(session_id, SessionState::Extracting(url.clone()));
            match self.extractor.extract_url(&url, session_id).await {
                Ok(Some(doc)) => {
                    self.events.emit(ForageEvent::PageExtracted {
                        session_id: session_id.to_string(),
                        url: url.clone(),
                        chars: doc.text.len(),
                    });
                    docs.push(doc);
                }
                Ok(None) => {
                    tracing::debug!("no usable content at {url}");
                }
                Err(e) => {
                    // One bad page does not fail the source
                    tracing::debug!("extraction failed for {url}: {e}");
                }
            }
        }
        Ok(docs)
    }

    fn record_source_failure(&self, session_id: &str, source: &str, reason: &str) {
        tracing::warn!("source {source} failed for session {session_id}: {reason}");
        self.events.emit(ForageEvent::SourceFailed {
            session_id: session_id.to_string(),
            source: source.to_string(),
            reason: reason.to_string(),
        });
    }
}
