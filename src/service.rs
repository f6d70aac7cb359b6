//! The acquisition service — single entry point for content requests.
//!
//! Request flow: validate, normalize, consult the cache, and on a miss run
//! the fallback chain under a fresh session. Whatever the chain produces is
//! cached and returned; the only error a caller can ever see is validation.

use crate::cache::{normalize_key, CacheStore};
use crate::config::ForageConfig;
use crate::error::AcquireError;
use crate::events::{EventBus, ForageEvent};
use crate::extract::PageContentExtractor;
use crate::fallback::{default_corpus, load_corpus, FallbackChain, FallbackTier};
use crate::fetch::FetchClient;
use crate::orchestrator::AcquisitionOrchestrator;
use crate::renderer::{ChromiumRenderer, NoopRenderer, Renderer};
use crate::session::SessionTracker;
use crate::snapshot::{SnapshotRecorder, SnapshotStore};
use crate::sources::{SearchBackend, SearchSource};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Event-bus buffer; slow SSE consumers lag rather than block.
const EVENT_BUFFER: usize = 256;

/// One answered acquisition request.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub content: String,
    /// `cache`, `scraped`, or `fallback`.
    pub origin: &'static str,
    /// Absent for cache hits — no pipeline ran.
    pub session_id: Option<String>,
}

pub struct AcquisitionService {
    config: ForageConfig,
    cache: RwLock<CacheStore>,
    chain: FallbackChain,
    tracker: Arc<SessionTracker>,
    events: Arc<EventBus>,
    snapshots: Option<Arc<SnapshotStore>>,
}

impl AcquisitionService {
    /// Build the production service: launch a browser if one is available,
    /// degrade to [`NoopRenderer`] (plain HTTP fetches) otherwise, and wire
    /// up all default search backends.
    pub async fn build(config: ForageConfig) -> anyhow::Result<Self> {
        let renderer: Arc<dyn Renderer> = match ChromiumRenderer::new().await {
            Ok(r) => {
                tracing::info!("browser renderer ready");
                Arc::new(r)
            }
            Err(e) => {
                tracing::warn!("no browser available, running HTTP-only: {e}");
                Arc::new(NoopRenderer)
            }
        };

        let snapshots = if config.snapshots_enabled {
            Some(Arc::new(SnapshotStore::new(
                config.snapshot_dir.clone(),
                config.max_snapshots,
            )?))
        } else {
            None
        };

        let tracker = Arc::new(SessionTracker::new());
        let recorder = snapshots
            .as_ref()
            .map(|store| SnapshotRecorder::new(Arc::clone(store), Arc::clone(&tracker)));

        let fetch = FetchClient::new(config.page_timeout_ms.max(config.search_timeout_ms));
        let sources = SearchBackend::ALL
            .iter()
            .map(|&backend| {
                SearchSource::new(
                    backend,
                    fetch.clone(),
                    Some(Arc::clone(&renderer)),
                    recorder.clone(),
                    config.search_timeout_ms,
                    config.settle_ms,
                )
            })
            .collect();

        Ok(Self::assemble(
            config,
            sources,
            fetch,
            Some(renderer),
            snapshots,
            tracker,
        ))
    }

    /// Wire a service from explicit parts. Lets tests substitute stub
    /// search endpoints and skip browser startup.
    pub fn assemble(
        config: ForageConfig,
        sources: Vec<SearchSource>,
        fetch: FetchClient,
        renderer: Option<Arc<dyn Renderer>>,
        snapshots: Option<Arc<SnapshotStore>>,
        tracker: Arc<SessionTracker>,
    ) -> Self {
        let events = Arc::new(EventBus::new(EVENT_BUFFER));
        let recorder = snapshots
            .as_ref()
            .map(|store| SnapshotRecorder::new(Arc::clone(store), Arc::clone(&tracker)));

        let extractor = PageContentExtractor::new(
            fetch.clone(),
            renderer,
            recorder,
            config.page_timeout_ms,
            config.settle_ms,
        );
        // A branch gets time for its search plus its sequential page loads
        let source_budget =
            Duration::from_millis(config.search_timeout_ms + 3 * config.page_timeout_ms);
        let orchestrator = AcquisitionOrchestrator::new(
            sources,
            extractor,
            Arc::clone(&tracker),
            Arc::clone(&events),
            source_budget,
        );

        let corpus = match &config.corpus_path {
            Some(path) => load_corpus(path).unwrap_or_else(|e| {
                tracing::warn!("failed to load corpus from {}: {e}", path.display());
                default_corpus()
            }),
            None => default_corpus(),
        };
        let chain = FallbackChain::new(
            orchestrator,
            fetch,
            corpus,
            config.clone(),
            Arc::clone(&tracker),
            Arc::clone(&events),
        );

        let cache = RwLock::new(CacheStore::new(config.cache_ttl, config.cache_capacity));
        Self {
            config,
            cache,
            chain,
            tracker,
            events,
            snapshots,
        }
    }

    /// Answer one content request.
    ///
    /// `source_hint` optionally names the tier to start from; unknown hints
    /// start at the top. The only possible error is
    /// [`AcquireError::Validation`] — everything past validation degrades
    /// rather than fails.
    pub async fn acquire(
        &self,
        query: &str,
        source_hint: Option<&str>,
    ) -> Result<Acquisition, AcquireError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AcquireError::Validation);
        }

        let key = normalize_key(query);
        let cached = self
            .cache
            .read()
            .ok()
            .and_then(|c| c.get(&key).map(str::to_string));
        if let Some(content) = cached {
            tracing::debug!("cache hit for {key}");
            self.events.emit(ForageEvent::CacheHit { key });
            return Ok(Acquisition {
                content,
                origin: "cache",
                session_id: None,
            });
        }

        let started = Instant::now();
        let session_id = self.tracker.start(query, source_hint);
        self.events.emit(ForageEvent::AcquireStarted {
            session_id: session_id.clone(),
            query: query.to_string(),
        });

        let start_tier = source_hint
            .and_then(FallbackTier::parse_hint)
            .unwrap_or(FallbackTier::RemoteSearch);
        let (content, tier) = self.chain.run(query, start_tier, &session_id).await;

        let origin = match tier {
            FallbackTier::RemoteSearch => "scraped",
            _ => "fallback",
        };
        self.tracker.complete(&session_id);
        if let Ok(mut cache) = self.cache.write() {
            cache.put(&key, content.clone());
        }

        self.events.emit(ForageEvent::AcquireComplete {
            session_id: session_id.clone(),
            origin: origin.to_string(),
            chars: content.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
        tracing::info!(
            "acquired {} chars via {origin} for session {session_id}",
            content.len()
        );

        Ok(Acquisition {
            content,
            origin,
            session_id: Some(session_id),
        })
    }

    pub fn config(&self) -> &ForageConfig {
        &self.config
    }

    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }

    pub fn tracker(&self) -> Arc<SessionTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn snapshots(&self) -> Option<Arc<SnapshotStore>> {
        self.snapshots.clone()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn active_sessions(&self) -> usize {
        self.tracker.active_count()
    }

    /// Sweep expired cache entries; used by the maintenance loop.
    pub fn cleanup_cache(&self) -> usize {
        self.cache.write().map(|mut c| c.cleanup_expired()).unwrap_or(0)
    }

    /// Full runtime state for `/diagnostics`.
    pub fn diagnostics(&self) -> serde_json::Value {
        let snapshots = self
            .snapshots
            .as_ref()
            .map(|s| s.list())
            .unwrap_or_default();
        serde_json::json!({
            "cache": {
                "entries": self.cache_size(),
                "capacity": self.config.cache_capacity,
                "ttlSecs": self.config.cache_ttl.as_secs(),
            },
            "sessions": self.tracker.diagnostics(),
            "snapshots": snapshots,
            "enabledTiers": self.config.enabled_tiers
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>(),
        })
    }
}
