//! Graceful-degradation fallback chain.
//!
//! Ordered escalation: remote search → knowledge lookup → curated corpus →
//! synthetic generator. Each tier runs only if its predecessor yielded
//! nothing or failed; the first non-empty output short-circuits the chain.
//! The synthetic tier is total — it accepts every input and always produces
//! non-empty output — so the chain as a whole never fails.

use crate::aggregate::aggregate;
use crate::config::ForageConfig;
use crate::error::AcquireError;
use crate::events::{EventBus, ForageEvent};
use crate::extract::normalize_whitespace;
use crate::fetch::FetchClient;
use crate::orchestrator::AcquisitionOrchestrator;
use crate::session::{SessionState, SessionTracker};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use url::Url;

/// Minimum accepted length for a knowledge-lookup extract.
const MIN_KNOWLEDGE_LEN: usize = 200;

/// Budget for the knowledge endpoint request.
const KNOWLEDGE_TIMEOUT_MS: u64 = 10_000;

/// One stage of the escalation chain, in strict order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FallbackTier {
    RemoteSearch,
    KnowledgeLookup,
    CuratedCorpus,
    Synthetic,
}

impl FallbackTier {
    pub const ALL: [FallbackTier; 4] = [
        FallbackTier::RemoteSearch,
        FallbackTier::KnowledgeLookup,
        FallbackTier::CuratedCorpus,
        FallbackTier::Synthetic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RemoteSearch => "remote_search",
            Self::KnowledgeLookup => "knowledge_lookup",
            Self::CuratedCorpus => "curated_corpus",
            Self::Synthetic => "synthetic",
        }
    }

    /// Parse a tier hint. Unknown strings are `None`; callers treat that as
    /// "start from the top".
    pub fn parse_hint(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "remote" | "search" | "remote_search" | "scraped" => Some(Self::RemoteSearch),
            "knowledge" | "wiki" | "knowledge_lookup" => Some(Self::KnowledgeLookup),
            "curated" | "corpus" | "curated_corpus" => Some(Self::CuratedCorpus),
            "synthetic" | "template" => Some(Self::Synthetic),
            _ => None,
        }
    }
}

impl fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The chain itself: the system's total function from query to content.
pub struct FallbackChain {
    orchestrator: AcquisitionOrchestrator,
    fetch: FetchClient,
    knowledge_url: String,
    corpus: BTreeMap<String, String>,
    config: ForageConfig,
    tracker: Arc<SessionTracker>,
    events: Arc<EventBus>,
}

impl FallbackChain {
    pub fn new(
        orchestrator: AcquisitionOrchestrator,
        fetch: FetchClient,
        corpus: BTreeMap<String, String>,
        config: ForageConfig,
        tracker: Arc<SessionTracker>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            orchestrator,
            fetch,
            knowledge_url: config.knowledge_url.clone(),
            corpus,
            config,
            tracker,
            events,
        }
    }

    /// Run the chain from `start` and return content plus the tier that
    /// produced it. Never fails: the synthetic tier is terminal and total.
    pub async fn run(
        &self,
        query: &str,
        start: FallbackTier,
        session_id: &str,
    ) -> (String, FallbackTier) {
        let mut previous: Option<FallbackTier> = None;

        for tier in FallbackTier::ALL {
            if tier < start || !self.config.tier_enabled(tier) {
                continue;
            }
            if let Some(from) = previous {
                self.events.emit(ForageEvent::TierEscalated {
                    session_id: session_id.to_string(),
                    from: from.as_str().to_string(),
                    to: tier.as_str().to_string(),
                });
            }

            match self.try_tier(tier, query, session_id).await {
                Ok(content) if !content.is_empty() => {
                    tracing::info!("tier {tier} produced content for session {session_id}");
                    return (content, tier);
                }
                Ok(_) => {
                    tracing::debug!("tier {tier} produced empty content");
                }
                Err(e) => {
                    tracing::debug!("tier {tier} unavailable: {e}");
                }
            }
            previous = Some(tier);
        }

        // Unreachable in practice: Synthetic cannot be disabled and cannot
        // fail. Kept total anyway.
        (synthetic_content(query), FallbackTier::Synthetic)
    }

    async fn try_tier(
        &self,
        tier: FallbackTier,
        query: &str,
        session_id: &str,
    ) -> Result<String, AcquireError> {
        match tier {
            FallbackTier::RemoteSearch => {
                let docs = self.orchestrator.acquire(query, session_id).await?;
                self.tracker.advance(session_id, SessionState::Aggregating);
                let texts: Vec<String> = docs.into_iter().map(|d| d.text).collect();
                Ok(aggregate(&texts, query))
            }
            FallbackTier::KnowledgeLookup => self.knowledge_lookup(query).await,
            FallbackTier::CuratedCorpus => {
                curated_lookup(&self.corpus, query).ok_or(AcquireError::TierUnavailable { tier })
            }
            FallbackTier::Synthetic => Ok(synthetic_content(query)),
        }
    }

    /// Query the structured knowledge source for a summary extract.
    /// Accepted only when the cleaned text exceeds 200 characters.
    async fn knowledge_lookup(&self, query: &str) -> Result<String, AcquireError> {
        let tier = FallbackTier::KnowledgeLookup;
        let unavailable = || AcquireError::TierUnavailable { tier };

        let mut url = Url::parse(&self.knowledge_url).map_err(|_| unavailable())?;
        url.path_segments_mut()
            .map_err(|_| unavailable())?
            .pop_if_empty()
            .push(query);

        let resp = self
            .fetch
            .get(url.as_str(), KNOWLEDGE_TIMEOUT_MS)
            .await
            .map_err(|_| unavailable())?;
        if resp.status != 200 {
            return Err(unavailable());
        }

        let body: serde_json::Value =
            serde_json::from_str(&resp.body).map_err(|_| unavailable())?;
        let raw = body
            .get("extract")
            .and_then(|e| e.as_str())
            .unwrap_or_default();

        let text = normalize_whitespace(&strip_reference_markers(raw));
        if text.len() > MIN_KNOWLEDGE_LEN {
            Ok(text)
        } else {
            Err(unavailable())
        }
    }
}

/// Remove `[1]`-style reference markers left in encyclopedia text.
fn strip_reference_markers(text: &str) -> String {
    static MARKERS: OnceLock<Regex> = OnceLock::new();
    let markers = MARKERS.get_or_init(|| Regex::new(r"\[\d+\]").unwrap());
    markers.replace_all(text, "").into_owned()
}

/// Match the lower-cased query against the corpus: exact key first, then
/// bidirectional substring.
fn curated_lookup(corpus: &BTreeMap<String, String>, query: &str) -> Option<String> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return None;
    }
    if let Some(passage) = corpus.get(&q) {
        return Some(passage.clone());
    }
    corpus
        .iter()
        .find(|(topic, _)| q.contains(topic.as_str()) || topic.contains(&q))
        .map(|(_, passage)| passage.clone())
}

/// Deterministic template fill: `len(query) mod templateCount` picks the
/// template, and the literal query is interpolated into it.
pub fn synthetic_content(query: &str) -> String {
    const TEMPLATES: [&str; 4] = [
        "The scene unfolds around {topic}, every detail sharpened by close attention. \
         There is a texture to {topic} that rewards a patient observer: small sounds, \
         shifting light, the slow accumulation of atmosphere that gives a place its character.",
        "Descriptive material on {topic}: the setting carries its own quiet weight, \
         shaped by weather and time. Anyone lingering near {topic} notices how the \
         ordinary details — a worn surface, a distant sound, a change in the air — \
         combine into something memorable.",
        "Consider {topic} at the quietest hour of the day. The light falls differently, \
         edges soften, and what seemed plain in daylight takes on depth. Writers return \
         to {topic} because it holds contrast: stillness and motion, clarity and haze.",
        "A study of {topic} begins with the senses. The air has a temperature and a \
         smell, surfaces have grain, and sound arrives from particular directions. \
         From these fragments {topic} assembles itself into a scene a reader can stand inside.",
    ];
    let template = TEMPLATES[query.len() % TEMPLATES.len()];
    template.replace("{topic}", query)
}

/// Built-in topic passages for the curated tier.
pub fn default_corpus() -> BTreeMap<String, String> {
    let entries: [(&str, &str); 8] = [
        (
            "lighthouse",
            "The lighthouse rose white and weathered above the cliffs, its lamp \
             turning with a patience older than anyone in the town below. On clear \
             nights the beam swept the water in long, even strokes; in fog it became \
             a smudge of brightness, a heartbeat of light that sailors trusted more \
             than their own eyes.",
        ),
        (
            "fog",
            "The fog came in off the water without hurry, swallowing the pier, the \
             boats, and then the streetlamps one by one. Sound traveled strangely \
             inside it — footsteps arrived before the person, and voices seemed to \
             come from everywhere and nowhere at once.",
        ),
        (
            "ocean",
            "The ocean kept its own ledger of the coast, writing and erasing the \
             shoreline with every tide. Far out, the swells moved like slow muscle \
             under gray silk, and the horizon held the flat, patient line that makes \
             people stare without knowing why.",
        ),
        (
            "forest",
            "Under the canopy the light fell in coins and ribbons, and the air \
             smelled of resin and old rain. Every sound in the forest had a second \
             life — a snapped twig repeated by echo, a bird call answered three \
             trees away — so that walking there felt like being listened to.",
        ),
        (
            "storm",
            "The storm announced itself first as a color, a bruised green-black \
             stacked on the horizon, then as a pressure against the ears. When it \
             broke, rain fell in sheets that turned the streets to rivers and \
             lightning stitched the clouds to the hills.",
        ),
        (
            "castle",
            "The castle had outlived its purpose and kept only its posture: walls \
             thick enough to swallow sound, arrow slits framing slivers of sky, and \
             stairs worn into shallow bowls by eight centuries of feet. Cold lived \
             in the stone year-round, patient as a tenant.",
        ),
        (
            "desert",
            "By noon the desert abolished distance — the hills floated on heat and \
             the road ahead dissolved into shimmer. But at dusk the land sharpened \
             again, every ridge cut clean against an orange sky, and the cold came \
             up out of the sand as if a door had opened somewhere below.",
        ),
        (
            "city",
            "The city never finished a sentence: sirens interrupted conversations, \
             trains interrupted sirens, and beneath it all ran the constant vowel of \
             traffic. From a rooftop at night it resolved into patterns — rivers of \
             headlights, grids of lit windows, each one a story mid-telling.",
        ),
    ];
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Load a corpus override from a JSON object file (topic → passage).
pub fn load_corpus(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)?;
    let map: BTreeMap<String, String> = serde_json::from_str(&raw)?;
    Ok(map.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect())
}
