//! Runtime configuration, read from `FORAGE_*` environment variables.

use crate::fallback::FallbackTier;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_HTTP_PORT: u16 = 3002;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_CAPACITY: usize = 50;
const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PAGE_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_SETTLE_MS: u64 = 2_000;
const DEFAULT_MAX_SNAPSHOTS: usize = 50;
const DEFAULT_KNOWLEDGE_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary";

/// Runtime settings for the acquisition service.
#[derive(Debug, Clone)]
pub struct ForageConfig {
    /// Port for the REST API.
    pub http_port: u16,
    /// Time-to-live for cached content.
    pub cache_ttl: Duration,
    /// Maximum number of cache entries before FIFO eviction.
    pub cache_capacity: usize,
    /// Budget for reaching a searchable result page.
    pub search_timeout_ms: u64,
    /// Budget per content page load.
    pub page_timeout_ms: u64,
    /// Fixed settle delay after navigation, for dynamic content.
    pub settle_ms: u64,
    /// Fallback tiers that may run. Synthetic is always appended.
    pub enabled_tiers: Vec<FallbackTier>,
    /// Base URL of the structured knowledge source (summary endpoint).
    pub knowledge_url: String,
    /// Optional JSON file overriding the built-in curated corpus.
    pub corpus_path: Option<PathBuf>,
    /// Directory for diagnostic page snapshots.
    pub snapshot_dir: PathBuf,
    /// Snapshots kept on disk before oldest-first pruning.
    pub max_snapshots: usize,
    /// Whether to capture snapshots at search/extract transitions.
    pub snapshots_enabled: bool,
}

impl Default for ForageConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            search_timeout_ms: DEFAULT_SEARCH_TIMEOUT_MS,
            page_timeout_ms: DEFAULT_PAGE_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            enabled_tiers: FallbackTier::ALL.to_vec(),
            knowledge_url: DEFAULT_KNOWLEDGE_URL.to_string(),
            corpus_path: None,
            snapshot_dir: default_snapshot_dir(),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            snapshots_enabled: false,
        }
    }
}

impl ForageConfig {
    /// Build a config from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            http_port: read_env_u64("FORAGE_HTTP_PORT", defaults.http_port as u64) as u16,
            cache_ttl: Duration::from_secs(read_env_u64(
                "FORAGE_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )),
            cache_capacity: read_env_usize("FORAGE_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY).max(1),
            search_timeout_ms: read_env_u64("FORAGE_SEARCH_TIMEOUT_MS", DEFAULT_SEARCH_TIMEOUT_MS),
            page_timeout_ms: read_env_u64("FORAGE_PAGE_TIMEOUT_MS", DEFAULT_PAGE_TIMEOUT_MS),
            settle_ms: read_env_u64("FORAGE_SETTLE_MS", DEFAULT_SETTLE_MS),
            enabled_tiers: read_env_string("FORAGE_ENABLED_TIERS")
                .map(|csv| parse_tiers(&csv))
                .unwrap_or(defaults.enabled_tiers),
            knowledge_url: read_env_string("FORAGE_KNOWLEDGE_URL")
                .unwrap_or(defaults.knowledge_url),
            corpus_path: read_env_string("FORAGE_CORPUS_PATH").map(PathBuf::from),
            snapshot_dir: read_env_string("FORAGE_SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.snapshot_dir),
            max_snapshots: read_env_usize("FORAGE_MAX_SNAPSHOTS", DEFAULT_MAX_SNAPSHOTS).max(1),
            snapshots_enabled: read_env_string("FORAGE_SNAPSHOTS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }

    /// Whether a tier may run. Synthetic can never be disabled — it is the
    /// terminal tier that guarantees the chain produces content.
    pub fn tier_enabled(&self, tier: FallbackTier) -> bool {
        tier == FallbackTier::Synthetic || self.enabled_tiers.contains(&tier)
    }
}

/// Parse a comma-separated tier list; unknown names are ignored.
fn parse_tiers(csv: &str) -> Vec<FallbackTier> {
    csv.split(',')
        .filter_map(|s| FallbackTier::parse_hint(s.trim()))
        .collect()
}

fn default_snapshot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".forage")
        .join("snapshots")
}

fn read_env_u64(name: &str, default_value: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default_value)
}

fn read_env_usize(name: &str, default_value: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ForageConfig::default();
        assert_eq!(cfg.cache_capacity, 50);
        assert_eq!(cfg.cache_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.enabled_tiers.len(), 4);
    }

    #[test]
    fn test_parse_tiers_ignores_unknown() {
        let tiers = parse_tiers("remote, curated, bogus");
        assert_eq!(
            tiers,
            vec![FallbackTier::RemoteSearch, FallbackTier::CuratedCorpus]
        );
    }

    #[test]
    fn test_synthetic_cannot_be_disabled() {
        let cfg = ForageConfig {
            enabled_tiers: vec![FallbackTier::RemoteSearch],
            ..Default::default()
        };
        assert!(cfg.tier_enabled(FallbackTier::Synthetic));
        assert!(!cfg.tier_enabled(FallbackTier::CuratedCorpus));
    }
}
