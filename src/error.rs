//! Error taxonomy for the acquisition pipeline.
//!
//! Only [`AcquireError::Validation`] is ever visible to a caller. Everything
//! below it is recovered inside the pipeline: a failed source is excluded
//! from its request's aggregate, and a failed tier escalates to the next one
//! until the synthetic tier, which cannot fail.

use crate::fallback::FallbackTier;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcquireError {
    /// Malformed request (empty query). Surfaced as HTTP 400; no session is
    /// created and nothing is cached.
    #[error("Query is required")]
    Validation,

    /// One search backend or one page extraction failed or timed out.
    /// Recovered locally; never aborts sibling sources.
    // Field is not named `source`: thiserror would treat that as the
    // error cause, and it is just a backend name.
    #[error("source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Every source failed or produced nothing. Handled by the fallback
    /// chain, not surfaced.
    #[error("all search sources failed or returned no usable content")]
    AggregateFailure,

    /// A non-terminal fallback tier produced nothing; the chain escalates.
    #[error("{tier} tier produced no usable content")]
    TierUnavailable { tier: FallbackTier },
}

impl AcquireError {
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_source_unavailable_message_and_cause() {
        let err = AcquireError::source_unavailable("duckduckgo", "HTTP 503");
        assert_eq!(err.to_string(), "source duckduckgo unavailable: HTTP 503");
        // The backend name is data, not an error cause
        assert!(err.source().is_none());
    }
}
