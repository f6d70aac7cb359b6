//! Relevance aggregation — merge multi-source text into one passage.
//!
//! Two-tier policy: prefer sentences that mention the query (or one of its
//! longer tokens); when too few match, fall back to the first substantial
//! paragraphs. Guarantees non-empty output whenever any extracted text
//! exists.

use crate::extract::normalize_whitespace;

/// Relevant-sentence count above which the sentence tier is used.
const SENTENCE_TIER_THRESHOLD: usize = 3;
/// Sentences returned by the sentence tier.
const MAX_SENTENCES: usize = 10;
/// Minimum paragraph length for the paragraph tier.
const MIN_PARAGRAPH_LEN: usize = 50;
/// Paragraphs returned by the paragraph tier.
const MAX_PARAGRAPHS: usize = 5;
/// Query tokens at or under this length are ignored by the predicate.
const MIN_TOKEN_LEN: usize = 3;

/// Merge extracted texts into a single passage relevant to the query.
pub fn aggregate(texts: &[String], query: &str) -> String {
    let combined = normalize_whitespace(&texts.join("\n\n"));

    let relevant: Vec<&str> = split_sentences(&combined)
        .into_iter()
        .filter(|s| is_relevant(s, query))
        .collect();

    if relevant.len() > SENTENCE_TIER_THRESHOLD {
        let mut out = relevant
            .into_iter()
            .take(MAX_SENTENCES)
            .collect::<Vec<_>>()
            .join(". ");
        out.push('.');
        return out;
    }

    combined
        .split("\n\n")
        .map(str::trim)
        .filter(|p| p.len() > MIN_PARAGRAPH_LEN)
        .take(MAX_PARAGRAPHS)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split on sentence-terminal punctuation, dropping empty units.
fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// A sentence is relevant when it contains the full query
/// (case-insensitively) or any query token longer than three characters.
fn is_relevant(sentence: &str, query: &str) -> bool {
    let sentence_lc = sentence.to_lowercase();
    let query_lc = query.to_lowercase();

    if sentence_lc.contains(&query_lc) {
        return true;
    }
    query_lc
        .split_whitespace()
        .filter(|t| t.len() > MIN_TOKEN_LEN)
        .any(|t| sentence_lc.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sentence_tier_when_enough_matches() {
        let input = texts(&[
            "The lighthouse beam swept the bay. Rain fell all night. \
             The lighthouse keeper kept his log. Waves broke below the lighthouse. \
             Nothing else moved. The old lighthouse had stood for a century.",
        ]);
        let out = aggregate(&input, "lighthouse");

        assert!(out.ends_with('.'));
        let sentences: Vec<&str> = out
            .split(". ")
            .map(|s| s.trim_end_matches('.'))
            .collect();
        assert!(sentences.len() <= 10);
        for s in sentences {
            assert!(
                is_relevant(s, "lighthouse"),
                "irrelevant sentence kept: {s}"
            );
        }
        assert!(!out.contains("Rain fell all night"));
    }

    #[test]
    fn test_sentence_tier_caps_at_ten() {
        let many = (0..15)
            .map(|i| format!("The lighthouse entry number {i} was recorded"))
            .collect::<Vec<_>>()
            .join(". ");
        let out = aggregate(&[many], "lighthouse");
        assert_eq!(out.matches("lighthouse").count(), 10);
    }

    #[test]
    fn test_paragraph_tier_when_few_matches() {
        let input = texts(&[
            "A long opening paragraph about a foggy coastal town where nothing named appears.",
            "Another substantial paragraph describing cliffs and gray morning light over the water.",
            "short",
        ]);
        let out = aggregate(&input, "zeppelin");

        let paragraphs: Vec<&str> = out.split("\n\n").collect();
        assert!(paragraphs.len() <= 5);
        for p in &paragraphs {
            assert!(p.len() > 50);
        }
        assert!(!out.contains("short"));
    }

    #[test]
    fn test_token_predicate_ignores_short_tokens() {
        // "foggy" (5 chars) counts as a token; "fog" (3 chars) does not
        assert!(is_relevant("the foggy air hung low", "foggy coast"));
        assert!(!is_relevant("the mist rolled in", "a fog at sea"));
    }

    #[test]
    fn test_full_query_match_is_relevant() {
        assert!(is_relevant("A Fog At Sea settled over the harbor", "a fog at sea"));
    }

    #[test]
    fn test_nonempty_whenever_input_exists() {
        let input = texts(&[
            "One paragraph that easily clears the fifty character minimum for the fallback tier.",
        ]);
        assert!(!aggregate(&input, "xyzzy12345").is_empty());
    }
}
