//! Auto-close trigger-phrase matching.
//!
//! Matching is case-insensitive and word-bounded: a phrase only counts when it
//! is delimited by non-alphanumeric characters or the ends of the text, and
//! multi-word phrases tolerate arbitrary whitespace runs between their words.
//! The detection policy is first-match, not longest-match: the earliest
//! occurrence in the description wins, and configuration order breaks ties
//! between phrases matching at the same position.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::AutoCloseWord;
use crate::pattern_cache::PatternCache;

/// Compiles the word-bounded, case-insensitive pattern for one phrase.
pub fn auto_close_pattern(word: &str) -> Result<Regex> {
    let body = word
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    let source = format!(r"(?i)(?:^|[^a-z0-9])(?:{body})(?:[^a-z0-9]|$)");
    Regex::new(&source).with_context(|| format!("invalid auto close pattern for '{word}'"))
}

/// Returns true when the phrase occurs anywhere in the description.
pub fn phrase_matches(pattern: &Regex, description: &str) -> bool {
    pattern.is_match(description)
}

fn cache_key(phrase: &str) -> String {
    format!("auto-close:{phrase}")
}

/// Returns the first configured phrase matching the description, compiling
/// phrase patterns through the shared cache.
///
/// The earliest match in the description wins; phrases matching at the same
/// position are decided by configuration order, never by phrase length.
pub fn detect_auto_close_word<'a>(
    description: &str,
    words: &'a [AutoCloseWord],
    patterns: &PatternCache,
) -> Result<Option<&'a AutoCloseWord>> {
    let mut winner: Option<(usize, usize, &'a AutoCloseWord)> = None;
    for (order, entry) in words.iter().enumerate() {
        let phrase = entry.word.trim();
        if phrase.is_empty() {
            continue;
        }
        let pattern = patterns.get_or_compile(&cache_key(phrase), || auto_close_pattern(phrase))?;
        if !phrase_matches(&pattern, description) {
            continue;
        }
        let Some(found) = pattern.find(description) else {
            continue;
        };
        let replace = match winner {
            None => true,
            Some((start, seen, _)) => (found.start(), order) < (start, seen),
        };
        if replace {
            winner = Some((found.start(), order, entry));
        }
    }
    Ok(winner.map(|(_, _, entry)| entry))
}
