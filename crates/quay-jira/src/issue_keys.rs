//! Issue-key pattern construction, extraction, and hyperlink rewriting.

use anyhow::{Context, Result};
use regex::Regex;

/// Builds the issue-key pattern for a comma-separated project-key filter.
///
/// An empty or blank filter matches any all-caps project prefix; one key is
/// anchored to exactly that prefix; several keys become a non-capturing
/// alternation.
pub fn issue_key_pattern(filter: &str) -> Result<Regex> {
    let keys: Vec<&str> = filter
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .collect();

    let source = match keys.as_slice() {
        [] => r"\b([A-Z]+-\d+)\b".to_string(),
        [key] => format!(r"\b({}-\d+)\b", regex::escape(key)),
        many => {
            let alternation = many
                .iter()
                .map(|key| regex::escape(key))
                .collect::<Vec<_>>()
                .join("|");
            format!(r"\b((?:{alternation})-\d+)\b")
        }
    };

    Regex::new(&source).with_context(|| format!("invalid issue key pattern for filter '{filter}'"))
}

/// Extracts issue keys in first-occurrence order, without duplicates.
pub fn extract_issue_keys(pattern: &Regex, text: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for found in pattern.find_iter(text) {
        let key = found.as_str();
        if !keys.iter().any(|seen| seen == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

/// Replaces every issue-key occurrence with a tracker hyperlink.
pub fn rewrite_issue_links(pattern: &Regex, text: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    pattern
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let key = &caps[0];
            format!(r#"<a href="{base}/browse/{key}">{key}</a>"#)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::{extract_issue_keys, issue_key_pattern, rewrite_issue_links};

    #[test]
    fn unit_empty_filter_matches_any_all_caps_prefix() {
        let pattern = issue_key_pattern("").expect("pattern");
        assert!(pattern.is_match("SCM-42"));
        assert!(pattern.is_match("fixed LONGPROJECT-1 today"));
        assert!(!pattern.is_match("lowercase-1"));
        assert!(!pattern.is_match("NONUMBER-"));
    }

    #[test]
    fn unit_single_key_filter_is_anchored_to_that_prefix() {
        let pattern = issue_key_pattern("TST").expect("pattern");
        assert!(pattern.is_match("TST-1"));
        assert!(!pattern.is_match("OTHER-1"));
    }

    #[test]
    fn functional_multi_key_filter_builds_alternation() {
        let pattern = issue_key_pattern("TST, SCM ,API").expect("pattern");
        for key in ["TST-1", "SCM-9", "API-100"] {
            assert!(pattern.is_match(key), "{key} should match");
        }
        assert!(!pattern.is_match("WEB-1"));
    }

    #[test]
    fn regression_key_match_is_word_bounded() {
        let pattern = issue_key_pattern("TST").expect("pattern");
        assert_eq!(extract_issue_keys(&pattern, "XTST-1"), Vec::<String>::new());
        assert_eq!(extract_issue_keys(&pattern, "(TST-1)"), vec!["TST-1"]);
        // \b sits between the digit and the following letter, so the key
        // itself still matches cleanly.
        assert_eq!(extract_issue_keys(&pattern, "TST-1: done"), vec!["TST-1"]);
    }

    #[test]
    fn functional_extraction_is_ordered_and_deduplicated() {
        let pattern = issue_key_pattern("").expect("pattern");
        let keys = extract_issue_keys(
            &pattern,
            "TST-1 and TST-2 are ready to review and we have fixed TST-3",
        );
        assert_eq!(keys, vec!["TST-1", "TST-2", "TST-3"]);

        let repeated = extract_issue_keys(&pattern, "TST-2 then TST-1 then TST-2 again");
        assert_eq!(repeated, vec!["TST-2", "TST-1"]);
    }

    #[test]
    fn functional_rewrite_links_every_occurrence() {
        let pattern = issue_key_pattern("TST").expect("pattern");
        let rewritten =
            rewrite_issue_links(&pattern, "TST-1 fixed, see TST-1", "https://jira.example.com/");
        assert_eq!(
            rewritten,
            "<a href=\"https://jira.example.com/browse/TST-1\">TST-1</a> fixed, \
             see <a href=\"https://jira.example.com/browse/TST-1\">TST-1</a>"
        );
    }

    #[test]
    fn regression_rewrite_without_keys_returns_text_unchanged() {
        let pattern = issue_key_pattern("TST").expect("pattern");
        assert_eq!(
            rewrite_issue_links(&pattern, "no keys here", "https://jira.example.com"),
            "no keys here"
        );
    }
}
