//! Tracker configuration value object and enablement rules.

use serde::{Deserialize, Serialize};

/// Wire protocol used to talk to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ApiProtocol {
    /// Current HTTP API with Basic authentication per request.
    #[default]
    Rest,
    /// Legacy session-token RPC protocol.
    LegacySoap,
}

/// One configured auto-close trigger phrase and the transition it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoCloseWord {
    pub word: String,
    pub transition: String,
}

/// Resolved tracker configuration for one repository (or the global fallback).
///
/// The resolution itself (repository config falling back to global config) is
/// the job of the hosting application; this type only carries the resolved
/// values and the enablement invariants.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JiraConfiguration {
    pub base_url: String,
    pub username: String,
    pub secret: String,
    /// Comma-separated project keys; empty matches any all-caps project prefix.
    #[serde(default)]
    pub project_filter: String,
    #[serde(default)]
    pub update_issues: bool,
    #[serde(default)]
    pub auto_close: bool,
    /// Trigger phrases in configuration order. Order is load-bearing: the
    /// first phrase matching a description token wins.
    #[serde(default)]
    pub auto_close_words: Vec<AutoCloseWord>,
    #[serde(default)]
    pub role_level: Option<String>,
    #[serde(default)]
    pub comment_prefix: String,
    #[serde(default)]
    pub comment_wrap: String,
    #[serde(default)]
    pub protocol: ApiProtocol,
    /// Recipient for delivery-failure notifications; blank disables mail.
    #[serde(default)]
    pub error_mail: Option<String>,
}

impl JiraConfiguration {
    /// A configuration is usable iff URL, username, and secret are all set.
    pub fn is_valid(&self) -> bool {
        !self.base_url.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.secret.trim().is_empty()
    }

    pub fn update_enabled(&self) -> bool {
        self.is_valid() && self.update_issues
    }

    /// Auto-close requires updates to be enabled plus a non-empty word mapping.
    pub fn auto_close_enabled(&self) -> bool {
        self.update_enabled()
            && self.auto_close
            && self
                .auto_close_words
                .iter()
                .any(|entry| !entry.word.trim().is_empty())
    }

    /// Configured words with blank entries dropped, in configuration order.
    pub fn normalized_auto_close_words(&self) -> Vec<AutoCloseWord> {
        self.auto_close_words
            .iter()
            .filter(|entry| !entry.word.trim().is_empty())
            .map(|entry| AutoCloseWord {
                word: entry.word.trim().to_string(),
                transition: entry.transition.trim().to_string(),
            })
            .collect()
    }

    /// Looks up the transition configured for an auto-close word.
    pub fn transition_for_word(&self, word: &str) -> Option<String> {
        self.auto_close_words
            .iter()
            .find(|entry| entry.word.trim().eq_ignore_ascii_case(word.trim()))
            .map(|entry| entry.transition.trim().to_string())
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiProtocol, AutoCloseWord, JiraConfiguration};

    fn valid_config() -> JiraConfiguration {
        JiraConfiguration {
            base_url: "https://jira.example.com/".to_string(),
            username: "bridge".to_string(),
            secret: "hunter2".to_string(),
            update_issues: true,
            auto_close: true,
            auto_close_words: vec![AutoCloseWord {
                word: "fix".to_string(),
                transition: "done".to_string(),
            }],
            ..JiraConfiguration::default()
        }
    }

    #[test]
    fn unit_is_valid_requires_url_username_and_secret() {
        assert!(valid_config().is_valid());
        for blank in ["base_url", "username", "secret"] {
            let mut config = valid_config();
            match blank {
                "base_url" => config.base_url = "  ".to_string(),
                "username" => config.username = String::new(),
                _ => config.secret = String::new(),
            }
            assert!(!config.is_valid(), "{blank} should invalidate the config");
        }
    }

    #[test]
    fn functional_auto_close_enabled_requires_updates_and_words() {
        assert!(valid_config().auto_close_enabled());

        let mut no_updates = valid_config();
        no_updates.update_issues = false;
        assert!(!no_updates.auto_close_enabled());

        let mut no_words = valid_config();
        no_words.auto_close_words.clear();
        assert!(!no_words.auto_close_enabled());

        let mut blank_words = valid_config();
        blank_words.auto_close_words = vec![AutoCloseWord {
            word: "   ".to_string(),
            transition: "done".to_string(),
        }];
        assert!(!blank_words.auto_close_enabled());
    }

    #[test]
    fn unit_transition_for_word_is_case_insensitive() {
        let config = valid_config();
        assert_eq!(config.transition_for_word("FIX"), Some("done".to_string()));
        assert_eq!(config.transition_for_word("close"), None);
    }

    #[test]
    fn unit_trimmed_base_url_strips_trailing_slash() {
        assert_eq!(
            valid_config().trimmed_base_url(),
            "https://jira.example.com"
        );
    }

    #[test]
    fn regression_default_protocol_is_rest() {
        assert_eq!(JiraConfiguration::default().protocol, ApiProtocol::Rest);
    }
}
