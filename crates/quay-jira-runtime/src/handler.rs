//! The tracker capability seam and protocol selection.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use quay_jira::{ApiProtocol, Comment, JiraConfiguration};

use crate::rest_handler::JiraRestHandler;
use crate::soap_handler::JiraSoapHandler;

pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Failure while delivering a comment or transition to the tracker.
///
/// Every variant routes into the problem queue the same way; the variants
/// exist so logs and notifications can say what actually went wrong.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("tracker {operation} request failed")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("tracker {operation} rejected with status {status}: {body}")]
    Rejected {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("tracker {operation} returned an undecodable response")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("tracker {operation} response is missing {field}")]
    Malformed {
        operation: &'static str,
        field: &'static str,
    },
    #[error("no transition matching '{word}' is available for issue {issue_key}")]
    NoMatchingTransition { issue_key: String, word: String },
}

/// Uniform contract over the two wire protocols.
#[async_trait]
pub trait IssueHandler: Send + Sync {
    /// Posts a comment to the issue. Implementations strip the
    /// self-referential tracker hyperlink from the body before sending.
    async fn add_comment(&self, issue_key: &str, comment: &Comment) -> Result<(), DeliveryError>;

    /// True when one existing comment body contains ALL of `contains`.
    async fn comment_exists(
        &self,
        issue_key: &str,
        contains: &[&str],
    ) -> Result<bool, DeliveryError>;

    /// Drives the state transition configured for `auto_close_word`.
    async fn close(&self, issue_key: &str, auto_close_word: &str) -> Result<(), DeliveryError>;

    /// Ends the tracker session where the protocol has one.
    async fn logout(&self) -> Result<(), DeliveryError>;
}

/// Builds the handler matching the configuration's protocol flag.
pub fn build_handler(config: &JiraConfiguration) -> Result<Arc<dyn IssueHandler>> {
    build_handler_with_timeout(config, DEFAULT_REQUEST_TIMEOUT)
}

pub fn build_handler_with_timeout(
    config: &JiraConfiguration,
    request_timeout: Duration,
) -> Result<Arc<dyn IssueHandler>> {
    Ok(match config.protocol {
        ApiProtocol::Rest => Arc::new(JiraRestHandler::new(config, request_timeout)?),
        ApiProtocol::LegacySoap => Arc::new(JiraSoapHandler::new(config, request_timeout)?),
    })
}

/// Seam for handler construction so resubmission and the push path share one
/// builder and tests can substitute fakes.
pub trait HandlerFactory: Send + Sync {
    fn build(&self, config: &JiraConfiguration) -> Result<Arc<dyn IssueHandler>>;
}

pub struct ProtocolHandlerFactory {
    request_timeout: Duration,
}

impl ProtocolHandlerFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for ProtocolHandlerFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl HandlerFactory for ProtocolHandlerFactory {
    fn build(&self, config: &JiraConfiguration) -> Result<Arc<dyn IssueHandler>> {
        build_handler_with_timeout(config, self.request_timeout)
    }
}

/// Caps response bodies quoted inside error messages.
pub(crate) fn truncate_for_error(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let truncated: String = body.chars().take(max_chars).collect();
    format!("{truncated}…")
}

/// True when every candidate substring occurs in `body`.
pub(crate) fn body_contains_all(body: &str, contains: &[&str]) -> bool {
    contains.iter().all(|needle| body.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::{body_contains_all, truncate_for_error};

    #[test]
    fn unit_truncate_for_error_keeps_short_bodies() {
        assert_eq!(truncate_for_error("short", 10), "short");
    }

    #[test]
    fn unit_truncate_for_error_cuts_long_bodies() {
        let truncated = truncate_for_error("0123456789abcdef", 10);
        assert_eq!(truncated, "0123456789…");
    }

    #[test]
    fn unit_body_contains_all_requires_every_needle() {
        assert!(body_contains_all("changeset 42: some description", &[
            "42",
            "some description"
        ]));
        assert!(!body_contains_all("changeset 42 only", &["42", "some description"]));
        assert!(body_contains_all("anything", &[]));
    }
}
