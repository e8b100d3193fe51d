//! Current-protocol tracker handler: HTTP with Basic authentication.
//!
//! Stateless per call: comments go to the issue's comment collection, state
//! changes are a two-step transitions lookup plus POST of the transition id.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use quay_jira::{strip_self_links, Comment, JiraConfiguration};

use crate::handler::{body_contains_all, truncate_for_error, DeliveryError, IssueHandler};

#[derive(Debug, Deserialize)]
struct CommentPage {
    #[serde(default)]
    comments: Vec<CommentEntry>,
}

#[derive(Debug, Deserialize)]
struct CommentEntry {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct TransitionPage {
    #[serde(default)]
    transitions: Vec<TransitionEntry>,
}

#[derive(Debug, Deserialize)]
struct TransitionEntry {
    id: String,
    name: String,
}

pub struct JiraRestHandler {
    http: reqwest::Client,
    base_url: String,
    username: String,
    secret: String,
    config: JiraConfiguration,
}

impl JiraRestHandler {
    pub fn new(config: &JiraConfiguration, request_timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .context("failed to create tracker rest client")?;
        Ok(Self {
            http,
            base_url: config.trimmed_base_url().to_string(),
            username: config.username.clone(),
            secret: config.secret.clone(),
            config: config.clone(),
        })
    }

    fn comment_url(&self, issue_key: &str) -> String {
        format!("{}/rest/api/2/issue/{issue_key}/comment", self.base_url)
    }

    fn transitions_url(&self, issue_key: &str) -> String {
        format!("{}/rest/api/2/issue/{issue_key}/transitions", self.base_url)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, DeliveryError> {
        let response = request
            .basic_auth(&self.username, Some(&self.secret))
            .send()
            .await
            .map_err(|source| DeliveryError::Transport { operation, source })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                operation,
                status: status.as_u16(),
                body: truncate_for_error(&body, 400),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl IssueHandler for JiraRestHandler {
    async fn add_comment(&self, issue_key: &str, comment: &Comment) -> Result<(), DeliveryError> {
        let body = strip_self_links(&comment.body, &self.base_url, issue_key);
        let mut payload = json!({ "body": body });
        if let Some(role) = comment
            .role_level
            .as_deref()
            .filter(|role| !role.trim().is_empty())
        {
            payload["visibility"] = json!({ "type": "role", "value": role });
        }
        self.send(
            "add comment",
            self.http.post(self.comment_url(issue_key)).json(&payload),
        )
        .await?;
        Ok(())
    }

    async fn comment_exists(
        &self,
        issue_key: &str,
        contains: &[&str],
    ) -> Result<bool, DeliveryError> {
        let operation = "list comments";
        let page: CommentPage = self
            .send(operation, self.http.get(self.comment_url(issue_key)))
            .await?
            .json()
            .await
            .map_err(|source| DeliveryError::Decode { operation, source })?;
        Ok(page
            .comments
            .iter()
            .any(|entry| body_contains_all(&entry.body, contains)))
    }

    async fn close(&self, issue_key: &str, auto_close_word: &str) -> Result<(), DeliveryError> {
        let operation = "list transitions";
        let wanted = self
            .config
            .transition_for_word(auto_close_word)
            .unwrap_or_else(|| auto_close_word.to_string());

        let page: TransitionPage = self
            .send(operation, self.http.get(self.transitions_url(issue_key)))
            .await?
            .json()
            .await
            .map_err(|source| DeliveryError::Decode { operation, source })?;

        let transition = page
            .transitions
            .iter()
            .find(|entry| entry.name.trim().eq_ignore_ascii_case(wanted.trim()))
            .ok_or_else(|| DeliveryError::NoMatchingTransition {
                issue_key: issue_key.to_string(),
                word: wanted.clone(),
            })?;

        self.send(
            "apply transition",
            self.http
                .post(self.transitions_url(issue_key))
                .json(&json!({ "transition": { "id": transition.id } })),
        )
        .await?;
        Ok(())
    }

    async fn logout(&self) -> Result<(), DeliveryError> {
        // Basic auth per request; there is no session to end.
        Ok(())
    }
}
