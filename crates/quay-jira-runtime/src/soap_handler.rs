//! Legacy-protocol tracker handler: session-token RPC over SOAP.
//!
//! Authenticates once per session and reuses the token until `logout`. The
//! close operation looks up the workflow actions available for the issue,
//! picks the one whose name contains the auto-close word, and falls back to a
//! fixed action id when nothing matches. Responses are narrow enough that the
//! few needed fields are extracted with patterns; no XML tree is built.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tokio::sync::Mutex;

use quay_jira::{strip_self_links, Comment, JiraConfiguration};

use crate::handler::{body_contains_all, truncate_for_error, DeliveryError, IssueHandler};

/// Default workflow action when no available action matches the word.
const FALLBACK_CLOSE_ACTION_ID: &str = "2";

pub struct JiraSoapHandler {
    http: reqwest::Client,
    endpoint: String,
    base_url: String,
    username: String,
    secret: String,
    token: Mutex<Option<String>>,
    login_pattern: Regex,
    fault_pattern: Regex,
    action_pattern: Regex,
    comment_body_pattern: Regex,
}

impl JiraSoapHandler {
    pub fn new(config: &JiraConfiguration, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to create tracker soap client")?;
        let base_url = config.trimmed_base_url().to_string();
        Ok(Self {
            endpoint: format!("{base_url}/rpc/soap/jirasoapservice-v2"),
            base_url,
            http,
            username: config.username.clone(),
            secret: config.secret.clone(),
            token: Mutex::new(None),
            login_pattern: Regex::new(r"<(?:\w+:)?loginReturn[^>]*>([^<]*)</(?:\w+:)?loginReturn>")
                .context("login pattern")?,
            fault_pattern: Regex::new(r"(?s)<(?:\w+:)?faultstring[^>]*>(.*?)</(?:\w+:)?faultstring>")
                .context("fault pattern")?,
            action_pattern: Regex::new(
                r"(?s)<(?:\w+:)?id[^>]*>\s*(\d+)\s*</(?:\w+:)?id>\s*<(?:\w+:)?name[^>]*>(.*?)</(?:\w+:)?name>",
            )
            .context("action pattern")?,
            comment_body_pattern: Regex::new(r"(?s)<(?:\w+:)?body[^>]*>(.*?)</(?:\w+:)?body>")
                .context("comment body pattern")?,
        })
    }

    async fn call(
        &self,
        operation: &'static str,
        arguments: &[String],
    ) -> Result<String, DeliveryError> {
        let items = arguments
            .iter()
            .enumerate()
            .map(|(index, value)| format!("<in{index}>{value}</in{index}>"))
            .collect::<String>();
        let envelope = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" "#,
                r#"xmlns:soap="http://soap.rpc.jira.atlassian.com">"#,
                "<soapenv:Body><soap:{op}>{items}</soap:{op}></soapenv:Body></soapenv:Envelope>"
            ),
            op = operation,
            items = items
        );

        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", "text/xml; charset=utf-8")
            .header("soapaction", "\"\"")
            .body(envelope)
            .send()
            .await
            .map_err(|source| DeliveryError::Transport { operation, source })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|source| DeliveryError::Decode { operation, source })?;

        if let Some(fault) = self.fault_pattern.captures(&text) {
            return Err(DeliveryError::Rejected {
                operation,
                status: status.as_u16(),
                body: truncate_for_error(xml_unescape(fault[1].trim()).as_str(), 400),
            });
        }
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                operation,
                status: status.as_u16(),
                body: truncate_for_error(&text, 400),
            });
        }
        Ok(text)
    }

    async fn session_token(&self) -> Result<String, DeliveryError> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let operation = "login";
        let response = self
            .call(
                operation,
                &[xml_escape(&self.username), xml_escape(&self.secret)],
            )
            .await?;
        let token = self
            .login_pattern
            .captures(&response)
            .map(|caps| xml_unescape(caps[1].trim()))
            .filter(|token| !token.is_empty())
            .ok_or(DeliveryError::Malformed {
                operation,
                field: "login token",
            })?;
        *slot = Some(token.clone());
        Ok(token)
    }

    fn available_actions(&self, response: &str) -> Vec<(String, String)> {
        self.action_pattern
            .captures_iter(response)
            .map(|caps| (caps[1].to_string(), xml_unescape(caps[2].trim())))
            .collect()
    }
}

#[async_trait]
impl IssueHandler for JiraSoapHandler {
    async fn add_comment(&self, issue_key: &str, comment: &Comment) -> Result<(), DeliveryError> {
        let token = self.session_token().await?;
        let body = strip_self_links(&comment.body, &self.base_url, issue_key);
        let mut remote_comment = format!("<body>{}</body>", xml_escape(&body));
        if let Some(role) = comment
            .role_level
            .as_deref()
            .filter(|role| !role.trim().is_empty())
        {
            remote_comment.push_str(&format!("<roleLevel>{}</roleLevel>", xml_escape(role)));
        }
        self.call(
            "addComment",
            &[
                xml_escape(&token),
                xml_escape(issue_key),
                remote_comment,
            ],
        )
        .await?;
        Ok(())
    }

    async fn comment_exists(
        &self,
        issue_key: &str,
        contains: &[&str],
    ) -> Result<bool, DeliveryError> {
        let token = self.session_token().await?;
        let response = self
            .call("getComments", &[xml_escape(&token), xml_escape(issue_key)])
            .await?;
        Ok(self
            .comment_body_pattern
            .captures_iter(&response)
            .any(|caps| body_contains_all(&xml_unescape(&caps[1]), contains)))
    }

    async fn close(&self, issue_key: &str, auto_close_word: &str) -> Result<(), DeliveryError> {
        let token = self.session_token().await?;
        let response = self
            .call(
                "getAvailableActions",
                &[xml_escape(&token), xml_escape(issue_key)],
            )
            .await?;
        let word = auto_close_word.trim().to_ascii_lowercase();
        let action_id = self
            .available_actions(&response)
            .into_iter()
            .find(|(_, name)| name.to_ascii_lowercase().contains(&word))
            .map(|(id, _)| id)
            .unwrap_or_else(|| FALLBACK_CLOSE_ACTION_ID.to_string());

        self.call(
            "progressWorkflowAction",
            &[
                xml_escape(&token),
                xml_escape(issue_key),
                xml_escape(&action_id),
                String::new(),
            ],
        )
        .await?;
        Ok(())
    }

    async fn logout(&self) -> Result<(), DeliveryError> {
        let taken = self.token.lock().await.take();
        if let Some(token) = taken {
            self.call("logout", &[xml_escape(&token)]).await?;
        }
        Ok(())
    }
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::{xml_escape, xml_unescape};

    #[test]
    fn unit_xml_escape_round_trips() {
        let raw = r#"<a href="x">&'fix'</a>"#;
        assert_eq!(xml_unescape(&xml_escape(raw)), raw);
    }

    #[test]
    fn unit_xml_escape_escapes_ampersand_first() {
        assert_eq!(xml_escape("a&lt;"), "a&amp;lt;");
    }
}
