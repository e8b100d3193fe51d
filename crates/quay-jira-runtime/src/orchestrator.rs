//! Per-issue action decision and delivery.
//!
//! Decides close vs update for each referenced issue, renders the comment,
//! and drives the tracker handler. Delivery failures never propagate to the
//! push path: they are captured into the problem queue and the push goes on.

use std::sync::Arc;

use quay_jira::{
    detect_auto_close_word, strip_self_links, Changeset, Comment, CommentContext, CommentRenderer,
    CommentTemplate, JiraConfiguration, PatternCache, Repository,
};

use crate::handler::{DeliveryError, IssueHandler};
use crate::problem_handler::ProblemHandler;

pub struct IssueActionOrchestrator {
    config: JiraConfiguration,
    handler: Arc<dyn IssueHandler>,
    renderer: Arc<dyn CommentRenderer>,
    patterns: Arc<PatternCache>,
    problems: Arc<ProblemHandler>,
}

impl IssueActionOrchestrator {
    pub fn new(
        config: JiraConfiguration,
        handler: Arc<dyn IssueHandler>,
        renderer: Arc<dyn CommentRenderer>,
        patterns: Arc<PatternCache>,
        problems: Arc<ProblemHandler>,
    ) -> Self {
        Self {
            config,
            handler,
            renderer,
            patterns,
            problems,
        }
    }

    /// Handles one (issue key, changeset) pair. The changeset description is
    /// expected to be the link-rewritten one produced by the scanner.
    pub async fn handle_issue(
        &self,
        repository: &Repository,
        changeset: &Changeset,
        issue_key: &str,
    ) {
        if self.config.auto_close_enabled() {
            let words = self.config.normalized_auto_close_words();
            match detect_auto_close_word(&changeset.description, &words, &self.patterns) {
                Ok(Some(matched)) => {
                    self.close_issue(repository, changeset, issue_key, &matched.word)
                        .await;
                    return;
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        issue_key,
                        %error,
                        "auto-close matching failed, falling back to an update comment"
                    );
                }
            }
        }
        self.update_issue(repository, changeset, issue_key).await;
    }

    async fn close_issue(
        &self,
        repository: &Repository,
        changeset: &Changeset,
        issue_key: &str,
        auto_close_word: &str,
    ) {
        let context = CommentContext {
            repository,
            changeset,
            base_url: self.config.trimmed_base_url(),
            auto_close_word: Some(auto_close_word),
            original: None,
        };
        let body = match self.renderer.render(CommentTemplate::AutoClose, &context) {
            Ok(body) => body,
            Err(render_error) => {
                // Nothing deliverable to retry, so no queue entry.
                tracing::warn!(issue_key, %render_error, "autoclose comment failed to render");
                return;
            }
        };
        let comment = Comment::new(body, self.config.role_level.clone());

        if let Err(error) = self.handler.close(issue_key, auto_close_word).await {
            self.report(repository, changeset, issue_key, &comment.body, error)
                .await;
            return;
        }
        if let Err(error) = self.handler.add_comment(issue_key, &comment).await {
            self.report(repository, changeset, issue_key, &comment.body, error)
                .await;
        }
    }

    async fn update_issue(&self, repository: &Repository, changeset: &Changeset, issue_key: &str) {
        // The posted body carries the description with the self-referential
        // link already stripped, so the dedup fragment must match that form.
        let dedup_fragment = strip_self_links(
            &changeset.description,
            self.config.trimmed_base_url(),
            issue_key,
        );
        match self
            .handler
            .comment_exists(issue_key, &[&changeset.id, &dedup_fragment])
            .await
        {
            Ok(true) => {
                tracing::debug!(
                    issue_key,
                    changeset_id = %changeset.id,
                    "equivalent comment already exists, skipping"
                );
                return;
            }
            Ok(false) => {}
            Err(error) => {
                let body = self
                    .render_update(repository, changeset)
                    .unwrap_or_else(|| changeset.description.clone());
                self.report(repository, changeset, issue_key, &body, error)
                    .await;
                return;
            }
        }

        let Some(body) = self.render_update(repository, changeset) else {
            return;
        };
        let comment = Comment::new(body, self.config.role_level.clone());
        if let Err(error) = self.handler.add_comment(issue_key, &comment).await {
            self.report(repository, changeset, issue_key, &comment.body, error)
                .await;
        }
    }

    fn render_update(&self, repository: &Repository, changeset: &Changeset) -> Option<String> {
        let context = CommentContext {
            repository,
            changeset,
            base_url: self.config.trimmed_base_url(),
            auto_close_word: None,
            original: None,
        };
        match self.renderer.render(CommentTemplate::Update, &context) {
            Ok(body) => Some(body),
            Err(render_error) => {
                tracing::warn!(
                    changeset_id = %changeset.id,
                    %render_error,
                    "update comment failed to render"
                );
                None
            }
        }
    }

    async fn report(
        &self,
        repository: &Repository,
        changeset: &Changeset,
        issue_key: &str,
        body: &str,
        error: DeliveryError,
    ) {
        self.problems
            .handle_delivery_failure(
                repository,
                changeset,
                issue_key,
                body,
                &error,
                self.config.error_mail.as_deref(),
            )
            .await;
    }
}
