//! Operator-driven resubmission of queued delivery failures.
//!
//! Each targeted record is delivered at most once more: the context is
//! rebuilt from a freshly resolved configuration and a re-fetched changeset,
//! the stored body is wrapped in the resend template, and the record is
//! deleted whether or not the retry succeeds. A resubmission that fails again
//! must be re-triggered manually; nothing loops in the background.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use quay_jira::{
    BuiltinCommentRenderer, Changeset, Comment, CommentContext, CommentData, CommentRenderer,
    CommentTemplate, OriginalAttempt, Repository,
};

use crate::handler::HandlerFactory;
use crate::post_receive::ConfigResolver;
use crate::problem_queue::{ProblemQueueError, ProblemQueueStore};

/// Lookup seam into the SCM so resubmission can reconstruct its context.
#[async_trait]
pub trait ChangesetStore: Send + Sync {
    async fn repository_by_id(&self, repository_id: &str) -> Result<Option<Repository>>;
    async fn changeset_by_id(
        &self,
        repository_id: &str,
        changeset_id: &str,
    ) -> Result<Option<Changeset>>;
}

/// Result of one resubmission attempt. The record is gone either way.
#[derive(Debug, Clone)]
pub struct ResubmitOutcome {
    pub comment_id: String,
    pub issue_key: String,
    pub delivered: bool,
    pub error: Option<String>,
}

pub struct ResubmitService {
    queue: Arc<ProblemQueueStore>,
    resolver: Arc<dyn ConfigResolver>,
    changesets: Arc<dyn ChangesetStore>,
    factory: Arc<dyn HandlerFactory>,
}

impl ResubmitService {
    pub fn new(
        queue: Arc<ProblemQueueStore>,
        resolver: Arc<dyn ConfigResolver>,
        changesets: Arc<dyn ChangesetStore>,
        factory: Arc<dyn HandlerFactory>,
    ) -> Self {
        Self {
            queue,
            resolver,
            changesets,
            factory,
        }
    }

    /// Resubmits one record by id. An unknown id is an error; a failed
    /// delivery is reported in the outcome.
    pub async fn resubmit(&self, id: &str) -> Result<ResubmitOutcome, ProblemQueueError> {
        let data = self.queue.get(id)?;
        let outcome = self.deliver(&data).await;
        self.queue.delete(&data.id)?;
        Ok(outcome)
    }

    /// Resubmits every queued record, oldest first.
    pub async fn resubmit_all(&self) -> Result<Vec<ResubmitOutcome>, ProblemQueueError> {
        self.resubmit_batch(self.queue.all()).await
    }

    /// Resubmits every queued record for one repository, oldest first.
    pub async fn resubmit_all_from_repository(
        &self,
        repository_id: &str,
    ) -> Result<Vec<ResubmitOutcome>, ProblemQueueError> {
        self.resubmit_batch(self.queue.all_by_repository(repository_id))
            .await
    }

    async fn resubmit_batch(
        &self,
        records: Vec<CommentData>,
    ) -> Result<Vec<ResubmitOutcome>, ProblemQueueError> {
        let mut outcomes = Vec::with_capacity(records.len());
        for data in records {
            let outcome = self.deliver(&data).await;
            self.queue.delete(&data.id)?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    async fn deliver(&self, data: &CommentData) -> ResubmitOutcome {
        let result = self.try_deliver(data).await;
        match &result {
            Ok(()) => tracing::info!(
                comment_id = %data.id,
                issue_key = %data.issue_key,
                "resubmitted queued comment"
            ),
            Err(error) => tracing::warn!(
                comment_id = %data.id,
                issue_key = %data.issue_key,
                error,
                "resubmission failed, record removed anyway"
            ),
        }
        ResubmitOutcome {
            comment_id: data.id.clone(),
            issue_key: data.issue_key.clone(),
            delivered: result.is_ok(),
            error: result.err(),
        }
    }

    async fn try_deliver(&self, data: &CommentData) -> Result<(), String> {
        let repository = self
            .changesets
            .repository_by_id(&data.repository_id)
            .await
            .map_err(|error| format!("repository lookup failed: {error:#}"))?
            .ok_or_else(|| format!("repository '{}' no longer exists", data.repository_id))?;

        let config = self
            .resolver
            .resolve(&repository)
            .await
            .filter(|config| config.is_valid())
            .ok_or("no valid tracker configuration resolved")?;

        let changeset = self
            .changesets
            .changeset_by_id(&data.repository_id, &data.changeset_id)
            .await
            .map_err(|error| format!("changeset lookup failed: {error:#}"))?
            .ok_or_else(|| format!("changeset '{}' no longer exists", data.changeset_id))?;

        let renderer =
            BuiltinCommentRenderer::new(config.comment_prefix.clone(), config.comment_wrap.clone());
        let context = CommentContext {
            repository: &repository,
            changeset: &changeset,
            base_url: config.trimmed_base_url(),
            auto_close_word: None,
            original: Some(OriginalAttempt {
                committer: &data.committer,
                created_unix_ms: data.created_unix_ms,
                body: &data.body,
            }),
        };
        let body = renderer
            .render(CommentTemplate::Resend, &context)
            .map_err(|error| format!("resend comment failed to render: {error}"))?;

        let handler = self
            .factory
            .build(&config)
            .map_err(|error| format!("failed to build tracker handler: {error:#}"))?;
        let comment = Comment::new(body, config.role_level.clone());
        let delivery = handler
            .add_comment(&data.issue_key, &comment)
            .await
            .map_err(|error| error.to_string());
        if let Err(error) = handler.logout().await {
            tracing::warn!(issue_key = %data.issue_key, %error, "tracker logout failed");
        }
        delivery
    }
}
