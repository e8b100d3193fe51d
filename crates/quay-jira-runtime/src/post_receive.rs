//! The per-push entry point.
//!
//! Runs synchronously inside the push-accepting request path: resolves the
//! repository's tracker configuration, drives the scanner over each changeset
//! in hook order, and logs out of the tracker session. Nothing here may fail
//! the push: every failure is logged or queued.

use std::sync::Arc;

use async_trait::async_trait;

use quay_jira::{BuiltinCommentRenderer, Changeset, JiraConfiguration, PatternCache, Repository};

use crate::handled_marker::HandledMarkerStore;
use crate::handler::HandlerFactory;
use crate::orchestrator::IssueActionOrchestrator;
use crate::problem_handler::ProblemHandler;
use crate::scanner::ChangesetScanner;

/// Configuration lookup seam. Repository-level configuration falling back to
/// the global one is the resolver's concern; `None` (or an invalid value)
/// turns the pipeline into a no-op for that repository.
#[async_trait]
pub trait ConfigResolver: Send + Sync {
    async fn resolve(&self, repository: &Repository) -> Option<JiraConfiguration>;
}

pub struct PostReceiveHook {
    resolver: Arc<dyn ConfigResolver>,
    factory: Arc<dyn HandlerFactory>,
    patterns: Arc<PatternCache>,
    marker: Arc<HandledMarkerStore>,
    problems: Arc<ProblemHandler>,
}

impl PostReceiveHook {
    pub fn new(
        resolver: Arc<dyn ConfigResolver>,
        factory: Arc<dyn HandlerFactory>,
        patterns: Arc<PatternCache>,
        marker: Arc<HandledMarkerStore>,
        problems: Arc<ProblemHandler>,
    ) -> Self {
        Self {
            resolver,
            factory,
            patterns,
            marker,
            problems,
        }
    }

    /// Processes one push. Changesets are handled in the order supplied by
    /// the hook event; a missing or disabled configuration is a silent no-op.
    pub async fn on_post_receive(&self, repository: &Repository, changesets: &[Changeset]) {
        let Some(config) = self.resolver.resolve(repository).await else {
            tracing::debug!(
                repository = %repository.full_name(),
                "no tracker configuration resolved, skipping push"
            );
            return;
        };
        if !config.update_enabled() {
            tracing::debug!(
                repository = %repository.full_name(),
                "tracker updates disabled or configuration invalid, skipping push"
            );
            return;
        }

        let handler = match self.factory.build(&config) {
            Ok(handler) => handler,
            Err(error) => {
                tracing::warn!(
                    repository = %repository.full_name(),
                    %error,
                    "failed to build tracker handler, skipping push"
                );
                return;
            }
        };

        let renderer = Arc::new(BuiltinCommentRenderer::new(
            config.comment_prefix.clone(),
            config.comment_wrap.clone(),
        ));
        let orchestrator = IssueActionOrchestrator::new(
            config.clone(),
            Arc::clone(&handler),
            renderer,
            Arc::clone(&self.patterns),
            Arc::clone(&self.problems),
        );
        let scanner = ChangesetScanner::new(
            config,
            Arc::clone(&self.patterns),
            Arc::clone(&self.marker),
            orchestrator,
        );

        for changeset in changesets {
            if let Err(error) = scanner.process(repository, changeset).await {
                tracing::warn!(
                    repository = %repository.full_name(),
                    changeset_id = %changeset.id,
                    %error,
                    "changeset processing failed"
                );
            }
        }

        if let Err(error) = handler.logout().await {
            tracing::warn!(
                repository = %repository.full_name(),
                %error,
                "tracker logout failed"
            );
        }
    }
}
