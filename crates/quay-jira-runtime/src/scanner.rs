//! Changeset scanning: key extraction, link rewriting, and the idempotence
//! guard around per-key orchestration.

use std::sync::Arc;

use anyhow::Result;

use quay_jira::{
    extract_issue_keys, issue_key_pattern, rewrite_issue_links, Changeset, JiraConfiguration,
    PatternCache, Repository,
};

use crate::handled_marker::HandledMarkerStore;
use crate::orchestrator::IssueActionOrchestrator;

pub struct ChangesetScanner {
    config: JiraConfiguration,
    patterns: Arc<PatternCache>,
    marker: Arc<HandledMarkerStore>,
    orchestrator: IssueActionOrchestrator,
}

impl ChangesetScanner {
    pub fn new(
        config: JiraConfiguration,
        patterns: Arc<PatternCache>,
        marker: Arc<HandledMarkerStore>,
        orchestrator: IssueActionOrchestrator,
    ) -> Self {
        Self {
            config,
            patterns,
            marker,
            orchestrator,
        }
    }

    /// Processes one changeset: extracts referenced issue keys in first
    /// occurrence order, rewrites the description with tracker hyperlinks,
    /// and invokes the orchestrator once per distinct key, unless the
    /// (repository, changeset) pair was already handled. The pair is marked
    /// handled afterwards either way.
    pub async fn process(&self, repository: &Repository, changeset: &Changeset) -> Result<()> {
        if self.marker.is_handled(&repository.id, &changeset.id) {
            tracing::debug!(
                repository_id = %repository.id,
                changeset_id = %changeset.id,
                "changeset already handled, skipping"
            );
            return Ok(());
        }

        let filter = self.config.project_filter.clone();
        let pattern = self
            .patterns
            .get_or_compile(&format!("issue-keys:{filter}"), || {
                issue_key_pattern(&filter)
            })?;

        let keys = extract_issue_keys(&pattern, &changeset.description);
        if !keys.is_empty() {
            let linked = Changeset {
                description: rewrite_issue_links(
                    &pattern,
                    &changeset.description,
                    self.config.trimmed_base_url(),
                ),
                ..changeset.clone()
            };
            for key in &keys {
                self.orchestrator
                    .handle_issue(repository, &linked, key)
                    .await;
            }
        }

        // mark_handled no-ops when a concurrent delivery of the same push
        // event won the race.
        self.marker.mark_handled(&repository.id, &changeset.id)?;
        Ok(())
    }
}
