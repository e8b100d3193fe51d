//! Durable queue of failed delivery attempts.
//!
//! Records are independent; operations are serialized per store behind a
//! mutex and persisted with an atomic file replace, but no cross-record
//! transaction exists or is needed.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quay_core::write_text_atomic;
use quay_jira::CommentData;

const QUEUE_STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ProblemQueueError {
    /// The id is unknown. Distinct from "nothing to do": resubmitting or
    /// inspecting a missing record is a caller error.
    #[error("queued comment '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to persist queue state: {0}")]
    Persist(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueState {
    schema_version: u32,
    #[serde(default)]
    comments: Vec<CommentData>,
}

impl Default for QueueState {
    fn default() -> Self {
        Self {
            schema_version: QUEUE_STATE_SCHEMA_VERSION,
            comments: Vec::new(),
        }
    }
}

pub struct ProblemQueueStore {
    path: PathBuf,
    state: Mutex<QueueState>,
}

impl ProblemQueueStore {
    pub fn load(path: PathBuf) -> Result<Self, ProblemQueueError> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            match serde_json::from_str::<QueueState>(&raw) {
                Ok(state) if state.schema_version == QUEUE_STATE_SCHEMA_VERSION => state,
                Ok(state) => {
                    tracing::warn!(
                        expected = QUEUE_STATE_SCHEMA_VERSION,
                        found = state.schema_version,
                        "unsupported problem-queue schema, starting fresh"
                    );
                    QueueState::default()
                }
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        %error,
                        "failed to parse problem-queue file, starting fresh"
                    );
                    QueueState::default()
                }
            }
        } else {
            QueueState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Appends a record. The in-memory state only advances once the file
    /// write succeeds, so memory and disk never diverge.
    pub fn store(&self, data: CommentData) -> Result<(), ProblemQueueError> {
        let mut state = self.lock_state();
        let mut candidate = state.clone();
        candidate.comments.push(data);
        self.save(&candidate)?;
        *state = candidate;
        Ok(())
    }

    /// All queued records, oldest first.
    pub fn all(&self) -> Vec<CommentData> {
        let state = self.lock_state();
        let mut comments = state.comments.clone();
        comments.sort();
        comments
    }

    /// Queued records for one repository, oldest first.
    pub fn all_by_repository(&self, repository_id: &str) -> Vec<CommentData> {
        let state = self.lock_state();
        let mut comments: Vec<CommentData> = state
            .comments
            .iter()
            .filter(|data| data.repository_id == repository_id)
            .cloned()
            .collect();
        comments.sort();
        comments
    }

    pub fn get(&self, id: &str) -> Result<CommentData, ProblemQueueError> {
        self.lock_state()
            .comments
            .iter()
            .find(|data| data.id == id)
            .cloned()
            .ok_or_else(|| ProblemQueueError::NotFound(id.to_string()))
    }

    /// Removes the record. Removing an unknown id is a no-op, not an error;
    /// a failed write leaves the record in place.
    pub fn delete(&self, id: &str) -> Result<bool, ProblemQueueError> {
        let mut state = self.lock_state();
        let mut candidate = state.clone();
        candidate.comments.retain(|data| data.id != id);
        if candidate.comments.len() == state.comments.len() {
            return Ok(false);
        }
        self.save(&candidate)?;
        *state = candidate;
        Ok(true)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save(&self, state: &QueueState) -> Result<(), ProblemQueueError> {
        let mut payload = serde_json::to_string_pretty(state)?;
        payload.push('\n');
        write_text_atomic(&self.path, &payload)
            .map_err(|error| ProblemQueueError::Persist(format!("{error:#}")))
    }
}

#[cfg(test)]
mod tests {
    use quay_jira::CommentData;

    use super::{ProblemQueueError, ProblemQueueStore};

    fn record(id: &str, repository_id: &str, created_unix_ms: u64) -> CommentData {
        CommentData {
            id: id.to_string(),
            repository_id: repository_id.to_string(),
            changeset_id: "c1".to_string(),
            issue_key: "TST-1".to_string(),
            committer: "ada@example.com".to_string(),
            body: "body".to_string(),
            created_unix_ms,
        }
    }

    fn fresh_store(tempdir: &tempfile::TempDir) -> ProblemQueueStore {
        ProblemQueueStore::load(tempdir.path().join("queue.json")).expect("load")
    }

    #[test]
    fn functional_listing_is_oldest_first() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = fresh_store(&tempdir);
        store.store(record("b", "r1", 300)).expect("store b");
        store.store(record("a", "r1", 100)).expect("store a");
        store.store(record("c", "r2", 200)).expect("store c");

        let ids: Vec<String> = store.all().into_iter().map(|data| data.id).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);

        let by_repo: Vec<String> = store
            .all_by_repository("r1")
            .into_iter()
            .map(|data| data.id)
            .collect();
        assert_eq!(by_repo, vec!["a", "b"]);
    }

    #[test]
    fn functional_records_survive_a_reload() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("queue.json");
        {
            let store = ProblemQueueStore::load(path.clone()).expect("load");
            store.store(record("a", "r1", 100)).expect("store");
        }
        let reloaded = ProblemQueueStore::load(path).expect("reload");
        assert_eq!(reloaded.get("a").expect("get").created_unix_ms, 100);
    }

    #[test]
    fn unit_delete_is_idempotent() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = fresh_store(&tempdir);
        store.store(record("a", "r1", 100)).expect("store");
        assert!(store.delete("a").expect("delete"));
        assert!(!store.delete("a").expect("delete again"));
        assert!(!store.delete("never-existed").expect("delete unknown"));
    }

    #[test]
    fn regression_failed_save_leaves_memory_unchanged() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let blocker = tempdir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").expect("seed");

        // The queue path sits below a regular file, so every save fails.
        let store = ProblemQueueStore::load(blocker.join("queue.json")).expect("load");
        assert!(store.store(record("a", "r1", 100)).is_err());
        assert!(store.all().is_empty());
        assert!(matches!(
            store.get("a"),
            Err(ProblemQueueError::NotFound(id)) if id == "a"
        ));
    }

    #[test]
    fn unit_get_unknown_id_is_not_found() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = fresh_store(&tempdir);
        assert!(matches!(
            store.get("missing"),
            Err(ProblemQueueError::NotFound(id)) if id == "missing"
        ));
    }
}
