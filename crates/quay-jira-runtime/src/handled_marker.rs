//! Durable idempotence marker for processed changesets.
//!
//! Keyed by `repository_id:changeset_id`; consulted before re-processing so a
//! push event delivered twice does not produce duplicate comments.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quay_core::write_text_atomic;

const MARKER_STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarkerState {
    schema_version: u32,
    #[serde(default)]
    handled: BTreeSet<String>,
}

impl Default for MarkerState {
    fn default() -> Self {
        Self {
            schema_version: MARKER_STATE_SCHEMA_VERSION,
            handled: BTreeSet::new(),
        }
    }
}

pub struct HandledMarkerStore {
    path: PathBuf,
    state: Mutex<MarkerState>,
}

fn marker_key(repository_id: &str, changeset_id: &str) -> String {
    format!("{repository_id}:{changeset_id}")
}

impl HandledMarkerStore {
    /// Loads the persisted marker set, starting fresh when the file is
    /// missing, unreadable, or from another schema version.
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read marker file {}", path.display()))?;
            match serde_json::from_str::<MarkerState>(&raw) {
                Ok(state) if state.schema_version == MARKER_STATE_SCHEMA_VERSION => state,
                Ok(state) => {
                    tracing::warn!(
                        expected = MARKER_STATE_SCHEMA_VERSION,
                        found = state.schema_version,
                        "unsupported handled-marker schema, starting fresh"
                    );
                    MarkerState::default()
                }
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        %error,
                        "failed to parse handled-marker file, starting fresh"
                    );
                    MarkerState::default()
                }
            }
        } else {
            MarkerState::default()
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn is_handled(&self, repository_id: &str, changeset_id: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .handled
            .contains(&marker_key(repository_id, changeset_id))
    }

    /// Marks the pair handled. Returns false without touching the file when
    /// the pair was already marked, so re-entrant processing never
    /// double-writes. The in-memory set only advances once the file write
    /// succeeds.
    pub fn mark_handled(&self, repository_id: &str, changeset_id: &str) -> Result<bool> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let key = marker_key(repository_id, changeset_id);
        if state.handled.contains(&key) {
            return Ok(false);
        }
        let mut candidate = state.clone();
        candidate.handled.insert(key);
        save(&self.path, &candidate)?;
        *state = candidate;
        Ok(true)
    }
}

fn save(path: &std::path::Path, state: &MarkerState) -> Result<()> {
    let mut payload =
        serde_json::to_string_pretty(state).context("failed to serialize marker state")?;
    payload.push('\n');
    write_text_atomic(path, &payload)
        .with_context(|| format!("failed to write marker file {}", path.display()))
}
