//! Comment value objects: the transient per-delivery comment and the durable
//! retry record written to the problem queue.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use quay_core::current_unix_timestamp_ms;

/// Transient comment built fresh for one delivery attempt. Never persisted
/// directly; failed deliveries are captured as [`CommentData`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub body: String,
    pub created_unix_ms: u64,
    pub role_level: Option<String>,
}

impl Comment {
    pub fn new(body: String, role_level: Option<String>) -> Self {
        Self {
            body,
            created_unix_ms: current_unix_timestamp_ms(),
            role_level,
        }
    }
}

/// Durable retry record for a failed delivery.
///
/// The layout must round-trip exactly through storage: resubmission rebuilds
/// the delivery from these fields alone (plus a freshly resolved
/// configuration and a re-fetched changeset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentData {
    pub id: String,
    pub repository_id: String,
    pub changeset_id: String,
    pub issue_key: String,
    pub committer: String,
    pub body: String,
    pub created_unix_ms: u64,
}

impl Ord for CommentData {
    /// Natural order is oldest first so bulk resubmission is deterministic;
    /// the id breaks ties between records created in the same millisecond.
    fn cmp(&self, other: &Self) -> Ordering {
        self.created_unix_ms
            .cmp(&other.created_unix_ms)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for CommentData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::CommentData;

    fn record(id: &str, created_unix_ms: u64) -> CommentData {
        CommentData {
            id: id.to_string(),
            repository_id: "r1".to_string(),
            changeset_id: "c1".to_string(),
            issue_key: "TST-1".to_string(),
            committer: "ada@example.com".to_string(),
            body: "body".to_string(),
            created_unix_ms,
        }
    }

    #[test]
    fn unit_natural_order_is_oldest_first_with_id_tiebreak() {
        let mut records = vec![record("b", 200), record("z", 100), record("a", 200)];
        records.sort();
        let ids: Vec<&str> = records.iter().map(|data| data.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "b"]);
    }

    #[test]
    fn functional_comment_data_round_trips_through_json() {
        let original = record("id-1", 1_700_000_000_123);
        let encoded = serde_json::to_string(&original).expect("encode");
        let decoded: CommentData = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, original);
    }
}
