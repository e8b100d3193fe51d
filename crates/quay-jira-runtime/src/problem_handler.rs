//! Capture of failed deliveries: persist first, notify best-effort.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use quay_core::current_unix_timestamp_ms;
use quay_jira::{Changeset, CommentData, Repository};

use crate::handler::DeliveryError;
use crate::problem_queue::ProblemQueueStore;

/// Side-effect sink for operator notifications. Failures are logged by the
/// caller and never propagate.
#[async_trait]
pub trait MailNotifier: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Collision-free id source for retry records.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

pub struct ProblemHandler {
    queue: Arc<ProblemQueueStore>,
    mail: Arc<dyn MailNotifier>,
    ids: Arc<dyn IdGenerator>,
}

impl ProblemHandler {
    pub fn new(
        queue: Arc<ProblemQueueStore>,
        mail: Arc<dyn MailNotifier>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self { queue, mail, ids }
    }

    /// Persists a retry record for the failed delivery, then attempts the
    /// notification mail. The record is durable before the mail is tried; a
    /// mail failure is logged and the record stays put.
    pub async fn handle_delivery_failure(
        &self,
        repository: &Repository,
        changeset: &Changeset,
        issue_key: &str,
        body: &str,
        error: &DeliveryError,
        error_mail: Option<&str>,
    ) {
        let data = CommentData {
            id: self.ids.next_id(),
            repository_id: repository.id.clone(),
            changeset_id: changeset.id.clone(),
            issue_key: issue_key.to_string(),
            committer: changeset.author.identity().to_string(),
            body: body.to_string(),
            created_unix_ms: current_unix_timestamp_ms(),
        };
        let record_id = data.id.clone();
        if let Err(store_error) = self.queue.store(data) {
            tracing::error!(
                issue_key,
                changeset_id = %changeset.id,
                %store_error,
                "failed to persist delivery-failure record"
            );
            return;
        }
        tracing::warn!(
            issue_key,
            changeset_id = %changeset.id,
            record_id,
            %error,
            "delivery failed, queued for resubmission"
        );

        let Some(recipient) = error_mail.filter(|mail| !mail.trim().is_empty()) else {
            return;
        };
        let subject = format!(
            "Delivery to issue {issue_key} failed for {}",
            repository.full_name()
        );
        let mail_body = format!(
            "Posting a comment for changeset {} to issue {issue_key} failed:\n\n{error}\n\n\
             The comment was stored for resubmission (record {record_id}).\n\n---\n{body}",
            changeset.id
        );
        if let Err(mail_error) = self.mail.send(recipient, &subject, &mail_body).await {
            tracing::warn!(
                issue_key,
                recipient,
                %mail_error,
                "failed to send delivery-failure notification"
            );
        }
    }
}
