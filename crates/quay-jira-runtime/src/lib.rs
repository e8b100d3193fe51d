//! Runtime for the Quay commit-to-Jira bridge.
//!
//! Everything with IO lives here: the dual-protocol tracker handler (REST and
//! legacy SOAP), the issue action orchestrator, the handled-changeset marker,
//! the durable problem/resubmission queue, and the post-receive entry point
//! that ties the pipeline together.

pub mod handled_marker;
pub mod handler;
pub mod orchestrator;
pub mod post_receive;
pub mod problem_handler;
pub mod problem_queue;
pub mod resubmit;
pub mod rest_handler;
pub mod scanner;
pub mod soap_handler;

pub use handled_marker::HandledMarkerStore;
pub use handler::{
    build_handler, DeliveryError, HandlerFactory, IssueHandler, ProtocolHandlerFactory,
};
pub use orchestrator::IssueActionOrchestrator;
pub use post_receive::{ConfigResolver, PostReceiveHook};
pub use problem_handler::{IdGenerator, MailNotifier, ProblemHandler, UuidIdGenerator};
pub use problem_queue::{ProblemQueueError, ProblemQueueStore};
pub use resubmit::{ChangesetStore, ResubmitOutcome, ResubmitService};
pub use rest_handler::JiraRestHandler;
pub use soap_handler::JiraSoapHandler;
