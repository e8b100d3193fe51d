//! Pure domain logic for the Quay commit-to-Jira bridge.
//!
//! This crate has no IO: it provides the tracker configuration value object,
//! issue-key and auto-close pattern construction, the shared pattern cache,
//! changeset/comment value types, and comment template rendering consumed by
//! the runtime crate.

pub mod auto_close;
pub mod changeset;
pub mod comment;
pub mod config;
pub mod issue_keys;
pub mod pattern_cache;
pub mod render;

pub use auto_close::{auto_close_pattern, detect_auto_close_word, phrase_matches};
pub use changeset::{Changeset, Person, Repository};
pub use comment::{Comment, CommentData};
pub use config::{ApiProtocol, AutoCloseWord, JiraConfiguration};
pub use issue_keys::{extract_issue_keys, issue_key_pattern, rewrite_issue_links};
pub use pattern_cache::PatternCache;
pub use render::{
    strip_self_links, BuiltinCommentRenderer, CommentContext, CommentRenderer, CommentTemplate,
    OriginalAttempt, RenderError,
};
