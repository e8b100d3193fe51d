//! Comment template rendering and comment-body normalization.

use thiserror::Error;

use quay_core::format_unix_ms_rfc3339;

use crate::changeset::{Changeset, Repository};

/// Template variants the pipeline renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTemplate {
    /// Regular "this changeset references your issue" comment.
    Update,
    /// Comment accompanying an auto-close transition.
    AutoClose,
    /// Operator-triggered resubmission of a previously failed comment.
    Resend,
}

impl CommentTemplate {
    pub fn name(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::AutoClose => "autoclose",
            Self::Resend => "resend",
        }
    }
}

/// The failed attempt a resend refers to: who committed, when the delivery
/// was captured, and the comment body exactly as it was stored.
#[derive(Debug, Clone, Copy)]
pub struct OriginalAttempt<'a> {
    pub committer: &'a str,
    pub created_unix_ms: u64,
    pub body: &'a str,
}

/// Model handed to the renderer for one comment.
#[derive(Debug, Clone, Copy)]
pub struct CommentContext<'a> {
    pub repository: &'a Repository,
    pub changeset: &'a Changeset,
    pub base_url: &'a str,
    /// Required by [`CommentTemplate::AutoClose`].
    pub auto_close_word: Option<&'a str>,
    /// Required by [`CommentTemplate::Resend`].
    pub original: Option<OriginalAttempt<'a>>,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template '{template}' failed to render")]
    Io {
        template: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("template '{template}' is missing required field '{field}'")]
    MissingField {
        template: &'static str,
        field: &'static str,
    },
}

/// Narrow rendering seam so the pipeline stays decoupled from any particular
/// templating technology.
pub trait CommentRenderer: Send + Sync {
    fn render(
        &self,
        template: CommentTemplate,
        context: &CommentContext<'_>,
    ) -> Result<String, RenderError>;
}

/// Default renderer: plain text templates with the configured comment prefix
/// and wrap delimiters applied around the body.
pub struct BuiltinCommentRenderer {
    prefix: String,
    wrap: String,
}

impl BuiltinCommentRenderer {
    pub fn new(prefix: impl Into<String>, wrap: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            wrap: wrap.into(),
        }
    }

    fn frame(&self, body: String) -> String {
        let wrapped = if self.wrap.trim().is_empty() {
            body
        } else {
            let wrap = self.wrap.trim();
            format!("{wrap}\n{body}\n{wrap}")
        };
        if self.prefix.trim().is_empty() {
            wrapped
        } else {
            format!("{} {wrapped}", self.prefix.trim())
        }
    }
}

impl CommentRenderer for BuiltinCommentRenderer {
    fn render(
        &self,
        template: CommentTemplate,
        context: &CommentContext<'_>,
    ) -> Result<String, RenderError> {
        let changeset = context.changeset;
        let repository = context.repository.full_name();
        let body = match template {
            CommentTemplate::Update => format!(
                "Changeset {} by {} in {repository}:\n\n{}",
                changeset.id, changeset.author.name, changeset.description
            ),
            CommentTemplate::AutoClose => {
                let word =
                    context
                        .auto_close_word
                        .ok_or(RenderError::MissingField {
                            template: template.name(),
                            field: "auto_close_word",
                        })?;
                format!(
                    "Changeset {} by {} in {repository}:\n\n{}\n\nTransition triggered by auto-close word \"{word}\".",
                    changeset.id, changeset.author.name, changeset.description
                )
            }
            CommentTemplate::Resend => {
                let original = context.original.ok_or(RenderError::MissingField {
                    template: template.name(),
                    field: "original",
                })?;
                // The stored body was framed when it was first rendered, so a
                // resend embeds it verbatim and skips the frame.
                return Ok(format!(
                    "Resubmitted comment for changeset {} in {repository}, originally committed by {} at {}:\n\n{}",
                    changeset.id,
                    original.committer,
                    format_unix_ms_rfc3339(original.created_unix_ms),
                    original.body
                ));
            }
        };
        Ok(self.frame(body))
    }
}

/// Removes the hyperlink pointing back at the issue the comment is attached
/// to, leaving the bare key. The changeset description was rewritten with
/// links for every referenced issue; the one for the target issue itself is
/// redundant inside that issue's own comment thread.
pub fn strip_self_links(body: &str, base_url: &str, issue_key: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let link = format!(r#"<a href="{base}/browse/{issue_key}">{issue_key}</a>"#);
    body.replace(&link, issue_key)
}
