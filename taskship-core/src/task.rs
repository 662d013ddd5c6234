//! Request, callback and response models for a single task.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inbound task submission.
#[derive(Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Requester identity (an email address).
    pub email: String,
    /// Shared secret checked against the preloaded secret map.
    pub secret: String,
    /// Task identifier.
    pub task: String,
    pub round: i64,
    /// Idempotency nonce; carried through to the callback, never used for dedup.
    pub nonce: String,
    /// Free-text description of the artifact to generate.
    pub brief: String,
    #[serde(default)]
    pub checks: Vec<String>,
    /// Evaluator callback URL.
    pub evaluation_url: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequest")
            .field("email", &self.email)
            .field("secret", &"<elided>")
            .field("task", &self.task)
            .field("round", &self.round)
            .field("nonce", &self.nonce)
            .field("brief_len", &self.brief.len())
            .field("checks", &self.checks)
            .field("evaluation_url", &self.evaluation_url)
            .field("attachments", &self.attachments)
            .finish()
    }
}

/// Named attachment reference; `url` is either a `data:` URI or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource<'a> {
    /// Inline `data:` URI; `payload` is everything after the first comma.
    Inline { base64: bool, payload: &'a str },
    Remote(&'a str),
}

impl Attachment {
    pub fn source(&self) -> AttachmentSource<'_> {
        match self.url.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest.split_once(',').unwrap_or((rest, ""));
                AttachmentSource::Inline {
                    base64: meta.ends_with(";base64"),
                    payload,
                }
            }
            None => AttachmentSource::Remote(&self.url),
        }
    }
}

/// Identifiers produced by one successful publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

/// Body delivered to the evaluator callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyPayload {
    pub email: String,
    pub task: String,
    pub round: i64,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

impl NotifyPayload {
    pub fn new(request: &TaskRequest, published: &PublishResult) -> Self {
        Self {
            email: request.email.clone(),
            task: request.task.clone(),
            round: request.round,
            nonce: request.nonce.clone(),
            repo_url: published.repo_url.clone(),
            commit_sha: published.commit_sha.clone(),
            pages_url: published.pages_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyStatus {
    Notified,
    Failed,
}

/// Final answer to the caller of a successful pipeline run.
///
/// Polling and notification outcomes are carried as data here; neither ever
/// turns a published task into an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub status: String,
    pub state: crate::pipeline::PipelineState,
    pub task: String,
    pub round: i64,
    pub notify_status: NotifyStatus,
    pub pages_ready: bool,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}
