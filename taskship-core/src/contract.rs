//! # contract: seams to the external systems the pipeline depends on
//!
//! The pipeline never talks to the network or an LLM directly. It goes through
//! three traits:
//!
//! - [`Generator`]: the opaque artifact-generation step (brief + attachments → files).
//! - [`HostingApi`]: the code-hosting platform (owner probe, repository
//!   create/lookup, tree push, public pages).
//! - [`WebClient`]: plain HTTP used for attachment downloads, availability
//!   polling and evaluator notification.
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`; with the default
//! `test-export-mocks` feature the generated `Mock*` types are public so the
//! binary crate and integration tests can script collaborator behaviour.

use std::path::Path;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::task::TaskRequest;

/// Boxed error used where a collaborator's failure is opaque to the pipeline.
pub type ApiError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by the generation step.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generator not configured: {0}")]
    NotConfigured(String),
    #[error("generator returned no usable output: {0}")]
    InvalidOutput(String),
    #[error("generator request failed: {0}")]
    Upstream(String),
    #[error("io error while writing generated files: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces the project tree for a task into `project_dir`.
///
/// Implementations may read any file in `attachments_dir`; they must not
/// write outside `project_dir`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: &TaskRequest,
        project_dir: &Path,
        attachments_dir: &Path,
    ) -> Result<(), GenerateError>;
}

/// Account type of a repository owner on the hosting platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Organization,
    User,
}

/// A repository as reported by the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub html_url: String,
    pub default_branch: String,
}

impl Repository {
    /// Public static-hosting URL for this repository.
    pub fn pages_url(&self) -> String {
        format!(
            "https://{}.github.io/{}/",
            self.owner.to_lowercase(),
            self.name
        )
    }
}

/// One file of a tree to push, path relative to the project root with `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    pub path: String,
    pub content: Vec<u8>,
}

/// Error from the hosting platform, carrying the HTTP status when there was one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} failed{}: {message}", status_suffix(.status))]
pub struct HostingError {
    pub operation: String,
    pub status: Option<u16>,
    pub message: String,
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

impl HostingError {
    pub fn new(operation: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }
}

/// Code-hosting platform operations used by the publisher.
///
/// Credentials are held by the implementation; the publisher only decides
/// which calls to make and in which order.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// Whether `owner` is an organization or a personal account.
    async fn account_kind(&self, owner: &str) -> Result<AccountKind, HostingError>;

    /// Login of the account the credentials belong to.
    async fn viewer_login(&self) -> Result<String, HostingError>;

    /// Look up `owner/name`; `Ok(None)` when it does not exist.
    async fn find_repository(&self, owner: &str, name: &str)
        -> Result<Option<Repository>, HostingError>;

    /// Create a public repository with an initialised default branch.
    /// `organization` selects the organization variant of the call.
    async fn create_repository(
        &self,
        name: &str,
        organization: Option<String>,
    ) -> Result<Repository, HostingError>;

    /// Replace the default branch content with `files` as one new commit.
    /// Returns the new commit identifier.
    async fn push_tree(
        &self,
        repository: &Repository,
        files: Vec<TreeFile>,
        message: &str,
    ) -> Result<String, HostingError>;

    /// Turn on public static hosting from the default branch root.
    async fn enable_pages(&self, repository: &Repository) -> Result<(), HostingError>;
}

/// Minimal HTTP surface for downloads, polling and callbacks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait WebClient: Send + Sync {
    /// Download the body of `url`; non-success statuses are errors.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError>;

    /// GET `url` bypassing caches and return the status code.
    async fn probe(&self, url: &str) -> Result<u16, ApiError>;

    /// POST `body` as JSON to `url` and return the status code.
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, ApiError>;
}
