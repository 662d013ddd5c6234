//! Repository Publisher.
//!
//! Create-or-update of the derived repository followed by a full-tree push
//! as a single commit, then a best-effort pages enablement. There is no retry
//! here: hosting failures are usually permission or quota problems that
//! waiting will not fix.

use std::path::Path;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::contract::{AccountKind, HostingApi, HostingError, TreeFile};
use crate::task::PublishResult;

pub const COMMIT_MESSAGE: &str = "Deploy generated site";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to read project tree: {0}")]
    Tree(String),
    #[error("project tree is empty, nothing to publish")]
    EmptyTree,
    #[error(transparent)]
    Hosting(#[from] HostingError),
}

impl PublishError {
    /// HTTP status of the underlying hosting failure, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            PublishError::Hosting(e) => e.status,
            _ => None,
        }
    }
}

/// Every regular file under `project_dir`, sorted by relative path.
pub fn collect_tree(project_dir: &Path) -> Result<Vec<TreeFile>, PublishError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(project_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| PublishError::Tree(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(project_dir)
            .map_err(|e| PublishError::Tree(e.to_string()))?;
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = std::fs::read(entry.path())
            .map_err(|e| PublishError::Tree(format!("{}: {e}", entry.path().display())))?;
        files.push(TreeFile { path, content });
    }
    Ok(files)
}

/// Publish `project_dir` to `repo_name`, preferring `owner_hint` when it is an organization.
pub async fn publish<H>(
    api: &H,
    project_dir: &Path,
    repo_name: &str,
    owner_hint: &str,
) -> Result<PublishResult, PublishError>
where
    H: HostingApi + ?Sized,
{
    let owner_hint = owner_hint.trim();
    let organization = if owner_hint.is_empty() {
        None
    } else {
        match api.account_kind(owner_hint).await? {
            AccountKind::Organization => Some(owner_hint.to_string()),
            AccountKind::User => None,
        }
    };
    let owner = match &organization {
        Some(org) => org.clone(),
        None => api.viewer_login().await?,
    };
    info!(
        owner = %owner,
        organization = organization.is_some(),
        repo = repo_name,
        "[PUBLISH] resolved repository owner"
    );

    let files = collect_tree(project_dir)?;
    if files.is_empty() {
        return Err(PublishError::EmptyTree);
    }

    let repository = match api.find_repository(&owner, repo_name).await? {
        Some(existing) => {
            info!(repo = %existing.html_url, "[PUBLISH] repository exists, replacing content");
            existing
        }
        None => {
            let created = api.create_repository(repo_name, organization).await?;
            info!(repo = %created.html_url, "[PUBLISH] repository created");
            created
        }
    };

    let file_count = files.len();
    let commit_sha = api.push_tree(&repository, files, COMMIT_MESSAGE).await?;
    info!(commit = %commit_sha, files = file_count, "[PUBLISH] tree pushed");

    if let Err(e) = api.enable_pages(&repository).await {
        warn!(error = %e, repo = %repository.html_url, "[PUBLISH] enabling pages failed, continuing");
    }

    Ok(PublishResult {
        repo_url: repository.html_url.clone(),
        commit_sha,
        pages_url: repository.pages_url(),
    })
}
