//! Pipeline Orchestrator: one task request from receipt to final response.
//!
//! States run in a fixed order:
//! `received → materializing → generating → scanning → publishing → polling → notifying → done`.
//! Any [`PipelineError`] moves the run to `failed` and is returned at once.
//! Polling and notification never fail the run; their outcomes are carried in
//! the [`TaskResponse`].
//!
//! The per-task [`Workspace`] is owned by the run and released on every exit
//! path (unless artifact retention is configured).
//!
//! # Concurrency
//! A `Pipeline` holds only read-only settings and stateless clients, so one
//! instance can serve many concurrent runs; each run owns its own workspace.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::contract::{GenerateError, Generator, HostingApi, WebClient};
use crate::materialize::materialize;
use crate::naming::derive_repo_name;
use crate::notify::notify;
use crate::poll::await_available;
use crate::publish::{publish, PublishError};
use crate::scan::{scan_and_redact, ScanError};
use crate::task::{NotifyPayload, NotifyStatus, TaskRequest, TaskResponse};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Materializing,
    Generating,
    Scanning,
    Publishing,
    Polling,
    Notifying,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Materializing => "materializing",
            Self::Generating => "generating",
            Self::Scanning => "scanning",
            Self::Publishing => "publishing",
            Self::Polling => "polling",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal outcomes of a run. Each one aborts the remaining stages.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Server misconfigured: {0}")]
    Configuration(String),
    #[error("Secret mismatch")]
    Authentication,
    #[error("Workspace error: {0}")]
    Workspace(#[from] std::io::Error),
    #[error("Generation error: {0}")]
    Generation(#[from] GenerateError),
    #[error("Secret scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("GitHub error: {0}")]
    Publish(#[from] PublishError),
}

impl PipelineError {
    /// State the run was in when it failed.
    pub fn stage(&self) -> PipelineState {
        match self {
            Self::Configuration(_) | Self::Authentication => PipelineState::Received,
            Self::Workspace(_) => PipelineState::Materializing,
            Self::Generation(_) => PipelineState::Generating,
            Self::Scan(_) => PipelineState::Scanning,
            Self::Publish(_) => PipelineState::Publishing,
        }
    }
}

pub struct Pipeline<G, H, W> {
    settings: Arc<Settings>,
    generator: G,
    hosting: H,
    web: W,
}

impl<G, H, W> Pipeline<G, H, W>
where
    G: Generator,
    H: HostingApi,
    W: WebClient,
{
    pub fn new(settings: Arc<Settings>, generator: G, hosting: H, web: W) -> Self {
        Self {
            settings,
            generator,
            hosting,
            web,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one task to completion or fatal failure.
    pub async fn run(&self, request: &TaskRequest) -> Result<TaskResponse, PipelineError> {
        let span = info_span!(
            "task",
            request_id = %Uuid::new_v4(),
            email = %request.email,
            task = %request.task,
            round = request.round,
        );
        async move {
            let result = self.run_stages(request).await;
            match &result {
                Ok(response) => info!(
                    state = %PipelineState::Done,
                    notify_status = ?response.notify_status,
                    pages_ready = response.pages_ready,
                    "[PIPELINE] task finished"
                ),
                Err(e) => error!(
                    state = %PipelineState::Failed,
                    stage = %e.stage(),
                    error = %e,
                    "[PIPELINE] task failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }

    fn enter(state: PipelineState) {
        info!(state = %state, "[PIPELINE] entering state");
    }

    async fn run_stages(&self, request: &TaskRequest) -> Result<TaskResponse, PipelineError> {
        Self::enter(PipelineState::Received);
        if !self.settings.verify_secret(&request.email, &request.secret) {
            return Err(PipelineError::Authentication);
        }
        if self.settings.github_token.as_deref().map_or(true, str::is_empty) {
            return Err(PipelineError::Configuration(
                "missing GITHUB_TOKEN".to_string(),
            ));
        }

        Self::enter(PipelineState::Materializing);
        let workspace = Workspace::create(
            self.settings.workspace_root.as_deref(),
            &request.task,
            self.settings.keep_artifacts,
        )?;
        let report = materialize(
            &self.web,
            &request.attachments,
            workspace.attachments_dir(),
            self.settings.attachment_timeout,
        )
        .await;
        info!(
            saved = report.saved.len(),
            skipped = report.skipped.len(),
            "[PIPELINE] attachments materialized"
        );

        Self::enter(PipelineState::Generating);
        self.generator
            .generate(request, workspace.project_dir(), workspace.attachments_dir())
            .await?;

        Self::enter(PipelineState::Scanning);
        let project_dir = workspace.project_dir().to_path_buf();
        tokio::task::spawn_blocking(move || scan_and_redact(&project_dir))
            .await
            .map_err(|e| ScanError::Interrupted(e.to_string()))??;

        Self::enter(PipelineState::Publishing);
        let repo_name = derive_repo_name(&request.task, &request.email);
        info!(repo = %repo_name, "[PIPELINE] derived repository name");
        let published = publish(
            &self.hosting,
            workspace.project_dir(),
            &repo_name,
            &self.settings.github_owner,
        )
        .await?;

        Self::enter(PipelineState::Polling);
        let pages_ready =
            await_available(&self.web, &published.pages_url, &self.settings.poll).await;

        Self::enter(PipelineState::Notifying);
        let payload = NotifyPayload::new(request, &published);
        let notified = notify(
            &self.web,
            &request.evaluation_url,
            &payload,
            &self.settings.notify,
        )
        .await;

        drop(workspace);

        Ok(TaskResponse {
            status: "accepted".to_string(),
            state: PipelineState::Done,
            task: request.task.clone(),
            round: request.round,
            notify_status: if notified {
                NotifyStatus::Notified
            } else {
                NotifyStatus::Failed
            },
            pages_ready,
            repo_url: published.repo_url,
            commit_sha: published.commit_sha,
            pages_url: published.pages_url,
        })
    }
}
