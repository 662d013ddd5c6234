//! Client side of `taskship submit`: post a task file to a running service.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use taskship_core::task::TaskRequest;

/// Tasks run generation, publish and polling inline, so the request may take minutes.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Read and validate `file`, POST it to `endpoint` and return the JSON reply.
/// Non-2xx replies are errors carrying the service's `detail`.
pub async fn submit(file: &Path, endpoint: &str) -> Result<serde_json::Value> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read task file {}", file.display()))?;
    let request: TaskRequest = serde_json::from_str(&raw)
        .with_context(|| format!("Task file {} is not a valid task request", file.display()))?;
    tracing::info!(task = %request.task, round = request.round, attachments = request.attachments.len(), "Task file parsed");

    let client = reqwest::Client::builder().timeout(SUBMIT_TIMEOUT).build()?;
    let response = client
        .post(endpoint)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to reach {endpoint}"))?;
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("Service reply is not JSON")?;

    if !status.is_success() {
        let detail = body
            .get("detail")
            .and_then(|d| d.as_str())
            .unwrap_or("no detail");
        tracing::error!(status = status.as_u16(), detail, "Task rejected");
        anyhow::bail!("Service answered {}: {}", status.as_u16(), detail);
    }
    Ok(body)
}
