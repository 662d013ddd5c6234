//! HTTP surface of the service.
//!
//! - `POST /api-endpoint`: run one task through the pipeline and answer with
//!   the final [`TaskResponse`](taskship_core::task::TaskResponse).
//! - `POST /eval-mock`: local stand-in for an evaluator callback target.
//! - `GET /health`: liveness.
//!
//! Pipeline failures map to `400` for a secret mismatch and `500` for
//! everything else, with a JSON body `{detail, state, stage}`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use taskship_core::contract::{Generator, HostingApi, WebClient};
use taskship_core::http::ReqwestWebClient;
use taskship_core::pipeline::{Pipeline, PipelineError, PipelineState};
use taskship_core::task::TaskRequest;
use tower_http::trace::TraceLayer;

use crate::generate::LlmGenerator;
use crate::github::GithubClient;
use crate::load_config::AppConfig;

const GITHUB_API_TIMEOUT: Duration = Duration::from_secs(20);

/// Status code for a pipeline failure.
pub fn error_status(error: &PipelineError) -> StatusCode {
    match error {
        PipelineError::Authentication => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure_body(detail: String, stage: PipelineState) -> serde_json::Value {
    json!({
        "detail": detail,
        "state": PipelineState::Failed,
        "stage": stage,
    })
}

async fn handle_task<G, H, W>(
    State(pipeline): State<Arc<Pipeline<G, H, W>>>,
    payload: Result<Json<TaskRequest>, JsonRejection>,
) -> Response
where
    G: Generator + 'static,
    H: HostingApi + 'static,
    W: WebClient + 'static,
{
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected malformed task request");
            return (
                StatusCode::BAD_REQUEST,
                Json(failure_body(rejection.body_text(), PipelineState::Received)),
            )
                .into_response();
        }
    };

    match pipeline.run(&request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => (
            error_status(&error),
            Json(failure_body(error.to_string(), error.stage())),
        )
            .into_response(),
    }
}

async fn eval_mock(Json(body): Json<serde_json::Value>) -> Json<serde_json::Value> {
    tracing::info!(
        task = ?body.get("task"),
        round = ?body.get("round"),
        pages_url = ?body.get("pages_url"),
        "[EVAL] Received evaluation callback"
    );
    Json(json!({ "status": "ok" }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Router over any pipeline wiring; tests pass mocked collaborators.
pub fn router<G, H, W>(pipeline: Arc<Pipeline<G, H, W>>) -> Router
where
    G: Generator + 'static,
    H: HostingApi + 'static,
    W: WebClient + 'static,
{
    Router::new()
        .route("/api-endpoint", post(handle_task::<G, H, W>))
        .route("/eval-mock", post(eval_mock))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

/// Wire production collaborators and serve until interrupted.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let settings = Arc::new(config.settings);
    settings.trace_loaded();

    let hosting = GithubClient::new(
        &config.github_api_url,
        settings.github_token.as_deref(),
        GITHUB_API_TIMEOUT,
    )?
    .with_branch(config.github_branch);
    let generator = LlmGenerator::new(config.llm)?;
    let web = ReqwestWebClient::new().map_err(|e| anyhow::anyhow!("HTTP client: {e}"))?;
    let pipeline = Arc::new(Pipeline::new(settings, generator, hosting, web));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!(addr = %config.bind, "Listening");

    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_requests_use_the_api_timeout() {
        assert_eq!(GITHUB_API_TIMEOUT, Duration::from_secs(20));
    }

    #[test]
    fn only_secret_mismatch_is_a_client_error() {
        assert_eq!(error_status(&PipelineError::Authentication), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_status(&PipelineError::Configuration("missing GITHUB_TOKEN".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
