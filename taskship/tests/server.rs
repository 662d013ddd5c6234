use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use taskship::server::router;
use taskship_core::config::Settings;
use taskship_core::contract::{MockGenerator, MockHostingApi, MockWebClient, Repository};
use taskship_core::pipeline::Pipeline;
use taskship_core::retry::RetryPolicy;
use tempfile::TempDir;

fn settings(root: &TempDir) -> Settings {
    Settings {
        github_token: Some("test-token".into()),
        secret_map: HashMap::from([("student@example.com".to_string(), "right".to_string())]),
        workspace_root: Some(root.path().to_path_buf()),
        poll: RetryPolicy::new(2, Duration::from_millis(1), 1),
        notify: RetryPolicy::new(2, Duration::from_millis(1), 1),
        ..Settings::default()
    }
}

fn task_body(secret: &str) -> Value {
    json!({
        "email": "student@example.com",
        "secret": secret,
        "task": "captcha-solver",
        "round": 1,
        "nonce": "n-1",
        "brief": "Solve captchas",
        "checks": [],
        "evaluation_url": "http://eval.local/notify",
        "attachments": []
    })
}

fn happy_mocks() -> (MockGenerator, MockHostingApi, MockWebClient) {
    let mut generator = MockGenerator::new();
    generator.expect_generate().returning(|_, project_dir, _| {
        fs::write(project_dir.join("index.html"), "<h1>ok</h1>")?;
        Ok(())
    });

    let mut hosting = MockHostingApi::new();
    hosting
        .expect_viewer_login()
        .returning(|| Ok("Student".into()));
    hosting.expect_find_repository().returning(|_, _| Ok(None));
    hosting.expect_create_repository().returning(|name, _| {
        Ok(Repository {
            owner: "Student".into(),
            name: name.into(),
            html_url: format!("https://github.com/Student/{name}"),
            default_branch: "main".into(),
        })
    });
    hosting
        .expect_push_tree()
        .returning(|_, _, _| Ok("feedbeef".into()));
    hosting.expect_enable_pages().returning(|_| Ok(()));

    let mut web = MockWebClient::new();
    web.expect_probe().returning(|_| Ok(200));
    web.expect_post_json().returning(|_, _| Ok(200));

    (generator, hosting, web)
}

async fn spawn(
    settings: Settings,
    mocks: (MockGenerator, MockHostingApi, MockWebClient),
) -> String {
    let (generator, hosting, web) = mocks;
    let pipeline = Arc::new(Pipeline::new(Arc::new(settings), generator, hosting, web));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(pipeline)).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn health_and_eval_mock_answer_ok() {
    let root = tempfile::tempdir().unwrap();
    let base = spawn(settings(&root), happy_mocks()).await;
    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let eval = client
        .post(format!("{base}/eval-mock"))
        .json(&json!({"task": "t", "round": 1, "pages_url": "https://x.github.io/t/"}))
        .send()
        .await
        .unwrap();
    assert_eq!(eval.status(), 200);
    let body: Value = eval.json().await.unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn successful_task_returns_final_response() {
    let root = tempfile::tempdir().unwrap();
    let base = spawn(settings(&root), happy_mocks()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api-endpoint"))
        .json(&task_body("right"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["state"], "done");
    assert_eq!(body["notify_status"], "notified");
    assert_eq!(body["pages_ready"], true);
    assert_eq!(body["commit_sha"], "feedbeef");
    let pages_url = body["pages_url"].as_str().unwrap();
    assert!(pages_url.starts_with("https://student.github.io/captcha-solver-"));
    assert!(fs::read_dir(root.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn secret_mismatch_is_bad_request() {
    let root = tempfile::tempdir().unwrap();
    let base = spawn(
        settings(&root),
        (MockGenerator::new(), MockHostingApi::new(), MockWebClient::new()),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api-endpoint"))
        .json(&task_body("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Secret mismatch");
    assert_eq!(body["state"], "failed");
    assert_eq!(body["stage"], "received");
}

#[tokio::test]
async fn missing_token_is_server_error() {
    let root = tempfile::tempdir().unwrap();
    let mut settings = settings(&root);
    settings.github_token = None;
    let base = spawn(
        settings,
        (MockGenerator::new(), MockHostingApi::new(), MockWebClient::new()),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api-endpoint"))
        .json(&task_body("right"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Server misconfigured"));
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let base = spawn(
        settings(&root),
        (MockGenerator::new(), MockHostingApi::new(), MockWebClient::new()),
    )
    .await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api-endpoint"))
        .header("content-type", "application/json")
        .body(r#"{"email": "student@example.com"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["state"], "failed");
}
