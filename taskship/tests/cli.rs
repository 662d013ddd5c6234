use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::write;
use tempfile::NamedTempFile;

fn base_cmd() -> Command {
    let mut cmd = Command::cargo_bin("taskship").expect("Binary exists");
    for var in [
        "GITHUB_TOKEN",
        "GITHUB_OWNER",
        "GITHUB_API_URL",
        "KEEP_BUILD_ARTIFACTS",
        "LLM_API_KEY",
        "LLM_BASE_URL",
        "LLM_MODEL",
        "TASKSHIP_BIND",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn check_config_reports_presence_without_values() {
    let secrets = NamedTempFile::new().unwrap();
    write(secrets.path(), r#"{"a@b.c": "shh"}"#).unwrap();

    let mut cmd = base_cmd();
    cmd.arg("check-config")
        .env("API_SECRET_MAP", secrets.path())
        .env("GITHUB_TOKEN", "ghp_supersecretvalue")
        .env("GITHUB_OWNER", "acme");

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("GITHUB_TOKEN: set")
                .and(predicate::str::contains("LLM_API_KEY: missing"))
                .and(predicate::str::contains("GITHUB_OWNER: acme"))
                .and(predicate::str::contains("secret map entries: 1"))
                .and(predicate::str::contains("ghp_supersecretvalue").not())
                .and(predicate::str::contains("shh").not()),
        );
}

#[test]
fn check_config_warns_in_open_mode() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = base_cmd();
    cmd.arg("check-config")
        .env("API_SECRET_MAP", dir.path().join("missing.json"));

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("secret map is empty"));
}

#[test]
fn missing_config_file_fails() {
    let mut cmd = base_cmd();
    cmd.arg("check-config")
        .arg("--config")
        .arg("definitely-not-here.yaml");

    cmd.assert().failure();
}

#[test]
fn submit_with_unreadable_task_file_fails() {
    let mut cmd = base_cmd();
    cmd.arg("submit")
        .arg("--file")
        .arg("no-such-task.json")
        .arg("--endpoint")
        .arg("http://127.0.0.1:9/api-endpoint");

    cmd.assert().failure();
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use taskship::cli::{run, Cli, Commands};

    let cli = Cli {
        config: Some(std::path::PathBuf::from("dummy.yaml")),
        command: Commands::CheckConfig,
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
