use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

const VARS: &[&str] = &[
    "GITHUB_TOKEN",
    "GITHUB_OWNER",
    "GITHUB_API_URL",
    "API_SECRET_MAP",
    "KEEP_BUILD_ARTIFACTS",
    "LLM_API_KEY",
    "LLM_BASE_URL",
    "LLM_MODEL",
    "TASKSHIP_BIND",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

fn secret_map_file(json: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), json).unwrap();
    file
}

#[tokio::test]
#[serial]
async fn test_defaults_without_file_or_env() {
    clear_env();
    let missing = tempfile::tempdir().unwrap();
    env::set_var("API_SECRET_MAP", missing.path().join("none.json"));

    let config = taskship::load_config::load_config(None).expect("Config should load");

    assert_eq!(config.bind, "0.0.0.0:8000");
    assert_eq!(config.github_api_url, "https://api.github.com");
    assert_eq!(config.llm.base_url, "https://aipipe.org/openai/v1");
    assert_eq!(config.llm.model, "gpt-4o-mini");
    assert!(config.llm.api_key.is_none());
    assert!(config.github_branch.is_none());
    assert!(config.settings.github_token.is_none());
    assert!(config.settings.github_owner.is_empty());
    assert!(config.settings.open_mode());
    assert!(!config.settings.keep_artifacts);
    assert_eq!(config.settings.poll.max_attempts, 10);
    assert_eq!(config.settings.notify.max_attempts, 6);
    clear_env();
}

#[tokio::test]
#[serial]
async fn test_yaml_file_values_are_applied() {
    clear_env();
    let secrets = secret_map_file(r#"{"alice@example.com": "s3cret"}"#);
    let config_yaml = format!(
        r#"
bind: 127.0.0.1:9100
workspace_root: ./tmp/work
keep_artifacts: true
secret_map_path: {}
attachment_timeout_secs: 5
github:
  owner: acme-org
  branch: gh-pages
llm:
  model: custom-model
poll:
  max_attempts: 3
  base_delay_ms: 250
notify:
  cap_exponent: 2
"#,
        secrets.path().display()
    );
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = taskship::load_config::load_config(Some(config_file.path()))
        .expect("Config should load");

    assert_eq!(config.bind, "127.0.0.1:9100");
    assert_eq!(config.settings.github_owner, "acme-org");
    assert_eq!(config.github_branch.as_deref(), Some("gh-pages"));
    assert_eq!(config.llm.model, "custom-model");
    assert!(config.settings.keep_artifacts);
    assert_eq!(
        config.settings.workspace_root,
        Some(PathBuf::from("./tmp/work"))
    );
    assert_eq!(config.settings.attachment_timeout, Duration::from_secs(5));
    assert_eq!(config.settings.poll.max_attempts, 3);
    assert_eq!(config.settings.poll.base_delay, Duration::from_millis(250));
    assert_eq!(config.settings.poll.cap_exponent, 4);
    assert_eq!(config.settings.notify.max_attempts, 6);
    assert_eq!(config.settings.notify.cap_exponent, 2);
    assert!(config
        .settings
        .verify_secret("alice@example.com", "s3cret"));
    assert!(!config.settings.verify_secret("alice@example.com", "nope"));
    clear_env();
}

#[tokio::test]
#[serial]
async fn test_env_overrides_file() {
    clear_env();
    let secrets = secret_map_file(r#"{"bob@example.com": "x"}"#);
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "bind: 127.0.0.1:1\ngithub:\n  owner: from-file\nkeep_artifacts: true\n",
    )
    .unwrap();

    env::set_var("API_SECRET_MAP", secrets.path());
    env::set_var("GITHUB_TOKEN", "ghp_test");
    env::set_var("GITHUB_OWNER", "from-env");
    env::set_var("TASKSHIP_BIND", "127.0.0.1:2");
    env::set_var("KEEP_BUILD_ARTIFACTS", "no");
    env::set_var("LLM_API_KEY", "llm-key");

    let config = taskship::load_config::load_config(Some(config_file.path()))
        .expect("Config should load");

    assert_eq!(config.bind, "127.0.0.1:2");
    assert_eq!(config.settings.github_owner, "from-env");
    assert_eq!(config.settings.github_token.as_deref(), Some("ghp_test"));
    assert_eq!(config.llm.api_key.as_deref(), Some("llm-key"));
    assert!(!config.settings.keep_artifacts);
    assert_eq!(config.settings.secret_map.len(), 1);
    clear_env();
}

#[tokio::test]
#[serial]
async fn test_invalid_inputs_fail() {
    clear_env();
    let bad_yaml = NamedTempFile::new().expect("temp file");
    write(bad_yaml.path(), "poll: [not, a, map]\n").unwrap();
    assert!(taskship::load_config::load_config(Some(bad_yaml.path())).is_err());

    assert!(
        taskship::load_config::load_config(Some(std::path::Path::new("does-not-exist.yaml")))
            .is_err()
    );

    let bad_map = secret_map_file("[1, 2, 3]");
    env::set_var("API_SECRET_MAP", bad_map.path());
    assert!(taskship::load_config::load_config(None).is_err());
    clear_env();
}

#[test]
fn test_parse_flag() {
    use taskship::load_config::parse_flag;
    assert!(parse_flag("true"));
    assert!(parse_flag(" YES "));
    assert!(parse_flag("1"));
    assert!(!parse_flag("false"));
    assert!(!parse_flag(""));
}
