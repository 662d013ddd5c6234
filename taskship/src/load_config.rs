/// `load_config` module: builds the process-wide [`Settings`] from an optional YAML
/// file, the environment and the secret-map JSON file.
///
/// This is the only place where configuration input is parsed. Precedence,
/// lowest first: built-in defaults, YAML file, environment variables.
///
/// # Environment
/// `GITHUB_TOKEN`, `GITHUB_OWNER`, `GITHUB_API_URL`, `API_SECRET_MAP`,
/// `KEEP_BUILD_ARTIFACTS`, `LLM_API_KEY`, `LLM_BASE_URL`, `LLM_MODEL`,
/// `TASKSHIP_BIND`.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary. A
/// missing `GITHUB_TOKEN` is not an error here; tasks fail on it instead.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use taskship_core::config::Settings;
use taskship_core::retry::RetryPolicy;
use tracing::{error, info, warn};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_LLM_BASE_URL: &str = "https://aipipe.org/openai/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SECRET_MAP: &str = "secrets_map.json";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub workspace_root: Option<PathBuf>,
    pub keep_artifacts: Option<bool>,
    pub secret_map_path: Option<PathBuf>,
    pub attachment_timeout_secs: Option<u64>,
    pub github: GithubSection,
    pub llm: LlmSection,
    pub poll: RetrySection,
    pub notify: RetrySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GithubSection {
    pub owner: Option<String>,
    pub api_url: Option<String>,
    /// Publish branch override.
    pub branch: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub cap_exponent: Option<u32>,
}

impl RetrySection {
    fn apply(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            base_delay: self
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(base.base_delay),
            cap_exponent: self.cap_exponent.unwrap_or(base.cap_exponent),
        }
    }
}

/// Generator credentials and endpoint.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

/// Everything the binary needs at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub settings: Settings,
    pub bind: String,
    pub github_api_url: String,
    /// Branch to publish to; the repository's default branch when `None`.
    pub github_branch: Option<String>,
    pub llm: LlmConfig,
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `true`, `1` or `yes` (any case).
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Read the requester → secret map. A missing file yields an empty map (open mode).
pub fn load_secret_map(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        warn!(path = %path.display(), "Secret map file not found, using empty map");
        return Ok(HashMap::new());
    }
    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, path = %path.display(), "Failed to read secret map");
        anyhow::anyhow!("Failed to read secret map {}: {}", path.display(), e)
    })?;
    let map: HashMap<String, String> = serde_json::from_str(&content)
        .with_context(|| format!("Secret map {} is not a JSON object of strings", path.display()))?;
    info!(path = %path.display(), entries = map.len(), "Secret map loaded");
    Ok(map)
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path,
                e
            ));
        }
    };
    match serde_yaml::from_str(&content) {
        Ok(conf) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Build the startup configuration. `path` is the optional YAML file.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let file = match path {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };
    let defaults = Settings::default();

    let secret_map_path = env_non_empty("API_SECRET_MAP")
        .map(PathBuf::from)
        .or(file.secret_map_path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SECRET_MAP));
    let secret_map = load_secret_map(&secret_map_path)?;

    let keep_artifacts = match std::env::var("KEEP_BUILD_ARTIFACTS") {
        Ok(value) => parse_flag(&value),
        Err(_) => file.keep_artifacts.unwrap_or(false),
    };

    let settings = Settings {
        github_token: env_non_empty("GITHUB_TOKEN"),
        github_owner: env_non_empty("GITHUB_OWNER")
            .or(file.github.owner.clone())
            .unwrap_or_default(),
        secret_map,
        keep_artifacts,
        workspace_root: file.workspace_root.clone(),
        attachment_timeout: file
            .attachment_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.attachment_timeout),
        poll: file.poll.apply(defaults.poll),
        notify: file.notify.apply(defaults.notify),
    };

    let config = AppConfig {
        bind: env_non_empty("TASKSHIP_BIND")
            .or(file.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        github_api_url: env_non_empty("GITHUB_API_URL")
            .or(file.github.api_url.clone())
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        github_branch: file
            .github
            .branch
            .clone()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty()),
        llm: LlmConfig {
            api_key: env_non_empty("LLM_API_KEY"),
            base_url: env_non_empty("LLM_BASE_URL")
                .or(file.llm.base_url.clone())
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: env_non_empty("LLM_MODEL")
                .or(file.llm.model.clone())
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        },
        settings,
    };

    info!(
        bind = %config.bind,
        github_api_url = %config.github_api_url,
        github_branch = ?config.github_branch,
        llm_model = %config.llm.model,
        llm_key_set = config.llm.api_key.is_some(),
        "Config loaded and merged successfully"
    );
    Ok(config)
}
