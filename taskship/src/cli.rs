/// # taskship CLI Interface
///
/// Command parsing and the async [`run`] entrypoint shared by `main()` and the
/// integration tests. Pipeline logic lives in `taskship-core`; this module only
/// loads configuration and dispatches to the server, the submit client or the
/// configuration check.
///
/// ## Commands
/// - `serve`: start the HTTP service.
/// - `submit`: POST a task JSON file to a running service and print the response.
/// - `check-config`: load and report configuration without starting anything.
///   Credential values are never printed, only whether they are set.
use crate::load_config::{load_config, AppConfig};
use crate::server::serve;
use crate::submit::submit;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_SUBMIT_ENDPOINT: &str = "http://127.0.0.1:8000/api-endpoint";

/// CLI for taskship: turn task briefs into published static sites.
#[derive(Parser)]
#[clap(
    name = "taskship",
    version,
    about = "Generate, scrub and publish static sites from task briefs"
)]
pub struct Cli {
    /// Optional YAML config file; environment variables take precedence
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Listen address, overrides TASKSHIP_BIND and the config file
        #[clap(long)]
        bind: Option<String>,
    },
    /// Send a task request file to a running service
    Submit {
        /// Path to the task request JSON
        #[clap(long)]
        file: PathBuf,
        /// Task endpoint URL
        #[clap(long, default_value = DEFAULT_SUBMIT_ENDPOINT)]
        endpoint: String,
    },
    /// Load the configuration and report what is set
    CheckConfig,
}

fn presence(set: bool) -> &'static str {
    if set {
        "set"
    } else {
        "missing"
    }
}

/// Human-readable configuration summary. Contains no secret values.
pub fn describe_config(config: &AppConfig) -> String {
    let settings = &config.settings;
    let mut lines = vec![
        format!("GITHUB_TOKEN: {}", presence(settings.github_token.is_some())),
        format!(
            "GITHUB_OWNER: {}",
            if settings.github_owner.is_empty() {
                "(authenticated user)"
            } else {
                settings.github_owner.as_str()
            }
        ),
        format!("GITHUB_API_URL: {}", config.github_api_url),
        format!(
            "publish branch: {}",
            config
                .github_branch
                .as_deref()
                .unwrap_or("(repository default)")
        ),
        format!("LLM_API_KEY: {}", presence(config.llm.api_key.is_some())),
        format!("LLM_BASE_URL: {}", config.llm.base_url),
        format!("LLM_MODEL: {}", config.llm.model),
        format!("secret map entries: {}", settings.secret_map.len()),
        format!("keep artifacts: {}", settings.keep_artifacts),
        format!("bind: {}", config.bind),
        format!(
            "poll: {} attempts, base delay {:?}",
            settings.poll.max_attempts, settings.poll.base_delay
        ),
        format!(
            "notify: {} attempts, base delay {:?}",
            settings.notify.max_attempts, settings.notify.base_delay
        ),
    ];
    if settings.open_mode() {
        lines.push("WARNING: secret map is empty, any non-empty secret is accepted".to_string());
    }
    lines.join("\n")
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Serve { bind } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(bind) = bind {
                config.bind = bind;
            }
            tracing::info!(command = "serve", bind = %config.bind, "Starting service");
            serve(config).await
        }
        Commands::Submit { file, endpoint } => {
            tracing::info!(command = "submit", file = %file.display(), %endpoint, "Submitting task");
            let response = submit(&file, &endpoint).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if let Some(pages_url) = response.get("pages_url").and_then(|v| v.as_str()) {
                println!("pages_url: {pages_url}");
            }
            Ok(())
        }
        Commands::CheckConfig => {
            let config = load_config(cli.config.as_deref())?;
            tracing::info!(command = "check-config", "Configuration loaded");
            println!("{}", describe_config(&config));
            Ok(())
        }
    }
}
