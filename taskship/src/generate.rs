//! # LLM-backed site generator
//!
//! [`LlmGenerator`] implements the core [`Generator`] seam with one
//! chat-completions call to an OpenAI-compatible endpoint. The model is asked
//! for a JSON object with `index_html`, `main_js` and `readme`; only
//! `index_html` is required. The resulting files are written into the project
//! directory and every attachment is copied alongside them.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use taskship_core::contract::{GenerateError, Generator};
use taskship_core::task::TaskRequest;

use crate::load_config::LlmConfig;

const SYSTEM_PROMPT: &str = r##"You are an expert web developer that generates complete, deployable static websites.
You MUST return ONLY valid JSON with this exact structure:
{
  "index_html": "<!DOCTYPE html>\n<html>...</html>",
  "main_js": "// JavaScript code here",
  "readme": "# Project\n\nDescription..."
}

Requirements for each file:
- index_html: a complete, valid HTML5 document
- main_js: JavaScript that can be included with a script tag
- readme: Markdown with a summary, usage notes and a license section

Do NOT include any text, explanations, or markdown code fences outside the JSON."##;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Files produced by the model.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteFiles {
    pub index_html: String,
    #[serde(default)]
    pub main_js: Option<String>,
    #[serde(default)]
    pub readme: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Parse the model reply. Text around the outermost `{...}` is ignored.
pub fn parse_site_files(content: &str) -> Result<SiteFiles, GenerateError> {
    let trimmed = content.trim();
    if let Ok(files) = serde_json::from_str::<SiteFiles>(trimmed) {
        return Ok(files);
    }
    let (start, end) = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => (start, end),
        _ => {
            return Err(GenerateError::InvalidOutput(
                "no JSON object in model reply".to_string(),
            ))
        }
    };
    serde_json::from_str::<SiteFiles>(&trimmed[start..=end])
        .map_err(|e| GenerateError::InvalidOutput(format!("model reply is not site JSON: {e}")))
}

fn user_prompt(request: &TaskRequest, attachment_names: &[String]) -> String {
    let mut prompt = format!("BRIEF: {}\n", request.brief);
    if !request.checks.is_empty() {
        prompt.push_str("\nThe result will be evaluated against these checks:\n");
        for check in &request.checks {
            prompt.push_str(&format!("- {check}\n"));
        }
    }
    if !attachment_names.is_empty() {
        prompt.push_str(
            "\nThese files will sit next to index.html and may be fetched by relative path:\n",
        );
        for name in attachment_names {
            prompt.push_str(&format!("- {name}\n"));
        }
    }
    prompt.push_str(
        "\nGenerate a complete, self-contained static website that fulfills the brief.\n\
         Use only plain HTML, CSS and vanilla JavaScript.\n\
         Return ONLY the JSON object with the three required keys.\n",
    );
    prompt
}

async fn attachment_names(dir: &Path) -> Result<Vec<String>, std::io::Error> {
    let mut names = Vec::new();
    if !dir.exists() {
        return Ok(names);
    }
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Write `files` into `project_dir`, then copy attachments that do not clash
/// with a generated file name.
pub async fn write_site(
    files: &SiteFiles,
    request: &TaskRequest,
    project_dir: &Path,
    attachments_dir: &Path,
) -> Result<(), GenerateError> {
    tokio::fs::create_dir_all(project_dir).await?;
    tokio::fs::write(project_dir.join("index.html"), &files.index_html).await?;
    if let Some(main_js) = &files.main_js {
        tokio::fs::write(project_dir.join("main.js"), main_js).await?;
    }
    let readme = files
        .readme
        .clone()
        .unwrap_or_else(|| format!("# {}\n\n{}", request.task, request.brief));
    tokio::fs::write(project_dir.join("README.md"), readme).await?;

    for name in attachment_names(attachments_dir).await? {
        let target = project_dir.join(&name);
        if target.exists() {
            tracing::warn!(attachment = %name, "Attachment name clashes with a generated file, not copied");
            continue;
        }
        tokio::fs::copy(attachments_dir.join(&name), &target).await?;
    }
    Ok(())
}

pub struct LlmGenerator {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmGenerator {
    pub fn new(config: LlmConfig) -> Result<Self, GenerateError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenerateError::Upstream(e.to_string()))?;
        tracing::info!(
            base_url = %config.base_url,
            model = %config.model,
            api_key_set = config.api_key.is_some(),
            "Initialized LlmGenerator"
        );
        Ok(Self { http, config })
    }

    async fn complete(&self, api_key: &str, prompt: String) -> Result<String, GenerateError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "temperature": 0.1,
            "max_tokens": 4000,
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerateError::Upstream(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "Model endpoint returned an error");
            return Err(GenerateError::Upstream(format!(
                "model endpoint returned status {}",
                status.as_u16()
            )));
        }
        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::InvalidOutput(e.to_string()))?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerateError::InvalidOutput("empty model reply".to_string()))
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(
        &self,
        request: &TaskRequest,
        project_dir: &Path,
        attachments_dir: &Path,
    ) -> Result<(), GenerateError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| GenerateError::NotConfigured("LLM_API_KEY is not set".to_string()))?;

        let names = attachment_names(attachments_dir).await?;
        tracing::info!(task = %request.task, attachments = names.len(), "[GENERATE] Requesting site files");
        let content = self.complete(api_key, user_prompt(request, &names)).await?;
        let files = parse_site_files(&content)?;
        write_site(&files, request, project_dir, attachments_dir).await?;
        tracing::info!(task = %request.task, main_js = files.main_js.is_some(), "[GENERATE] Site files written");
        Ok(())
    }
}
