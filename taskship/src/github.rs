//! # GitHub hosting client
//!
//! [`GithubClient`] implements [`HostingApi`] against the GitHub REST API.
//! The push uses the Git data endpoints (blobs → tree → commit → ref) so the
//! whole project lands as exactly one new commit whose tree has no base:
//! every publish fully replaces the default branch content.
//!
//! Nothing here retries; a non-success status is returned as a
//! [`HostingError`] carrying the status code and the response body.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use taskship_core::contract::{AccountKind, HostingApi, HostingError, Repository, TreeFile};

const MAX_ERROR_BODY: usize = 600;

pub struct GithubClient {
    http: Client,
    api_base: String,
    /// Publish branch; the repository's default branch when `None`.
    branch: Option<String>,
}

#[derive(Deserialize)]
struct OwnerJson {
    login: String,
}

#[derive(Deserialize)]
struct RepoJson {
    name: String,
    html_url: String,
    #[serde(default)]
    default_branch: Option<String>,
    owner: OwnerJson,
}

impl From<RepoJson> for Repository {
    fn from(repo: RepoJson) -> Self {
        Repository {
            owner: repo.owner.login,
            name: repo.name,
            html_url: repo.html_url,
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ShaJson {
    sha: String,
}

#[derive(Deserialize)]
struct RefJson {
    object: ShaJson,
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

impl GithubClient {
    /// Build a client for `api_base` authenticating with `token` when present.
    pub fn new(api_base: &str, token: Option<&str>, timeout: Duration) -> Result<Self, HostingError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("taskship"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| HostingError::new("configure client", None, e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| HostingError::new("configure client", None, e.to_string()))?;
        tracing::info!(api_base, token_set = token.is_some(), "Initialized GithubClient");
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            branch: None,
        })
    }

    /// Push to and serve Pages from `branch` instead of the default branch.
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch.map(|b| b.trim().to_string()).filter(|b| !b.is_empty());
        if let Some(branch) = &self.branch {
            tracing::info!(branch = %branch, "Publishing to configured branch");
        }
        self
    }

    fn repository(&self, repo: RepoJson) -> Repository {
        let mut repository = Repository::from(repo);
        if let Some(branch) = &self.branch {
            repository.default_branch = branch.clone();
        }
        repository
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    async fn send(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, HostingError> {
        request.send().await.map_err(|e| {
            tracing::error!(operation, error = ?e, "GitHub request failed");
            HostingError::new(operation, e.status().map(|s| s.as_u16()), e.to_string())
        })
    }

    async fn failure(operation: &str, response: reqwest::Response) -> HostingError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::error!(operation, status, body = %truncate(&body), "GitHub API error");
        HostingError::new(operation, Some(status), truncate(&body))
    }

    async fn json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, HostingError> {
        let response = self.send(operation, request).await?;
        if !response.status().is_success() {
            return Err(Self::failure(operation, response).await);
        }
        response.json::<T>().await.map_err(|e| {
            HostingError::new(operation, None, format!("unexpected response body: {e}"))
        })
    }

    async fn head_commit(&self, repository: &Repository) -> Result<Option<String>, HostingError> {
        let operation = "read branch ref";
        let request = self.http.get(self.url(&format!(
            "/repos/{}/{}/git/ref/heads/{}",
            repository.owner, repository.name, repository.default_branch
        )));
        let response = self.send(operation, request).await?;
        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Ok(None),
            status if status.is_success() => {
                let head: RefJson = response.json().await.map_err(|e| {
                    HostingError::new(operation, None, format!("unexpected response body: {e}"))
                })?;
                Ok(Some(head.object.sha))
            }
            _ => Err(Self::failure(operation, response).await),
        }
    }
}

#[async_trait]
impl HostingApi for GithubClient {
    async fn account_kind(&self, owner: &str) -> Result<AccountKind, HostingError> {
        #[derive(Deserialize)]
        struct Account {
            #[serde(rename = "type")]
            kind: String,
        }

        let response = self
            .send("probe owner", self.http.get(self.url(&format!("/users/{owner}"))))
            .await?;
        if response.status() != StatusCode::OK {
            tracing::warn!(owner, status = response.status().as_u16(), "Owner probe did not succeed, assuming personal account");
            return Ok(AccountKind::User);
        }
        let account: Account = response
            .json()
            .await
            .map_err(|e| HostingError::new("probe owner", None, e.to_string()))?;
        Ok(if account.kind == "Organization" {
            AccountKind::Organization
        } else {
            AccountKind::User
        })
    }

    async fn viewer_login(&self) -> Result<String, HostingError> {
        let viewer: OwnerJson = self
            .json("resolve authenticated user", self.http.get(self.url("/user")))
            .await?;
        Ok(viewer.login)
    }

    async fn find_repository(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Repository>, HostingError> {
        let operation = "get repository";
        let response = self
            .send(operation, self.http.get(self.url(&format!("/repos/{owner}/{name}"))))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::failure(operation, response).await);
        }
        let repo: RepoJson = response
            .json()
            .await
            .map_err(|e| HostingError::new(operation, None, e.to_string()))?;
        Ok(Some(self.repository(repo)))
    }

    async fn create_repository(
        &self,
        name: &str,
        organization: Option<String>,
    ) -> Result<Repository, HostingError> {
        let path = match &organization {
            Some(org) => format!("/orgs/{org}/repos"),
            None => "/user/repos".to_string(),
        };
        let body = json!({
            "name": name,
            "private": false,
            "auto_init": true,
            "description": "Generated and published by taskship",
        });
        tracing::info!(repo = name, organization = ?organization, "Creating repository");
        let repo: RepoJson = self
            .json("create repository", self.http.post(self.url(&path)).json(&body))
            .await?;
        Ok(self.repository(repo))
    }

    async fn push_tree(
        &self,
        repository: &Repository,
        files: Vec<TreeFile>,
        message: &str,
    ) -> Result<String, HostingError> {
        let repo_path = format!("/repos/{}/{}", repository.owner, repository.name);
        let parent = self.head_commit(repository).await?;

        let mut entries = Vec::with_capacity(files.len());
        for file in &files {
            let blob: ShaJson = self
                .json(
                    "create blob",
                    self.http
                        .post(self.url(&format!("{repo_path}/git/blobs")))
                        .json(&json!({
                            "content": STANDARD.encode(&file.content),
                            "encoding": "base64",
                        })),
                )
                .await?;
            entries.push(json!({
                "path": file.path,
                "mode": "100644",
                "type": "blob",
                "sha": blob.sha,
            }));
        }

        let tree: ShaJson = self
            .json(
                "create tree",
                self.http
                    .post(self.url(&format!("{repo_path}/git/trees")))
                    .json(&json!({ "tree": entries })),
            )
            .await?;

        let parents: Vec<&str> = parent.as_deref().into_iter().collect();
        let commit: ShaJson = self
            .json(
                "create commit",
                self.http
                    .post(self.url(&format!("{repo_path}/git/commits")))
                    .json(&json!({
                        "message": message,
                        "tree": tree.sha,
                        "parents": parents,
                    })),
            )
            .await?;

        let branch = &repository.default_branch;
        let _: serde_json::Value = match parent {
            Some(_) => {
                self.json(
                    "update branch ref",
                    self.http
                        .patch(self.url(&format!("{repo_path}/git/refs/heads/{branch}")))
                        .json(&json!({ "sha": commit.sha, "force": true })),
                )
                .await?
            }
            None => {
                self.json(
                    "create branch ref",
                    self.http
                        .post(self.url(&format!("{repo_path}/git/refs")))
                        .json(&json!({ "ref": format!("refs/heads/{branch}"), "sha": commit.sha })),
                )
                .await?
            }
        };

        tracing::info!(repo = %repository.html_url, commit = %commit.sha, files = files.len(), "Pushed tree");
        Ok(commit.sha)
    }

    async fn enable_pages(&self, repository: &Repository) -> Result<(), HostingError> {
        let operation = "enable pages";
        let request = self
            .http
            .post(self.url(&format!(
                "/repos/{}/{}/pages",
                repository.owner, repository.name
            )))
            .json(&json!({
                "source": { "branch": repository.default_branch, "path": "/" }
            }));
        let response = self.send(operation, request).await?;
        match response.status() {
            status if status.is_success() => {
                tracing::info!(repo = %repository.html_url, "Pages enabled");
                Ok(())
            }
            StatusCode::CONFLICT => {
                tracing::info!(repo = %repository.html_url, "Pages already enabled");
                Ok(())
            }
            _ => Err(Self::failure(operation, response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_json_maps_owner_and_default_branch() {
        let raw = r#"{"name":"site","html_url":"https://github.com/Acme/site","owner":{"login":"Acme"}}"#;
        let repo: Repository = serde_json::from_str::<RepoJson>(raw).unwrap().into();
        assert_eq!(repo.owner, "Acme");
        assert_eq!(repo.default_branch, "main");
        assert_eq!(repo.pages_url(), "https://acme.github.io/site/");
    }

    #[test]
    fn long_error_bodies_are_truncated_on_char_boundary() {
        let body = "é".repeat(MAX_ERROR_BODY);
        let out = truncate(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= MAX_ERROR_BODY + 3);
    }
}
