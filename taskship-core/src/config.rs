use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

/// Process-wide, read-only settings.
///
/// Built once at startup and shared behind an `Arc`; nothing mutates it
/// afterwards and there is no reload path.
#[derive(Clone)]
pub struct Settings {
    /// Hosting platform credential. `None` fails every task with a configuration error.
    pub github_token: Option<String>,
    /// Preferred repository owner; empty means the authenticated user.
    pub github_owner: String,
    /// Requester email → shared secret.
    pub secret_map: HashMap<String, String>,
    /// Keep per-task workspaces on disk after the run.
    pub keep_artifacts: bool,
    /// Parent directory for per-task workspaces; system temp dir when `None`.
    pub workspace_root: Option<PathBuf>,
    pub attachment_timeout: Duration,
    pub poll: RetryPolicy,
    pub notify: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            github_token: None,
            github_owner: String::new(),
            secret_map: HashMap::new(),
            keep_artifacts: false,
            workspace_root: None,
            attachment_timeout: Duration::from_secs(20),
            poll: RetryPolicy::new(10, Duration::from_secs(1), 4),
            notify: RetryPolicy::new(6, Duration::from_secs(1), 4),
        }
    }
}

impl Settings {
    /// Check `secret` for `email` against the secret map.
    ///
    /// With an empty map any non-empty secret is accepted ("open mode"),
    /// which exists for local testing only.
    pub fn verify_secret(&self, email: &str, secret: &str) -> bool {
        match self.secret_map.get(email) {
            Some(expected) => constant_time_eq(expected, secret),
            None => self.secret_map.is_empty() && !secret.is_empty(),
        }
    }

    pub fn open_mode(&self) -> bool {
        self.secret_map.is_empty()
    }

    pub fn trace_loaded(&self) {
        info!(
            github_owner = %self.github_owner,
            github_token_set = self.github_token.is_some(),
            secret_map_entries = self.secret_map.len(),
            keep_artifacts = self.keep_artifacts,
            poll_attempts = self.poll.max_attempts,
            notify_attempts = self.notify.max_attempts,
            "Loaded Settings"
        );
        debug!(workspace_root = ?self.workspace_root, "Workspace root");
        if self.github_token.is_none() {
            warn!("GITHUB_TOKEN not set; every task will fail until it is configured");
        }
        if self.open_mode() {
            warn!("Secret map is empty: accepting any non-empty secret (open mode, local testing only)");
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_map(entries: &[(&str, &str)]) -> Settings {
        Settings {
            secret_map: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Settings::default()
        }
    }

    #[test]
    fn open_mode_accepts_any_non_empty_secret() {
        let settings = with_map(&[]);
        assert!(settings.verify_secret("a@example.com", "anything"));
        assert!(!settings.verify_secret("a@example.com", ""));
    }

    #[test]
    fn mapped_requester_needs_exact_secret() {
        let settings = with_map(&[("a@example.com", "s3cret")]);
        assert!(settings.verify_secret("a@example.com", "s3cret"));
        assert!(!settings.verify_secret("a@example.com", "s3cre"));
        assert!(!settings.verify_secret("a@example.com", "wrong!"));
    }

    #[test]
    fn unknown_requester_rejected_when_map_populated() {
        let settings = with_map(&[("a@example.com", "s3cret")]);
        assert!(!settings.verify_secret("b@example.com", "s3cret"));
    }
}
