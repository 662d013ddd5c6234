//! Secret Scanner/Redactor.
//!
//! Runs once over the generated project tree before anything is published:
//!
//! 1. deletion pass: files whose name is on [`DENY_LIST`] are removed, at any depth;
//! 2. substitution pass: every remaining text file has each [`MARKERS`]
//!    occurrence replaced by [`REDACTION`], in place.
//!
//! This is heuristic, best-effort scanning and not a security boundary.
//! Files that are not valid UTF-8 are left untouched.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File names removed outright, regardless of content.
pub const DENY_LIST: &[&str] = &[".env", "secrets_map.json", "id_rsa", "id_ed25519"];

/// Credential prefixes scrubbed from text files.
pub const MARKERS: &[&str] = &["ghp_", "gho_", "AKIA", "AIza", "xoxb-"];

pub const REDACTION: &str = "[REDACTED-]";

/// Extensions never treated as text.
pub const BINARY_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "ico", "pdf", "zip"];

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("project directory {0} does not exist")]
    MissingRoot(PathBuf),
    #[error("failed to delete sensitive file {path}: {source}")]
    Delete { path: PathBuf, source: io::Error },
    #[error("failed to write redacted file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("scan did not run to completion: {0}")]
    Interrupted(String),
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub deleted: Vec<PathBuf>,
    pub redacted: Vec<PathBuf>,
    pub replacements: usize,
    /// Text-candidate files that could not be read as UTF-8.
    pub skipped: Vec<PathBuf>,
}

fn is_denied(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| DENY_LIST.contains(&n))
}

fn is_text_candidate(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => !BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => true,
    }
}

/// Replace every marker occurrence; returns the new text and the number of substitutions.
pub fn redact_text(text: &str) -> (String, usize) {
    let mut out = text.to_string();
    let mut count = 0;
    for marker in MARKERS {
        let hits = out.matches(marker).count();
        if hits > 0 {
            out = out.replace(marker, REDACTION);
            count += hits;
        }
    }
    (out, count)
}

/// Scan and redact `root` in place.
pub fn scan_and_redact(root: &Path) -> Result<ScanReport, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }
    let mut report = ScanReport::default();

    let denied: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| !e.file_type().is_dir() && is_denied(e.path()))
        .map(|e| e.into_path())
        .collect();
    for path in denied {
        std::fs::remove_file(&path).map_err(|source| ScanError::Delete {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "[SCAN] removed sensitive file");
        report.deleted.push(path);
    }

    for entry in WalkDir::new(root).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = ?e, "[SCAN] unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_text_candidate(entry.path()) {
            continue;
        }
        let path = entry.path();
        let text = match std::fs::read(path).map(String::from_utf8) {
            Ok(Ok(text)) => text,
            Ok(Err(_)) | Err(_) => {
                debug!(path = %path.display(), "[SCAN] not readable as text, skipping");
                report.skipped.push(path.to_path_buf());
                continue;
            }
        };
        let (redacted, count) = redact_text(&text);
        if count == 0 {
            continue;
        }
        std::fs::write(path, redacted).map_err(|source| ScanError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        warn!(path = %path.display(), replacements = count, "[SCAN] redacted credential markers");
        report.redacted.push(path.to_path_buf());
        report.replacements += count;
    }

    info!(
        deleted = report.deleted.len(),
        redacted = report.redacted.len(),
        replacements = report.replacements,
        "[SCAN] secret scan complete"
    );
    Ok(report)
}
