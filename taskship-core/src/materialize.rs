//! Attachment Materializer: turns attachment references into files.
//!
//! Inline `data:` URIs are decoded in place; anything else is fetched through
//! the [`WebClient`] under a short timeout. A bad attachment is logged and
//! skipped, never retried, and never fails the task.

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::future::join_all;
use tracing::{info, warn};

use crate::contract::WebClient;
use crate::task::{Attachment, AttachmentSource};

/// What happened to each attachment.
#[derive(Debug, Default)]
pub struct MaterializeReport {
    pub saved: Vec<PathBuf>,
    /// Attachment name and the reason it was skipped.
    pub skipped: Vec<(String, String)>,
}

/// Decode the bytes of an inline attachment. Non-base64 payloads are percent-decoded.
pub fn decode_inline(base64: bool, payload: &str) -> Result<Vec<u8>, String> {
    if !base64 {
        return Ok(urlencoding::decode_binary(payload.as_bytes()).into_owned());
    }
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| format!("invalid base64 payload: {e}"))
}

fn safe_file_name(name: &str) -> Result<&str, String> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        Err(format!("unsafe attachment name {name:?}"))
    } else {
        Ok(name)
    }
}

async fn materialize_one<W>(
    web: &W,
    attachment: &Attachment,
    dir: &Path,
    timeout: Duration,
) -> Result<PathBuf, String>
where
    W: WebClient + ?Sized,
{
    let file_name = safe_file_name(&attachment.name)?;
    let bytes = match attachment.source() {
        AttachmentSource::Inline { base64, payload } => decode_inline(base64, payload)?,
        AttachmentSource::Remote(url) => tokio::time::timeout(timeout, web.fetch_bytes(url))
            .await
            .map_err(|_| format!("fetch timed out after {}s", timeout.as_secs()))?
            .map_err(|e| format!("fetch failed: {e}"))?,
    };
    let path = dir.join(file_name);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| format!("write failed: {e}"))?;
    Ok(path)
}

/// Write every attachment it can into `dir`.
pub async fn materialize<W>(
    web: &W,
    attachments: &[Attachment],
    dir: &Path,
    timeout: Duration,
) -> MaterializeReport
where
    W: WebClient + ?Sized,
{
    let outcomes = join_all(
        attachments
            .iter()
            .map(|attachment| materialize_one(web, attachment, dir, timeout)),
    )
    .await;

    let mut report = MaterializeReport::default();
    for (attachment, outcome) in attachments.iter().zip(outcomes) {
        match outcome {
            Ok(path) => {
                info!(name = %attachment.name, "[MATERIALIZE] attachment saved");
                report.saved.push(path);
            }
            Err(reason) => {
                warn!(name = %attachment.name, reason = %reason, "[MATERIALIZE] attachment skipped");
                report.skipped.push((attachment.name.clone(), reason));
            }
        }
    }
    report
}
