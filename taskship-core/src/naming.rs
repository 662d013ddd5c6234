//! Deterministic repository naming.
//!
//! The derived name is the only idempotency mechanism: resubmitting the same
//! task from the same requester always lands on the same repository.

use std::sync::OnceLock;

use regex::Regex;
use sha1::{Digest, Sha1};

const MAX_SLUG_LEN: usize = 60;
const HASH_PREFIX_LEN: usize = 6;

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static slug pattern"))
}

/// Lowercase, collapse runs of anything outside `[a-z0-9]` to `-`, trim, cap at 60 chars.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let replaced = non_alphanumeric().replace_all(&lowered, "-");
    replaced
        .trim_matches('-')
        .chars()
        .take(MAX_SLUG_LEN)
        .collect()
}

/// `slug(task)-slug(local part of email)-<first 6 hex of sha1("{email}-{task}")>`.
pub fn derive_repo_name(task: &str, email: &str) -> String {
    let local_part = email.split('@').next().unwrap_or(email);
    let mut hasher = Sha1::new();
    hasher.update(format!("{email}-{task}").as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!(
        "{}-{}-{}",
        slugify(task),
        slugify(local_part),
        &digest[..HASH_PREFIX_LEN]
    )
}
