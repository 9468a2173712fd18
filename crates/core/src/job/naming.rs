//! Deterministic job names derived from source commits.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use sha2::{Digest, Sha256};

/// Training backends cap job names at 63 characters.
pub const MAX_JOB_NAME_LEN: usize = 63;

const PREFIX: &str = "job-";
const SUFFIX_HASH_LEN: usize = 8;

static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9-]+").expect("static pattern compiles"));

fn sanitize(commit: &str, max_len: usize) -> String {
    let replaced = DISALLOWED.replace_all(commit.trim(), "-");
    let trimmed = replaced.trim_matches('-');
    let mut name: String = trimmed.chars().take(max_len).collect();
    while name.ends_with('-') {
        name.pop();
    }
    if name.is_empty() {
        "unknown".to_string()
    } else {
        name
    }
}

/// `job-<commit>`, sanitized to `[A-Za-z0-9-]` and capped at [`MAX_JOB_NAME_LEN`].
pub fn base_job_name(source_commit: &str) -> String {
    format!(
        "{}{}",
        PREFIX,
        sanitize(source_commit, MAX_JOB_NAME_LEN - PREFIX.len())
    )
}

/// `job-<commit>-<hash8>`, used when the base name belongs to another execution.
///
/// The suffix is the first eight hex characters of SHA-256(`execution_id`), so
/// redelivery of the same execution always lands on the same name.
pub fn suffixed_job_name(source_commit: &str, execution_id: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(execution_id.as_bytes()));
    let hash = &digest[..SUFFIX_HASH_LEN];
    let room = MAX_JOB_NAME_LEN - PREFIX.len() - 1 - SUFFIX_HASH_LEN;
    format!("{}{}-{}", PREFIX, sanitize(source_commit, room), hash)
}
