//! Shared helpers for provider adapters
//!
//! Key masking and error scrubbing used by every adapter so that credentials
//! can never leak through logs or error payloads.

/// Minimum key length to display partial key
const MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY: usize = 8;

/// Number of characters to show at start/end of masked key
const KEY_MASK_VISIBLE_CHARS: usize = 4;

/// Known provider key prefixes, longest first so the most specific wins.
///
/// A prefix carries no secret material; keeping it visible makes it obvious
/// in logs which provider's key was used.
const KEY_PREFIXES: &[&str] = &["sk-ant-", "sk-proj-", "sk-"];

/// Sensitive patterns to filter from upstream error messages
const SENSITIVE_PATTERNS: &[&str] = &[
    "api_key",
    "api-key",
    "apikey",
    "authorization",
    "bearer",
    "token",
    "secret",
    "password",
    "credential",
    "sk-",
];

/// Mask an API key for safe display in logs.
///
/// Keys that start with a recognized provider prefix keep the prefix and the
/// last 4 characters; other keys show the first 4 and last 4. Keys of 8
/// characters or fewer become `"****"` so short keys are never partially
/// revealed.
///
/// # Examples
/// ```
/// use daygent_llm::util::mask_api_key;
/// assert_eq!(mask_api_key("sk-ant-api03-1234abcd"), "sk-ant-...abcd");
/// assert_eq!(mask_api_key("AKIA1234567890XYZW"), "AKIA...XYZW");
/// assert_eq!(mask_api_key("short"), "****");
/// ```
#[must_use]
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= MIN_KEY_LENGTH_FOR_PARTIAL_DISPLAY {
        return "****".to_string();
    }

    let tail: String = chars[chars.len() - KEY_MASK_VISIBLE_CHARS..]
        .iter()
        .collect();
    let head: String = match KEY_PREFIXES
        .iter()
        .find(|p| key.starts_with(**p) && chars.len() > p.len() + KEY_MASK_VISIBLE_CHARS)
    {
        Some(prefix) => (*prefix).to_string(),
        None => chars[..KEY_MASK_VISIBLE_CHARS].iter().collect(),
    };

    format!("{}...{}", head, tail)
}

/// Scrub an upstream error body before it reaches a caller-visible payload.
///
/// Upstream APIs occasionally echo credentials back in error bodies. If the
/// message contains anything credential-shaped the whole body is replaced
/// with a generic message rather than risking a partial leak.
///
/// # Examples
/// ```
/// use daygent_llm::util::sanitize_api_error;
/// assert_eq!(
///     sanitize_api_error("Incorrect api_key provided: sk-abc123"),
///     "Upstream API error. Please try again."
/// );
/// assert_eq!(sanitize_api_error("model not found"), "model not found");
/// ```
#[must_use]
pub fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    for pattern in SENSITIVE_PATTERNS {
        if lower.contains(pattern) {
            return "Upstream API error. Please try again.".to_string();
        }
    }

    error.to_string()
}
