//! Request validation and prompt sanitization
//!
//! Validation rejects malformed requests before any network layer is reached.
//! Sanitization is a separate, always-applied transform that silently degrades
//! dangerous content; it never rejects.

use crate::request::ChatRequest;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;
use thiserror::Error;

/// Maximum model identifier length, in characters
pub const MAX_MODEL_LEN: usize = 100;
/// Maximum number of messages per request
pub const MAX_MESSAGES: usize = 100;
/// Maximum content length per message, in characters
pub const MAX_CONTENT_LEN: usize = 100_000;
/// Maximum allowed `max_tokens`
pub const MAX_MAX_TOKENS: u32 = 100_000;

/// A single violated constraint
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldViolation {
    /// Offending field, e.g. `messages[3].content`
    pub field: String,
    /// What was wrong with it
    pub message: String,
}

/// Structured validation failure listing every violated constraint
#[derive(Debug, Clone, Serialize, Error)]
pub struct ValidationError {
    /// All violations found in one pass
    pub violations: Vec<FieldViolation>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let summary = self
            .violations
            .iter()
            .map(|v| format!("{} ({})", v.field, v.message))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "request validation failed: {}", summary)
    }
}

/// Validate a normalized request against the proxy's input constraints.
///
/// Collects every violation rather than stopping at the first, so callers
/// can surface a complete picture to the user.
pub fn validate(request: &ChatRequest) -> Result<(), ValidationError> {
    let mut violations = Vec::new();

    if request.model.is_empty() {
        violations.push(FieldViolation {
            field: "model".to_string(),
            message: "must not be empty".to_string(),
        });
    } else if request.model.chars().count() > MAX_MODEL_LEN {
        violations.push(FieldViolation {
            field: "model".to_string(),
            message: format!("must be at most {} characters", MAX_MODEL_LEN),
        });
    }

    if request.messages.is_empty() {
        violations.push(FieldViolation {
            field: "messages".to_string(),
            message: "must contain at least one message".to_string(),
        });
    } else if request.messages.len() > MAX_MESSAGES {
        violations.push(FieldViolation {
            field: "messages".to_string(),
            message: format!("must contain at most {} messages", MAX_MESSAGES),
        });
    }

    for (i, msg) in request.messages.iter().enumerate() {
        if msg.content.is_empty() {
            violations.push(FieldViolation {
                field: format!("messages[{}].content", i),
                message: "must not be empty".to_string(),
            });
        } else if msg.content.chars().count() > MAX_CONTENT_LEN {
            violations.push(FieldViolation {
                field: format!("messages[{}].content", i),
                message: format!("must be at most {} characters", MAX_CONTENT_LEN),
            });
        }
    }

    if let Some(t) = request.temperature {
        if !(0.0..=2.0).contains(&t) || t.is_nan() {
            violations.push(FieldViolation {
                field: "temperature".to_string(),
                message: "must be between 0 and 2".to_string(),
            });
        }
    }

    if let Some(m) = request.max_tokens {
        if m == 0 || m > MAX_MAX_TOKENS {
            violations.push(FieldViolation {
                field: "max_tokens".to_string(),
                message: format!("must be between 1 and {}", MAX_MAX_TOKENS),
            });
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { violations })
    }
}

fn template_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{.*?\}\}").unwrap())
}

fn script_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Matches complete open+close pairs only. An unclosed <script> tag is
    // left untouched; a documented limitation of the sanitizer.
    RE.get_or_init(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap())
}

fn js_protocol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)javascript:").unwrap())
}

fn event_handler_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bon\w+\s*=").unwrap())
}

fn whitespace_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{3,}").unwrap())
}

/// Strip all dangerous patterns until the text stops changing.
///
/// A single pass can splice two fragments into a fresh match (removing
/// `onclick=` from `javonclick=ascript:` leaves `javascript:`), which would
/// break sanitizer idempotence.
fn strip_dangerous(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = template_marker_re().replace_all(&current, "").to_string();
        next = script_block_re().replace_all(&next, "").to_string();
        next = js_protocol_re().replace_all(&next, "").to_string();
        next = event_handler_re().replace_all(&next, "").to_string();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Sanitize prompt content before dispatch.
///
/// Applied to every message; never fails, silently degrades content that
/// matches a dangerous pattern:
/// - strips null bytes
/// - removes `{{...}}` template-injection markers
/// - strips complete `<script>...</script>` blocks
/// - removes `javascript:` protocol strings
/// - removes inline event-handler patterns (`on*=`)
/// - collapses runs of 3+ whitespace characters to two spaces, then trims
#[must_use]
pub fn sanitize_prompt_content(content: &str) -> String {
    let without_nulls: String = content.chars().filter(|c| *c != '\0').collect();

    let mut text = strip_dangerous(&without_nulls);
    text = whitespace_run_re().replace_all(&text, "  ").to_string();
    text.trim().to_string()
}

/// Sanitize every message of a request in place.
pub fn sanitize_request(request: &mut ChatRequest) {
    for msg in &mut request.messages {
        msg.content = sanitize_prompt_content(&msg.content);
    }
}
