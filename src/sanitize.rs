//! Cleanup of upstream dataset text before JSON parsing.
//!
//! The upstream portal occasionally embeds raw control characters and stray
//! layout escapes (`\t`, `\r`, `\n`, `\v`, `\h`) inside string values.
//! Control characters spelled as `\u` escapes (`\u000a`, `\u007f`) are
//! dropped as well; other `\u` escapes are kept.
use crate::error::PipelineError;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

fn escape_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Matches whole escape pairs so `\\t` (escaped backslash, then `t`) survives.
    PATTERN.get_or_init(|| {
        Regex::new(r"\\(\\|[trnvh]|u00[01][0-9a-fA-F]|u007[fF])").expect("valid escape pattern")
    })
}

/// Strip control characters and layout escapes from raw text.
pub fn sanitize_text(raw: &str) -> String {
    let without_controls: String = raw.chars().filter(|ch| !ch.is_ascii_control()).collect();
    escape_pattern()
        .replace_all(&without_controls, |caps: &Captures<'_>| {
            if &caps[1] == "\\" {
                r"\\".to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Sanitize and parse raw dataset text.
pub fn parse_sanitized(raw: &str) -> Result<Value, PipelineError> {
    let text = sanitize_text(raw);
    serde_json::from_str(&text).map_err(|err| {
        PipelineError::MalformedInput(format!(
            "{err} (line {}, column {})",
            err.line(),
            err.column()
        ))
    })
}
