// Copyright 2026 Dropbox (created by Andrew Yates <ayates@dropbox.com>)

//! Small helpers shared across the engine: outcome counting, backoff
//! computation, and safe JSON extraction from model output.

use crate::types::DimensionResult;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Success/failure/skip counts over a set of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    /// Results that carry a payload (or were substituted by a fallback hook).
    pub succeeded: usize,
    /// Results that carry an error.
    pub failed: usize,
    /// Results recorded as skipped.
    pub skipped: usize,
}

impl OutcomeCounts {
    /// Total slots counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    fn record(&mut self, result: &DimensionResult) {
        if result.is_error() {
            self.failed += 1;
        } else if result.is_skipped() {
            self.skipped += 1;
        } else {
            self.succeeded += 1;
        }
    }
}

/// Count outcomes across per-section and global result maps.
#[must_use]
pub fn count_outcomes(
    section_results: &HashMap<usize, HashMap<String, DimensionResult>>,
    global_results: &HashMap<String, DimensionResult>,
) -> OutcomeCounts {
    let mut counts = OutcomeCounts::default();
    for results in section_results.values() {
        for result in results.values() {
            counts.record(result);
        }
    }
    for result in global_results.values() {
        counts.record(result);
    }
    counts
}

/// Exponential backoff delay for a retry attempt: `base * 2^attempt`.
#[must_use]
pub fn exponential_backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Extract the first JSON value from model output.
///
/// Tries, in order: the whole string, fenced ```json blocks, and the first
/// balanced `{...}` or `[...]` span. String literals and escapes are honored
/// during the balance scan, so braces inside strings do not confuse it.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str(block.trim()) {
            return Some(value);
        }
    }

    balanced_span(trimmed).and_then(|span| serde_json::from_str(span).ok())
}

/// Contents of the first ``` fence, skipping an optional language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let rest = &text[start + 3..];
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].trim().chars().all(char::is_alphanumeric) => {
            &rest[newline + 1..]
        }
        _ => rest,
    };
    let end = body.find("```")?;
    Some(&body[..end])
}

/// First balanced `{...}` or `[...]` span in the text.
fn balanced_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
