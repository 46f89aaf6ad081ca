//! Pull a JSON payload out of free-form model output.
//!
//! Models wrap their JSON in markdown fences, prose, or both. The candidate
//! text is picked in priority order:
//!
//! 1. the body of the first ```` ``` ```` / ```` ```json ```` fence,
//! 2. the first balanced `{ ... }` span,
//! 3. the whole output, trimmed.
//!
//! Once a fence matched, its body is the only candidate: a parse failure is
//! reported against the fence contents rather than retried on the full text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fence regex"));

/// Payload returned by the prompt-template route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedPayload {
    pub answer: String,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("model output is empty")]
    EmptyInput,
    #[error("malformed JSON payload: {source}")]
    MalformedJson {
        candidate: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ExtractError {
    /// Text that failed to parse, if any.
    pub fn candidate(&self) -> Option<&str> {
        match self {
            Self::EmptyInput => None,
            Self::MalformedJson { candidate, .. } => Some(candidate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    Fence,
    Braces,
    Whole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub text: &'a str,
    pub source: CandidateSource,
}

/// Select the text that should be parsed as JSON. Borrows from `raw`.
pub fn find_candidate(raw: &str) -> Candidate<'_> {
    if let Some(body) = FENCE.captures(raw).and_then(|c| c.get(1)) {
        return Candidate { text: body.as_str().trim(), source: CandidateSource::Fence };
    }
    if let Some(span) = balanced_braces(raw) {
        return Candidate { text: span, source: CandidateSource::Braces };
    }
    Candidate { text: raw.trim(), source: CandidateSource::Whole }
}

/// First `{` up to the `}` that brings the depth back to zero, inclusive.
/// Braces inside JSON string literals do not count.
fn balanced_braces(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_str = false;
    let mut escaped = false;
    for (i, ch) in s[start..].char_indices() {
        if in_str {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_str = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Decode the payload embedded in `raw` into any deserializable type.
pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Result<T, ExtractError> {
    if raw.trim().is_empty() {
        return Err(ExtractError::EmptyInput);
    }
    let candidate = find_candidate(raw);
    tracing::debug!(source = ?candidate.source, len = candidate.text.len(), "json candidate");
    serde_json::from_str(candidate.text).map_err(|source| ExtractError::MalformedJson {
        candidate: candidate.text.to_string(),
        source,
    })
}

pub fn extract(raw: &str) -> Result<ExtractedPayload, ExtractError> {
    extract_as(raw)
}
