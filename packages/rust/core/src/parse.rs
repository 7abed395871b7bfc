//! Turn a raw completion into an answer plus sources.
//!
//! Parsing never fails. When no JSON object can be recovered the raw text
//! itself becomes the answer, so brand detection still sees everything the
//! model said.

use brandlens_shared::ParsedOutput;
use serde_json::Value;

use crate::extract::extract_json_candidate;
use crate::sources::normalize_sources;

/// Outcome of parsing one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A JSON object was recovered and read.
    Structured(ParsedOutput),
    /// No usable JSON object; `answer` holds the raw text, `sources` is empty.
    Fallback(ParsedOutput),
}

impl ParseResult {
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    pub fn output(&self) -> &ParsedOutput {
        match self {
            Self::Structured(out) | Self::Fallback(out) => out,
        }
    }

    pub fn into_output(self) -> ParsedOutput {
        match self {
            Self::Structured(out) | Self::Fallback(out) => out,
        }
    }

    /// Short label for logs.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Structured(_) => "structured",
            Self::Fallback(_) => "fallback",
        }
    }
}

/// Parse raw model output.
///
/// The `answer` field is taken verbatim when it is a string, read as `""`
/// when absent or `null`, and rendered as compact JSON for any other value.
pub fn parse_model_output(raw: &str) -> ParseResult {
    let candidate = extract_json_candidate(raw);
    if candidate.is_empty() {
        return fallback(raw);
    }

    let object = match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => map,
        _ => return fallback(raw),
    };

    let answer = match object.get("answer") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    ParseResult::Structured(ParsedOutput {
        answer,
        sources: normalize_sources(object.get("sources")),
    })
}

fn fallback(raw: &str) -> ParseResult {
    ParseResult::Fallback(ParsedOutput {
        answer: raw.to_string(),
        sources: Vec::new(),
    })
}
