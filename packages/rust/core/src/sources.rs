//! Normalize the many ways a model cites sources into [`SourceRecord`]s.
//!
//! Accepted shapes for the `sources` field:
//! - absent / `null` / `""` / `[]` → nothing
//! - a single string → one URL
//! - an array whose elements are strings or objects carrying a URL under
//!   `URL`, `url`, or `link` (checked in that order)
//!
//! Anything else is dropped silently. Order is preserved, duplicates kept.

use brandlens_shared::SourceRecord;
use serde_json::{Map, Value};

/// Keys that may hold a source URL, highest priority first.
const URL_KEYS: [&str; 3] = ["URL", "url", "link"];

/// The shape of a single citation entry, decided once.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceShape<'a> {
    /// A bare string, taken as the URL.
    SingleUrl(&'a str),
    /// An object that may carry the URL under one of [`URL_KEYS`].
    UrlObject(&'a Map<String, Value>),
    /// Numbers, booleans, nulls, nested arrays.
    Unsupported,
}

impl<'a> SourceShape<'a> {
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Self::SingleUrl(s),
            Value::Object(map) => Self::UrlObject(map),
            _ => Self::Unsupported,
        }
    }

    /// Resolve to a record, or `None` when no URL can be found.
    pub fn into_record(self) -> Option<SourceRecord> {
        match self {
            Self::SingleUrl(url) => non_blank(url).map(SourceRecord::new),
            Self::UrlObject(map) => URL_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str).and_then(non_blank))
                .map(SourceRecord::new),
            Self::Unsupported => None,
        }
    }
}

/// Normalize a raw `sources` value into an ordered list of records.
pub fn normalize_sources(value: Option<&Value>) -> Vec<SourceRecord> {
    match value {
        Some(Value::String(s)) => non_blank(s).map(SourceRecord::new).into_iter().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| SourceShape::classify(item).into_record())
            .collect(),
        _ => Vec::new(),
    }
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() { None } else { Some(s) }
}
