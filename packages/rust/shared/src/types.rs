//! Core domain types for brand-visibility runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BrandLensError, Result};

// ---------------------------------------------------------------------------
// BrandSet
// ---------------------------------------------------------------------------

/// The fixed, ordered list of brand names a batch is scored against.
///
/// Names are lowercased, trimmed and deduplicated (first occurrence wins).
/// An empty set or a blank name is rejected, since an empty needle would
/// match every answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct BrandSet(Vec<String>);

impl BrandSet {
    /// Build a brand set from user-supplied names.
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut brands: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim().to_lowercase();
            if name.is_empty() {
                return Err(BrandLensError::validation("brand names must not be blank"));
            }
            if !brands.contains(&name) {
                brands.push(name);
            }
        }

        if brands.is_empty() {
            return Err(BrandLensError::validation(
                "at least one brand must be configured",
            ));
        }

        Ok(Self(brands))
    }

    /// Brand names in configured order.
    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for BrandSet {
    type Error = BrandLensError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::from_names(names)
    }
}

impl From<BrandSet> for Vec<String> {
    fn from(set: BrandSet) -> Self {
        set.0
    }
}

// ---------------------------------------------------------------------------
// SourceRecord
// ---------------------------------------------------------------------------

/// A single cited source, normalized to a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(rename = "URL")]
    pub url: String,
}

impl SourceRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

// ---------------------------------------------------------------------------
// ParsedOutput
// ---------------------------------------------------------------------------

/// The answer text and cited sources recovered from one model completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOutput {
    pub answer: String,
    #[serde(default)]
    pub sources: Vec<SourceRecord>,
}

impl ParsedOutput {
    /// Source URLs in citation order.
    pub fn source_urls(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.url.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// BrandPresenceMap
// ---------------------------------------------------------------------------

/// Per-run "was this brand mentioned" flags, one entry per configured brand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrandPresenceMap(BTreeMap<String, bool>);

impl BrandPresenceMap {
    /// Whether `brand` was flagged present. Unknown brands read as absent.
    pub fn is_mentioned(&self, brand: &str) -> bool {
        self.0.get(brand).copied().unwrap_or(false)
    }

    pub fn get(&self, brand: &str) -> Option<bool> {
        self.0.get(brand).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of the brands flagged present.
    pub fn mentioned(&self) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, hit)| **hit)
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

impl FromIterator<(String, bool)> for BrandPresenceMap {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// RunRecord
// ---------------------------------------------------------------------------

/// One line of the run log: the full outcome of a single query cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// When the run completed.
    pub timestamp: DateTime<Utc>,
    /// The prompt as submitted.
    pub prompt: String,
    /// 1-based run number within this prompt.
    pub run_index: u32,
    /// Model identifier reported by the query client.
    pub model_id: String,
    /// Sampling temperature used for the query.
    pub temperature: f32,
    /// Parsed answer text (raw text on fallback).
    pub answer: String,
    /// Cited source URLs, in citation order.
    #[serde(default)]
    pub sources: Vec<String>,
    /// Brand presence for this run.
    pub brands: BrandPresenceMap,
}

// ---------------------------------------------------------------------------
// PromptSummary
// ---------------------------------------------------------------------------

/// Per-brand hit-rates for one prompt across its runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSummary {
    pub prompt: String,
    /// Number of runs tallied.
    pub runs: usize,
    /// Fraction of runs mentioning each brand, in `[0, 1]`.
    pub hitrate: BTreeMap<String, f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_set_normalizes_names() {
        let set = BrandSet::from_names(["Notion", " evernote ", "notion"]).unwrap();
        assert_eq!(set.names(), &["notion".to_string(), "evernote".to_string()]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn brand_set_rejects_blank_and_empty() {
        assert!(BrandSet::from_names(["notion", "  "]).is_err());
        assert!(BrandSet::from_names(Vec::<String>::new()).is_err());
    }

    #[test]
    fn brand_set_deserializes_with_validation() {
        let set: BrandSet = serde_json::from_str(r#"["Obsidian","roam"]"#).unwrap();
        assert_eq!(set.names(), &["obsidian".to_string(), "roam".to_string()]);

        let bad: std::result::Result<BrandSet, _> = serde_json::from_str("[]");
        assert!(bad.is_err());
    }

    #[test]
    fn source_record_uses_upper_case_key() {
        let json = serde_json::to_string(&SourceRecord::new("http://a.com")).unwrap();
        assert_eq!(json, r#"{"URL":"http://a.com"}"#);
    }

    #[test]
    fn presence_map_lookup() {
        let map: BrandPresenceMap = [("notion".to_string(), true), ("mem".to_string(), false)]
            .into_iter()
            .collect();
        assert!(map.is_mentioned("notion"));
        assert!(!map.is_mentioned("mem"));
        assert!(!map.is_mentioned("roam"));
        assert_eq!(map.get("roam"), None);
        assert_eq!(map.mentioned(), vec!["notion"]);
    }

    #[test]
    fn run_record_serialization() {
        let record = RunRecord {
            timestamp: Utc::now(),
            prompt: "best note-taking app?".into(),
            run_index: 1,
            model_id: "gpt-4o-mini".into(),
            temperature: 0.7,
            answer: "Notion is popular.".into(),
            sources: vec!["https://notion.so".into()],
            brands: [("notion".to_string(), true)].into_iter().collect(),
        };

        let json = serde_json::to_string(&record).expect("serialize");
        assert!(json.contains(r#""brands":{"notion":true}"#));
        assert!(!json.contains('\n'));

        let parsed: RunRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, record);
    }
}
