//! Brand mention detection.
//!
//! Matching is plain case-folded substring containment against the answer
//! and every source URL. There is no tokenization or word-boundary check,
//! so `mem` matches inside `member`.

use brandlens_shared::{BrandPresenceMap, BrandSet};

/// Scores answers against a fixed brand set.
#[derive(Debug, Clone)]
pub struct BrandDetector {
    brands: BrandSet,
}

impl BrandDetector {
    pub fn new(brands: BrandSet) -> Self {
        Self { brands }
    }

    pub fn brands(&self) -> &BrandSet {
        &self.brands
    }

    /// Flag each configured brand found in `answer` or any of `sources`.
    ///
    /// The returned map always has one entry per configured brand.
    pub fn detect<S: AsRef<str>>(&self, answer: &str, sources: &[S]) -> BrandPresenceMap {
        let answer = answer.to_lowercase();
        let sources: Vec<String> = sources.iter().map(|s| s.as_ref().to_lowercase()).collect();

        self.brands
            .iter()
            .map(|brand| {
                let needle = brand.to_lowercase();
                let hit = answer.contains(&needle) || sources.iter().any(|s| s.contains(&needle));
                (brand.to_string(), hit)
            })
            .collect()
    }
}
