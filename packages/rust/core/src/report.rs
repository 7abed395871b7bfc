//! Rebuild hit-rate summaries from persisted run records.

use std::collections::BTreeMap;

use brandlens_shared::{BrandSet, PromptSummary, RunRecord};

use crate::aggregate::HitTally;

/// Per-prompt summaries, in order of each prompt's first appearance.
///
/// Hit-rates are computed for `brands`, so a log written with a different
/// brand set still summarizes cleanly: brands a record never scored count
/// as not mentioned.
pub fn summarize_records(records: &[RunRecord], brands: &BrandSet) -> Vec<PromptSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut tallies: BTreeMap<&str, HitTally> = BTreeMap::new();

    for record in records {
        let tally = tallies.entry(record.prompt.as_str()).or_insert_with(|| {
            order.push(record.prompt.as_str());
            HitTally::new(brands)
        });
        tally.record(&record.brands);
    }

    order
        .into_iter()
        .filter_map(|prompt| tallies.remove(prompt).map(|t| t.into_summary(prompt)))
        .collect()
}

/// Hit-rates across every record, regardless of prompt.
pub fn overall_hitrate(records: &[RunRecord], brands: &BrandSet) -> BTreeMap<String, f64> {
    let mut tally = HitTally::new(brands);
    for record in records {
        tally.record(&record.brands);
    }
    tally.hitrates()
}
