//! Repeated-run orchestration and hit-rate aggregation.
//!
//! For every prompt the aggregator performs `runs` sequential cycles of
//! query → parse → detect → append, folding each run's presence map into a
//! [`HitTally`]. Once a prompt's runs are done the tally is finalized into a
//! [`PromptSummary`].
//!
//! Any query or sink error aborts the whole batch. Records appended before
//! the failure stay in the log; a silently skipped run would skew the
//! hit-rate denominators.

use std::collections::BTreeMap;

use brandlens_client::QueryClient;
use brandlens_shared::{
    BrandLensError, BrandPresenceMap, BrandSet, PromptSummary, Result, RunRecord,
};
use brandlens_storage::RunSink;
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::detect::BrandDetector;
use crate::parse::parse_model_output;

// ---------------------------------------------------------------------------
// HitTally
// ---------------------------------------------------------------------------

/// Running per-brand mention counts for one group of runs.
#[derive(Debug, Clone)]
pub struct HitTally {
    runs: usize,
    hits: BTreeMap<String, usize>,
}

impl HitTally {
    /// Empty tally with a zero count for every brand.
    pub fn new(brands: &BrandSet) -> Self {
        Self {
            runs: 0,
            hits: brands.iter().map(|b| (b.to_string(), 0)).collect(),
        }
    }

    /// Count one run. Brands missing from `presence` count as not mentioned;
    /// brands outside the tally's set are ignored.
    pub fn record(&mut self, presence: &BrandPresenceMap) {
        self.runs += 1;
        for (brand, count) in self.hits.iter_mut() {
            if presence.is_mentioned(brand) {
                *count += 1;
            }
        }
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Fraction of runs mentioning each brand; all zeros when no runs were counted.
    pub fn hitrates(&self) -> BTreeMap<String, f64> {
        self.hits
            .iter()
            .map(|(brand, &count)| {
                let rate = if self.runs == 0 {
                    0.0
                } else {
                    count as f64 / self.runs as f64
                };
                (brand.clone(), rate)
            })
            .collect()
    }

    pub fn into_summary(self, prompt: impl Into<String>) -> PromptSummary {
        PromptSummary {
            prompt: prompt.into(),
            runs: self.runs,
            hitrate: self.hitrates(),
        }
    }
}

// ---------------------------------------------------------------------------
// Progress trait
// ---------------------------------------------------------------------------

/// Progress callback for batch runs.
pub trait RunProgress: Send + Sync {
    /// A prompt is about to start. `index` is 1-based.
    fn prompt_started(&self, prompt: &str, index: usize, total: usize);
    /// One run finished and was recorded.
    fn run_completed(&self, record: &RunRecord, completed: usize, total: usize);
    /// All runs for a prompt are done.
    fn prompt_finished(&self, summary: &PromptSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentRunProgress;

impl RunProgress for SilentRunProgress {
    fn prompt_started(&self, _prompt: &str, _index: usize, _total: usize) {}
    fn run_completed(&self, _record: &RunRecord, _completed: usize, _total: usize) {}
    fn prompt_finished(&self, _summary: &PromptSummary) {}
}

// ---------------------------------------------------------------------------
// RunAggregator
// ---------------------------------------------------------------------------

/// Result of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// One summary per prompt, in input order.
    pub summaries: Vec<PromptSummary>,
    /// Records written to the sink.
    pub total_records: usize,
}

/// Drives repeated queries per prompt and aggregates brand hit-rates.
#[derive(Debug, Clone)]
pub struct RunAggregator {
    detector: BrandDetector,
}

impl RunAggregator {
    pub fn new(detector: BrandDetector) -> Self {
        Self { detector }
    }

    pub fn brands(&self) -> &BrandSet {
        self.detector.brands()
    }

    /// Run every prompt `runs` times and summarize brand hit-rates.
    ///
    /// `runs` must be at least 1. An empty prompt list issues no queries.
    #[instrument(skip_all, fields(prompts = prompts.len(), runs = runs, temperature = temperature, model = client.model_id()))]
    pub async fn run<C, S>(
        &self,
        client: &C,
        prompts: &[String],
        runs: u32,
        temperature: f32,
        sink: &mut S,
        progress: &dyn RunProgress,
    ) -> Result<RunOutcome>
    where
        C: QueryClient,
        S: RunSink,
    {
        if runs == 0 {
            return Err(BrandLensError::validation("runs must be at least 1"));
        }

        info!(prompts = prompts.len(), runs, "starting batch");

        let total_runs = prompts.len() * runs as usize;
        let mut total_records = 0;
        let mut summaries = Vec::with_capacity(prompts.len());

        for (idx, prompt) in prompts.iter().enumerate() {
            progress.prompt_started(prompt, idx + 1, prompts.len());
            let mut tally = HitTally::new(self.brands());

            for run_index in 1..=runs {
                let record = self
                    .run_once(client, prompt, run_index, temperature)
                    .await?;
                sink.append(&record)?;
                total_records += 1;

                tally.record(&record.brands);
                progress.run_completed(&record, total_records, total_runs);
            }

            let summary = tally.into_summary(prompt.as_str());
            info!(prompt = %prompt, runs = summary.runs, hitrate = ?summary.hitrate, "prompt complete");
            progress.prompt_finished(&summary);
            summaries.push(summary);
        }

        info!(total_records, "batch complete");

        Ok(RunOutcome {
            summaries,
            total_records,
        })
    }

    /// One query → parse → detect cycle.
    async fn run_once<C: QueryClient>(
        &self,
        client: &C,
        prompt: &str,
        run_index: u32,
        temperature: f32,
    ) -> Result<RunRecord> {
        let raw = client.query(prompt, temperature).await?;

        let parsed = parse_model_output(&raw);
        let mode = parsed.mode();
        let output = parsed.into_output();
        let sources = output.source_urls();
        let brands = self.detector.detect(&output.answer, &sources);

        debug!(
            run_index,
            mode,
            sources = sources.len(),
            mentioned = ?brands.mentioned(),
            "run parsed"
        );

        Ok(RunRecord {
            timestamp: Utc::now(),
            prompt: prompt.to_string(),
            run_index,
            model_id: client.model_id().to_string(),
            temperature,
            answer: output.answer,
            sources,
            brands,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
