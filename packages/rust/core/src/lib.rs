//! Response-processing pipeline for BrandLens.
//!
//! This crate turns raw model completions into brand-visibility data:
//! JSON extraction, source normalization, brand detection, and per-prompt
//! hit-rate aggregation across repeated runs.

pub mod aggregate;
pub mod detect;
pub mod extract;
pub mod parse;
pub mod report;
pub mod sources;

pub use aggregate::{HitTally, RunAggregator, RunOutcome, RunProgress, SilentRunProgress};
pub use detect::BrandDetector;
pub use parse::{ParseResult, parse_model_output};
