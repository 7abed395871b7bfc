//! Shared types, error model, and configuration for BrandLens.
//!
//! This crate is the foundation depended on by all other BrandLens crates.
//! It provides:
//! - [`BrandLensError`], the unified error type
//! - Domain types ([`RunRecord`], [`ParsedOutput`], [`BrandPresenceMap`], [`PromptSummary`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrandsConfig, DefaultsConfig, OpenAiConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{BrandLensError, Result};
pub use types::{
    BrandPresenceMap, BrandSet, ParsedOutput, PromptSummary, RunRecord, SourceRecord,
};
