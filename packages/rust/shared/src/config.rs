//! Application configuration for BrandLens.
//!
//! User config lives at `~/.brandlens/brandlens.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{BrandLensError, Result};
use crate::types::BrandSet;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "brandlens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".brandlens";

// ---------------------------------------------------------------------------
// Config structs (matching brandlens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Batch defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// OpenAI-compatible endpoint settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Brands to track.
    #[serde(default)]
    pub brands: BrandsConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Runs per prompt.
    #[serde(default = "default_runs")]
    pub runs: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Append-only JSON-lines run log.
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            temperature: default_temperature(),
            log_path: default_log_path(),
        }
    }
}

fn default_runs() -> u32 {
    3
}
fn default_temperature() -> f32 {
    0.7
}
fn default_log_path() -> String {
    "data/runs.jsonl".into()
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model to query.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    60
}

/// `[brands]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrandsConfig {
    /// Brand names, matched case-insensitively.
    #[serde(default = "default_brand_names")]
    pub names: Vec<String>,
}

impl Default for BrandsConfig {
    fn default() -> Self {
        Self {
            names: default_brand_names(),
        }
    }
}

fn default_brand_names() -> Vec<String> {
    ["notion", "evernote", "obsidian", "roam", "mem", "glasp"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl AppConfig {
    /// Validated brand set from the `[brands]` section.
    pub fn brand_set(&self) -> Result<BrandSet> {
        BrandSet::from_names(&self.brands.names)
            .map_err(|e| BrandLensError::config(format!("[brands] {e}")))
    }

    /// Parsed `[openai].base_url`.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.openai.base_url).map_err(|e| {
            BrandLensError::config(format!(
                "invalid openai.base_url '{}': {e}",
                self.openai.base_url
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.brandlens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| BrandLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.brandlens/brandlens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| BrandLensError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        BrandLensError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| BrandLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| BrandLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| BrandLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the configured env var. Fails if unset or empty.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(BrandLensError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
