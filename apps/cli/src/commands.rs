//! CLI command definitions, routing, and tracing setup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use brandlens_client::{OpenAiClient, OpenAiOptions};
use brandlens_core::report::{overall_hitrate, summarize_records};
use brandlens_core::{BrandDetector, RunAggregator, RunProgress};
use brandlens_shared::{
    AppConfig, BrandSet, PromptSummary, RunRecord, init_config, load_config, load_config_from,
    validate_api_key,
};
use brandlens_storage::JsonlLog;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// BrandLens: measure how often brands show up in AI answers.
#[derive(Parser)]
#[command(
    name = "brandlens",
    version,
    about = "Query a generative-AI model repeatedly and measure brand mention hit-rates.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.brandlens/brandlens.toml).
    #[arg(long, global = true, env = "BRANDLENS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run prompts against the model and record brand mentions.
    Run {
        /// Prompt to run (repeatable).
        #[arg(short, long = "prompt")]
        prompts: Vec<String>,

        /// File with one prompt per line (blank lines and `#` comments skipped).
        #[arg(short = 'f', long)]
        prompts_file: Option<PathBuf>,

        /// Runs per prompt.
        #[arg(short, long)]
        runs: Option<u32>,

        /// Sampling temperature.
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Run log path (JSON lines, appended).
        #[arg(long)]
        log: Option<PathBuf>,

        /// Brands to track (comma-separated), overriding the config.
        #[arg(long, value_delimiter = ',')]
        brands: Vec<String>,

        /// Print summaries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Recompute hit-rates from an existing run log.
    Report {
        /// Run log path.
        #[arg(long)]
        log: Option<PathBuf>,

        /// Brands to report on (comma-separated), overriding the config.
        #[arg(long, value_delimiter = ',')]
        brands: Vec<String>,

        /// Print summaries as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the configured brand set.
    Brands,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "brandlens=info",
        1 => "brandlens=debug",
        _ => "brandlens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Run {
            prompts,
            prompts_file,
            runs,
            temperature,
            log,
            brands,
            json,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            let opts = RunOpts {
                prompts,
                prompts_file,
                runs,
                temperature,
                log,
                brands,
                json,
            };
            cmd_run(&config, opts).await
        }
        Command::Report { log, brands, json } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_report(&config, log, &brands, json)
        }
        Command::Brands => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_brands(&config)
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

/// Brand set from `--brands`, or the config when the flag is absent.
fn resolve_brands(config: &AppConfig, flag: &[String]) -> Result<BrandSet> {
    let brands = if flag.is_empty() {
        config.brand_set()?
    } else {
        BrandSet::from_names(flag)?
    };
    Ok(brands)
}

fn resolve_log(config: &AppConfig, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| PathBuf::from(&config.defaults.log_path))
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

struct RunOpts {
    prompts: Vec<String>,
    prompts_file: Option<PathBuf>,
    runs: Option<u32>,
    temperature: Option<f32>,
    log: Option<PathBuf>,
    brands: Vec<String>,
    json: bool,
}

async fn cmd_run(config: &AppConfig, opts: RunOpts) -> Result<()> {
    let mut prompts: Vec<String> = opts
        .prompts
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    if let Some(file) = &opts.prompts_file {
        let content = std::fs::read_to_string(file)
            .wrap_err_with(|| format!("cannot read prompts file '{}'", file.display()))?;
        prompts.extend(parse_prompts(&content));
    }
    if prompts.is_empty() {
        return Err(eyre!("no prompts given: use --prompt or --prompts-file"));
    }

    let runs = opts.runs.unwrap_or(config.defaults.runs);
    if runs == 0 {
        return Err(eyre!("--runs must be at least 1"));
    }
    let temperature =
        validate_temperature(opts.temperature.unwrap_or(config.defaults.temperature))?;
    let brands = resolve_brands(config, &opts.brands)?;
    let log_path = resolve_log(config, opts.log);

    // Validate API key before doing anything
    let api_key = validate_api_key(config)?;
    let client = OpenAiClient::new(OpenAiOptions {
        base_url: config.base_url()?,
        api_key,
        model: config.openai.model.clone(),
        timeout_secs: config.openai.timeout_secs,
    })?;

    info!(
        prompts = prompts.len(),
        runs,
        temperature,
        brands = brands.len(),
        log = %log_path.display(),
        "starting brand visibility run"
    );

    let aggregator = RunAggregator::new(BrandDetector::new(brands.clone()));
    let mut sink = JsonlLog::new(&log_path);
    let reporter = CliProgress::new();

    let result = aggregator
        .run(&client, &prompts, runs, temperature, &mut sink, &reporter)
        .await;
    reporter.finish();
    let outcome = result?;

    if opts.json {
        let out = serde_json::json!({
            "total_records": outcome.total_records,
            "summaries": outcome.summaries,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        print_summaries(&brands, &outcome.summaries, None);
        println!();
        println!("  Records: {}", outcome.total_records);
        println!("  Log:     {}", log_path.display());
        println!();
    }

    Ok(())
}

/// Sampling temperature range accepted by the chat-completions API.
const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

fn validate_temperature(temperature: f32) -> Result<f32> {
    if TEMPERATURE_RANGE.contains(&temperature) {
        Ok(temperature)
    } else {
        Err(eyre!(
            "--temperature must be between {} and {}, got {temperature}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end()
        ))
    }
}

/// One prompt per non-blank line; `#` starts a comment line.
fn parse_prompts(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

fn cmd_report(
    config: &AppConfig,
    log: Option<PathBuf>,
    brands_flag: &[String],
    json: bool,
) -> Result<()> {
    let brands = resolve_brands(config, brands_flag)?;
    let log_path = resolve_log(config, log);

    let records: Vec<RunRecord> = JsonlLog::new(&log_path).read_records()?;
    info!(log = %log_path.display(), records = records.len(), "building report");

    let summaries = summarize_records(&records, &brands);
    let overall = overall_hitrate(&records, &brands);

    if json {
        let out = serde_json::json!({
            "total_records": records.len(),
            "summaries": summaries,
            "overall": overall,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No runs recorded in {}", log_path.display());
        return Ok(());
    }

    println!();
    print_summaries(&brands, &summaries, Some(&overall));
    println!();
    println!("  Records: {}", records.len());
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Maximum prompt characters shown in the summary table.
const PROMPT_COLUMN_WIDTH: usize = 48;

fn print_summaries(
    brands: &BrandSet,
    summaries: &[PromptSummary],
    overall: Option<&BTreeMap<String, f64>>,
) {
    print!("  {:<width$} {:>5}", "Prompt", "Runs", width = PROMPT_COLUMN_WIDTH);
    for brand in brands.iter() {
        print!(" {brand:>10}");
    }
    println!();

    for summary in summaries {
        print!(
            "  {:<width$} {:>5}",
            truncate_prompt(&summary.prompt),
            summary.runs,
            width = PROMPT_COLUMN_WIDTH
        );
        print_rates(brands, &summary.hitrate);
    }

    if let Some(overall) = overall {
        print!("  {:<width$} {:>5}", "(all prompts)", "", width = PROMPT_COLUMN_WIDTH);
        print_rates(brands, overall);
    }
}

fn print_rates(brands: &BrandSet, rates: &BTreeMap<String, f64>) {
    for brand in brands.iter() {
        let rate = rates.get(brand).copied().unwrap_or(0.0);
        print!(" {:>9.1}%", rate * 100.0);
    }
    println!();
}

fn truncate_prompt(prompt: &str) -> String {
    let single_line = prompt.replace('\n', " ");
    if single_line.chars().count() <= PROMPT_COLUMN_WIDTH {
        single_line
    } else {
        let head: String = single_line.chars().take(PROMPT_COLUMN_WIDTH - 3).collect();
        format!("{head}...")
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl RunProgress for CliProgress {
    fn prompt_started(&self, prompt: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("Prompt [{index}/{total}] {}", truncate_prompt(prompt)));
    }

    fn run_completed(&self, record: &RunRecord, completed: usize, total: usize) {
        let mentioned = record.brands.mentioned();
        let mentioned = if mentioned.is_empty() {
            "no brands".to_string()
        } else {
            mentioned.join(", ")
        };
        self.spinner.set_message(format!(
            "Run [{completed}/{total}] run {} of '{}': {mentioned}",
            record.run_index,
            truncate_prompt(&record.prompt)
        ));
    }

    fn prompt_finished(&self, summary: &PromptSummary) {
        self.spinner.println(format!(
            "  done: {} ({} runs)",
            truncate_prompt(&summary.prompt),
            summary.runs
        ));
    }
}

// ---------------------------------------------------------------------------
// brands / config
// ---------------------------------------------------------------------------

fn cmd_brands(config: &AppConfig) -> Result<()> {
    let brands = config.brand_set()?;
    for brand in brands.iter() {
        println!("{brand}");
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_file_skips_blanks_and_comments() {
        let content = "# header\nbest notes app?\n\n   \n  which wiki tool?  \n#skip\n";
        assert_eq!(
            parse_prompts(content),
            vec!["best notes app?".to_string(), "which wiki tool?".to_string()]
        );
    }

    #[test]
    fn temperature_outside_service_range_is_rejected() {
        assert_eq!(validate_temperature(0.0).unwrap(), 0.0);
        assert_eq!(validate_temperature(0.7).unwrap(), 0.7);
        assert_eq!(validate_temperature(2.0).unwrap(), 2.0);
        assert!(validate_temperature(-1.0).is_err());
        assert!(validate_temperature(5.0).is_err());
        assert!(validate_temperature(f32::NAN).is_err());
    }

    #[test]
    fn long_prompts_are_truncated() {
        let long = "x".repeat(PROMPT_COLUMN_WIDTH + 10);
        let shown = truncate_prompt(&long);
        assert_eq!(shown.chars().count(), PROMPT_COLUMN_WIDTH);
        assert!(shown.ends_with("..."));
        assert_eq!(truncate_prompt("a\nb"), "a b");
    }

    #[test]
    fn brands_flag_overrides_config() {
        let config = AppConfig::default();
        let flag = vec!["Acme".to_string()];
        let brands = resolve_brands(&config, &flag).unwrap();
        assert_eq!(brands.names(), &["acme".to_string()]);

        let from_config = resolve_brands(&config, &[]).unwrap();
        assert_eq!(from_config.len(), config.brands.names.len());
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "brandlens",
            "run",
            "-p",
            "best notes app?",
            "--runs",
            "5",
            "--brands",
            "notion,evernote",
        ])
        .unwrap();
        match cli.command {
            Command::Run { prompts, runs, brands, .. } => {
                assert_eq!(prompts, vec!["best notes app?".to_string()]);
                assert_eq!(runs, Some(5));
                assert_eq!(brands, vec!["notion".to_string(), "evernote".to_string()]);
            }
            _ => panic!("expected run"),
        }
    }
}
