//! CLI command definitions, routing, and tracing setup.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use ethicsgen_core::{
    Agent, AgentSettings, GenerateJob, GenerateOptions, GenerateSummary, GenerationReport,
    OllamaClient, ProgressReporter, PromptTemplate, TrainingFormat, run_generate, validate_file,
};
use ethicsgen_crawler::{SampleOptions, SampleProgress, SampleReport, Sampler};
use ethicsgen_shared::{
    AppConfig, Category, CategoryTaxonomy, FilterMode, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// ethicsgen: sample web text and turn it into ethical-reasoning training data.
#[derive(Parser)]
#[command(
    name = "ethicsgen",
    version,
    about = "Sample CommonCrawl text and generate ethical-reasoning training examples with a local model.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.ethicsgen/ethicsgen.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Download a budgeted sample of CommonCrawl and extract page text to JSONL.
    Sample {
        /// Byte budget in MB.
        #[arg(short, long, default_value_t = 100)]
        size: u64,

        /// Output JSONL file (defaults to <output_dir>/jsonl/cc_sample_<timestamp>.jsonl).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Record filter: bias (alias of keywords), keywords, or all.
        #[arg(long, default_value = "bias", value_parser = parse_filter_mode)]
        filter_mode: FilterMode,

        /// Crawl to sample, e.g. CC-MAIN-2024-10 (defaults to the latest).
        #[arg(long)]
        crawl_id: Option<String>,

        /// Seed for segment selection.
        #[arg(long)]
        seed: Option<u64>,

        /// Keep downloaded segments instead of deleting them.
        #[arg(long)]
        keep_segments: bool,
    },

    /// Generate training examples from sampled records.
    Generate {
        /// JSONL file or directory of JSONL files (defaults to <output_dir>/jsonl).
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Training file to write (defaults to <output_dir>/ethical_training.json).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: json or jsonl.
        #[arg(long, default_value = "json", value_parser = parse_format)]
        format: TrainingFormat,

        /// Number of examples to generate.
        #[arg(short, long, default_value_t = 20)]
        count: usize,

        /// Skip records shorter than this many characters.
        #[arg(long, default_value_t = 0)]
        min_chars: usize,

        /// Completion requests in flight at once.
        #[arg(long, default_value_t = 1)]
        concurrency: usize,

        /// Model name (overrides config and OLLAMA_MODEL).
        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        top_p: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Allowed categories in order, comma-separated.
        #[arg(long, value_parser = parse_taxonomy)]
        categories: Option<CategoryTaxonomy>,

        /// Assign categories round-robin without keyword hints.
        #[arg(long)]
        no_match_hints: bool,
    },

    /// Analyse scenarios with the model and print its reasoning.
    Agent {
        /// Read scenarios from stdin until `exit`.
        #[arg(short, long, conflicts_with = "scenario")]
        interactive: bool,

        /// Analyse a single scenario.
        #[arg(short, long)]
        scenario: Option<String>,

        /// Use this category instead of detecting one.
        #[arg(long, value_parser = parse_category)]
        category: Option<Category>,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        /// Write all replies to this JSON file on exit.
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Check a training file's structure.
    Validate {
        /// JSON or JSONL training file.
        file: PathBuf,
    },

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
    /// Write a default config file.
    Init,
    /// Print the resolved configuration.
    Show,
}

fn parse_filter_mode(s: &str) -> std::result::Result<FilterMode, String> {
    s.parse().map_err(|e: ethicsgen_shared::EthicsGenError| e.to_string())
}

fn parse_format(s: &str) -> std::result::Result<TrainingFormat, String> {
    s.parse().map_err(|e: ethicsgen_shared::EthicsGenError| e.to_string())
}

fn parse_category(s: &str) -> std::result::Result<Category, String> {
    s.parse().map_err(|e: ethicsgen_shared::EthicsGenError| e.to_string())
}

fn parse_taxonomy(s: &str) -> std::result::Result<CategoryTaxonomy, String> {
    let labels: Vec<&str> = s.split(',').map(str::trim).filter(|l| !l.is_empty()).collect();
    CategoryTaxonomy::from_labels(labels.as_slice()).map_err(|e| e.to_string())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "ethicsgen=info",
        1 => "ethicsgen=debug",
        _ => "ethicsgen=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).with_writer(io::stderr).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Route the parsed CLI command to its handler.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Sample {
            size,
            output,
            filter_mode,
            crawl_id,
            seed,
            keep_segments,
        } => {
            let config = resolve_config(cli.config.as_deref())?;
            cmd_sample(
                config,
                SampleArgs {
                    size,
                    output,
                    filter_mode,
                    crawl_id,
                    seed,
                    keep_segments,
                },
            )
            .await
        }
        Command::Generate {
            input,
            output,
            format,
            count,
            min_chars,
            concurrency,
            model,
            temperature,
            top_p,
            max_tokens,
            categories,
            no_match_hints,
        } => {
            let mut config = load_base_config(cli.config.as_deref())?;
            if let Some(model) = model {
                config.ollama.model = model;
            }
            if let Some(t) = temperature {
                config.decoding.temperature = t;
            }
            if let Some(p) = top_p {
                config.decoding.top_p = p;
            }
            if let Some(n) = max_tokens {
                config.decoding.max_tokens = n;
            }
            if let Some(categories) = categories {
                config.taxonomy.categories = categories;
            }
            config.validate()?;

            let output_dir = config.output_dir();
            let job = GenerateJob {
                input: input.unwrap_or_else(|| output_dir.join("jsonl")),
                output: output.unwrap_or_else(|| output_dir.join("ethical_training.json")),
                format,
                min_chars,
                options: GenerateOptions {
                    model: config.ollama.model.clone(),
                    decoding: config.decoding.clone(),
                    taxonomy: config.taxonomy.categories.clone(),
                    count,
                    match_hints: !no_match_hints,
                    concurrency,
                },
            };
            cmd_generate(&config, job).await
        }
        Command::Agent {
            interactive,
            scenario,
            category,
            model,
            temperature,
            max_tokens,
            save,
        } => {
            let mut config = load_base_config(cli.config.as_deref())?;
            if let Some(model) = model {
                config.ollama.model = model;
            }
            if let Some(t) = temperature {
                config.decoding.temperature = t;
            }
            if let Some(n) = max_tokens {
                config.decoding.max_tokens = n;
            }
            config.validate()?;

            let mode = match (interactive, scenario) {
                (true, _) => AgentMode::Interactive,
                (false, Some(s)) => AgentMode::Single(s),
                (false, None) => AgentMode::Demo,
            };
            cmd_agent(&config, mode, category, save.as_deref()).await
        }
        Command::Validate { file } => cmd_validate(&file),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(cli.config.as_deref()),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        },
    }
}

/// File (or defaults) with environment overrides applied, not yet validated.
fn load_base_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.apply_env();
    Ok(config)
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = load_base_config(path)?;
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

struct SampleArgs {
    size: u64,
    output: Option<PathBuf>,
    filter_mode: FilterMode,
    crawl_id: Option<String>,
    seed: Option<u64>,
    keep_segments: bool,
}

async fn cmd_sample(config: AppConfig, args: SampleArgs) -> Result<()> {
    if args.size == 0 {
        return Err(eyre!("--size must be at least 1 MB"));
    }

    let output_dir = config.output_dir();
    let output_path = args.output.unwrap_or_else(|| {
        output_dir.join("jsonl").join(format!(
            "cc_sample_{}.jsonl",
            Utc::now().format("%Y%m%d_%H%M%S")
        ))
    });

    info!(
        size_mb = args.size,
        filter = %args.filter_mode,
        output = %output_path.display(),
        "sampling CommonCrawl"
    );

    let opts = SampleOptions {
        budget_mb: args.size,
        output_path,
        segment_dir: output_dir.join("warc"),
        filter_mode: args.filter_mode,
        crawl_id: args.crawl_id,
        seed: args.seed,
        keep_segments: args.keep_segments,
    };

    let sampler = Sampler::new(config.crawl.clone())?;
    let progress = CliProgress::new();
    let report = sampler.run(&opts, &progress).await?;

    print_sample_report(&report);
    Ok(())
}

fn print_sample_report(report: &SampleReport) {
    println!();
    println!("  Sample complete!");
    println!("  Crawl:       {}", report.crawl_id);
    println!(
        "  Segments:    {} downloaded, {} failed, {} attempted",
        report.segments_downloaded, report.segments_failed, report.segments_attempted
    );
    println!("  Downloaded:  {:.1} MB", mb(report.bytes_downloaded));
    println!(
        "  Records:     {} examined, {} decoded, {} written",
        report.records_examined, report.records_decoded, report.records_written
    );
    println!(
        "  Skipped:     {} malformed, {} empty, {} filtered, {} duplicate",
        report.records_malformed, report.records_empty, report.records_filtered, report.duplicates
    );
    println!("  Written:     {:.1} MB", mb(report.bytes_written));
    if report.budget_exhausted {
        println!("  Budget:      exhausted");
    }
    println!("  Output:      {}", report.output_path.display());
    println!("  Duration:    {:.1}s", report.duration.as_secs_f64());
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

async fn cmd_generate(config: &AppConfig, job: GenerateJob) -> Result<()> {
    let client = OllamaClient::new(&config.ollama)?;
    if job.options.count > 0 {
        client
            .health_check(&job.options.model)
            .await
            .wrap_err_with(|| format!("Ollama is not reachable at {}", client.host()))?;
    }

    info!(
        input = %job.input.display(),
        count = job.options.count,
        model = %job.options.model,
        "generating examples"
    );

    let template = PromptTemplate::new(config.decoding.max_passage_chars);
    let progress = CliProgress::new();
    let summary = run_generate(&client, &template, &job, &progress).await?;

    print_generate_summary(&summary);
    Ok(())
}

fn print_generate_summary(summary: &GenerateSummary) {
    let report: &GenerationReport = &summary.report;
    println!();
    println!("  Generation complete!");
    if let Some(loaded) = &summary.loaded {
        println!(
            "  Records:     {} loaded from {} file(s), {} malformed, {} too short",
            loaded.records.len(),
            loaded.files.len(),
            loaded.malformed,
            loaded.too_short
        );
    }
    println!("  Requested:   {}", report.requested);
    println!("  Succeeded:   {}", report.succeeded);
    println!("  Failed:      {}", report.failed);
    if report.shortfall > 0 {
        println!("  Shortfall:   {} (not enough unused passage/category pairs)", report.shortfall);
    }
    for failure in report.failures.iter().take(5) {
        println!("    - {} [{}]: {}", failure.url, failure.category, failure.reason);
    }
    if report.failures.len() > 5 {
        println!("    ... and {} more", report.failures.len() - 5);
    }
    println!("  Output:      {}", summary.output.display());
    println!("  Duration:    {:.1}s", report.duration.as_secs_f64());
}

enum AgentMode {
    Demo,
    Single(String),
    Interactive,
}

async fn cmd_agent(
    config: &AppConfig,
    mode: AgentMode,
    category: Option<Category>,
    save: Option<&Path>,
) -> Result<()> {
    let client = OllamaClient::new(&config.ollama)?;
    client
        .health_check(&config.ollama.model)
        .await
        .wrap_err_with(|| format!("Ollama is not reachable at {}", client.host()))?;

    let settings = AgentSettings {
        model: config.ollama.model.clone(),
        decoding: config.decoding.clone(),
        taxonomy: config.taxonomy.categories.clone(),
    };
    let mut agent = Agent::new(
        client,
        PromptTemplate::new(config.decoding.max_passage_chars),
        settings,
    );
    if let Some(category) = category {
        if !config.taxonomy.categories.contains(category) {
            warn!(%category, "category is not in the configured taxonomy");
        }
        agent.pin_category(Some(category));
    }

    let mut out = io::stdout();
    match mode {
        AgentMode::Demo => {
            agent.run_demo(&mut out).await?;
        }
        AgentMode::Single(scenario) => {
            agent.run_once(&scenario, &mut out).await?;
        }
        AgentMode::Interactive => {
            let stdin = io::stdin();
            let analysed = agent.run_interactive(stdin.lock(), &mut out).await?;
            info!(analysed, "interactive session ended");
        }
    }
    out.flush()?;

    if let Some(path) = save {
        agent.save(path)?;
        println!("Saved {} replies to {}", agent.history().len(), path.display());
    }
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let report = validate_file(file)?;

    println!("  File:     {}", file.display());
    println!("  Examples: {}", report.total);
    println!("  Valid:    {}", report.valid);
    for issue in &report.issues {
        println!("    - #{}: {}", issue.index, issue.reason);
    }

    if report.is_valid() {
        println!("  OK");
        Ok(())
    } else {
        Err(eyre!(
            "{} of {} examples are invalid",
            report.issues.len(),
            report.total
        ))
    }
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(path, content)?;
            path.to_path_buf()
        }
        None => init_config()?,
    };
    println!("Config written to {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = load_base_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporter for CLI (spinner)
// ---------------------------------------------------------------------------

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
}

impl SampleProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn segment_started(&self, path: &str, current: usize, total: usize) {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.spinner.set_message(format!("Downloading [{current}/{total}] {name}"));
    }

    fn segment_finished(&self, path: &str, records_written: usize) {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.spinner.println(format!("  {name}: {records_written} records"));
    }

    fn done(&self, _report: &SampleReport) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn example_finished(&self, current: usize, total: usize, succeeded: bool) {
        let mark = if succeeded { "ok" } else { "failed" };
        self.spinner.set_message(format!("Generating [{current}/{total}] last: {mark}"));
    }

    fn done(&self, _report: &GenerationReport) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sample_defaults() {
        let cli = Cli::parse_from(["ethicsgen", "sample"]);
        match cli.command {
            Command::Sample {
                size, filter_mode, keep_segments, ..
            } => {
                assert_eq!(size, 100);
                assert_eq!(filter_mode, FilterMode::Keywords);
                assert!(!keep_segments);
            }
            _ => panic!("expected sample"),
        }
    }

    #[test]
    fn generate_parses_categories_in_order() {
        let cli = Cli::parse_from([
            "ethicsgen",
            "generate",
            "--count",
            "5",
            "--categories",
            "privacy, harm",
            "--format",
            "jsonl",
        ]);
        match cli.command {
            Command::Generate {
                count, categories, format, ..
            } => {
                assert_eq!(count, 5);
                assert_eq!(format, TrainingFormat::Jsonl);
                let categories: Vec<Category> = categories.unwrap().into();
                assert_eq!(categories, vec![Category::Privacy, Category::Harm]);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(Cli::try_parse_from(["ethicsgen", "generate", "--categories", "astrology"]).is_err());
        assert!(Cli::try_parse_from(["ethicsgen", "agent", "--category", "astrology"]).is_err());
    }

    #[test]
    fn interactive_conflicts_with_scenario() {
        assert!(
            Cli::try_parse_from(["ethicsgen", "agent", "--interactive", "--scenario", "x"]).is_err()
        );
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::parse_from(["ethicsgen", "validate", "out.json", "--config", "c.toml"]);
        assert_eq!(cli.config.as_deref(), Some(Path::new("c.toml")));
    }

    #[test]
    fn invalid_training_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            r#"{"passage":"p","category":"harm","reasoning":"no sentinels"}"#,
        )
        .unwrap();
        assert!(cmd_validate(&path).is_err());
    }
}
