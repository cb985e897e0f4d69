//! Application configuration for ethicsgen.
//!
//! User config lives at `~/.ethicsgen/ethicsgen.toml`.
//! CLI flags override environment variables, which override config file
//! values, which override defaults. The resolved [`AppConfig`] is built once
//! at startup and passed by reference into each component.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EthicsGenError, Result};
use crate::types::CategoryTaxonomy;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "ethicsgen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".ethicsgen";

/// Environment variable overriding `[ollama] host`.
pub const ENV_OLLAMA_HOST: &str = "OLLAMA_HOST";
/// Environment variable overriding `[ollama] model`.
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
/// Environment variable overriding `[defaults] output_dir`.
pub const ENV_OUTPUT_DIR: &str = "ETHICSGEN_OUTPUT_DIR";

/// Keywords the sampler looks for when filtering for bias-related content.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "gender",
    "race",
    "ethnicity",
    "religion",
    "politics",
    "income",
    "class",
    "age",
    "disability",
    "sexuality",
    "controversial",
    "opinion",
    "belief",
    "stereotype",
    "discrimination",
    "prejudice",
    "bias",
    "unfair",
    "inequality",
    "privilege",
    "minority",
    "majority",
];

// ---------------------------------------------------------------------------
// Config structs (matching ethicsgen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Local model endpoint.
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// Decoding parameters for completions.
    #[serde(default)]
    pub decoding: DecodingConfig,

    /// CommonCrawl sampling settings.
    #[serde(default)]
    pub crawl: CrawlSettings,

    /// Allowed categories and their order.
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory for downloaded segments, record files and training data.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "data".into()
}

/// `[ollama]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model name passed to `/api/generate`.
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_model(),
            timeout_secs: default_ollama_timeout(),
        }
    }
}

fn default_ollama_host() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "deepseek-r1".into()
}
fn default_ollama_timeout() -> u64 {
    90
}

/// `[decoding]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus-sampling threshold.
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum tokens to generate per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Passages longer than this are truncated inside the prompt.
    #[serde(default = "default_max_passage_chars")]
    pub max_passage_chars: usize,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            max_passage_chars: default_max_passage_chars(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_max_passage_chars() -> usize {
    1500
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSettings {
    /// CommonCrawl index server (serves `collinfo.json`).
    #[serde(default = "default_index_url")]
    pub index_url: String,

    /// CommonCrawl data bucket (serves `warc.paths.gz` and segments).
    #[serde(default = "default_data_url")]
    pub data_url: String,

    /// Crawl used when the latest one cannot be resolved.
    #[serde(default = "default_fallback_crawl_id")]
    pub fallback_crawl_id: String,

    /// Maximum megabytes downloaded per segment.
    #[serde(default = "default_segment_mb")]
    pub segment_mb: u64,

    /// Maximum WARC records examined per segment.
    #[serde(default = "default_max_records")]
    pub max_records_per_segment: usize,

    /// Extracted text is truncated to this many characters.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// Keywords for the default filter mode.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            data_url: default_data_url(),
            fallback_crawl_id: default_fallback_crawl_id(),
            segment_mb: default_segment_mb(),
            max_records_per_segment: default_max_records(),
            max_text_chars: default_max_text_chars(),
            timeout_secs: default_crawl_timeout(),
            keywords: default_keywords(),
        }
    }
}

fn default_index_url() -> String {
    "https://index.commoncrawl.org".into()
}
fn default_data_url() -> String {
    "https://data.commoncrawl.org".into()
}
fn default_fallback_crawl_id() -> String {
    "CC-MAIN-2023-23".into()
}
fn default_segment_mb() -> u64 {
    50
}
fn default_max_records() -> usize {
    1000
}
fn default_max_text_chars() -> usize {
    10_000
}
fn default_crawl_timeout() -> u64 {
    60
}
fn default_keywords() -> Vec<String> {
    DEFAULT_KEYWORDS.iter().map(|k| (*k).to_string()).collect()
}

/// `[taxonomy]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxonomyConfig {
    #[serde(default)]
    pub categories: CategoryTaxonomy,
}

// ---------------------------------------------------------------------------
// Overrides and validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply environment overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides from an arbitrary lookup (testable).
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = non_empty(ENV_OLLAMA_HOST) {
            self.ollama.host = normalize_host(&host);
        }
        if let Some(model) = non_empty(ENV_OLLAMA_MODEL) {
            self.ollama.model = model;
        }
        if let Some(dir) = non_empty(ENV_OUTPUT_DIR) {
            self.defaults.output_dir = dir;
        }
    }

    /// Check value ranges and URLs. Called once before any work begins.
    pub fn validate(&self) -> Result<()> {
        let d = &self.decoding;
        if !(0.0..=2.0).contains(&d.temperature) {
            return Err(EthicsGenError::config(format!(
                "temperature {} out of range [0, 2]",
                d.temperature
            )));
        }
        if !(d.top_p > 0.0 && d.top_p <= 1.0) {
            return Err(EthicsGenError::config(format!(
                "top_p {} out of range (0, 1]",
                d.top_p
            )));
        }
        if d.max_tokens == 0 {
            return Err(EthicsGenError::config("max_tokens must be positive"));
        }
        if self.crawl.segment_mb == 0 {
            return Err(EthicsGenError::config("segment_mb must be positive"));
        }
        for (name, secs) in [
            ("ollama.timeout_secs", self.ollama.timeout_secs),
            ("crawl.timeout_secs", self.crawl.timeout_secs),
        ] {
            if secs == 0 {
                return Err(EthicsGenError::config(format!("{name} must be positive")));
            }
        }

        for (name, value) in [
            ("ollama.host", &self.ollama.host),
            ("crawl.index_url", &self.crawl.index_url),
            ("crawl.data_url", &self.crawl.data_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| EthicsGenError::config(format!("invalid {name} '{value}': {e}")))?;
        }

        if self.ollama.model.trim().is_empty() {
            return Err(EthicsGenError::config("ollama.model must not be empty"));
        }

        Ok(())
    }

    /// Resolved output directory as a path.
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.defaults.output_dir)
    }
}

/// `OLLAMA_HOST` is often given as `host:port` without a scheme.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.ethicsgen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EthicsGenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.ethicsgen/ethicsgen.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| EthicsGenError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        EthicsGenError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    init_config_in(&dir)
}

/// Write a default config file into `dir`, creating it if needed.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| EthicsGenError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EthicsGenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EthicsGenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
