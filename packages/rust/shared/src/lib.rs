//! Shared types, error model, and configuration for ethicsgen.
//!
//! This crate is the foundation depended on by all other ethicsgen crates.
//! It provides:
//! - [`EthicsGenError`]: the unified error type
//! - Domain types ([`CrawlRecord`], [`TrainingExample`], [`Category`], [`CategoryTaxonomy`])
//! - Configuration ([`AppConfig`], config loading, environment overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlSettings, DEFAULT_KEYWORDS, DecodingConfig, DefaultsConfig, OllamaConfig,
    TaxonomyConfig, config_dir, config_file_path, init_config, init_config_in, load_config,
    load_config_from,
};
pub use error::{EthicsGenError, Result};
pub use types::{
    Category, CategoryTaxonomy, CrawlRecord, FilterMode, TrainingExample, content_hash, domain_of,
};
