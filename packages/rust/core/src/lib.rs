//! Ethical-reasoning example generation for ethicsgen.
//!
//! This crate provides:
//! - [`template`] / [`reasoning`]: the shared prompt and the sentinel parser
//! - [`plan`] / [`generator`] / [`pipeline`]: turning crawl records into training examples
//! - [`llm`]: the completion client trait and the Ollama implementation
//! - [`agent`]: the interactive demonstration agent
//! - [`training`] / [`validate`]: training-file I/O and structural checks

pub mod agent;
pub mod categorize;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod plan;
pub mod reasoning;
pub mod template;
pub mod training;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

pub use agent::{Agent, AgentReply, AgentSettings, AgentState, DEMO_SCENARIOS, ReplyOutcome};
pub use categorize::{detect_category, keyword_hint};
pub use generator::{
    GenerateOptions, GenerationFailure, GenerationReport, LoadedRecords, ProgressReporter,
    SilentProgress, generate_examples, load_records,
};
pub use llm::{CompletionClient, CompletionRequest, OllamaClient};
pub use pipeline::{GenerateJob, GenerateSummary, run_generate};
pub use plan::{Pairing, Plan, plan_pairings};
pub use reasoning::{ParsedReasoning, SentinelError};
pub use template::{PromptTemplate, RenderedPrompt};
pub use training::{TrainingFormat, ensure_writable, read_training_file, write_training_file};
pub use validate::{ValidationIssue, ValidationReport, validate_examples, validate_file};
