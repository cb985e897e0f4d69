//! Example generator: crawl records in, validated training examples out.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures::StreamExt;
use futures::stream;
use tracing::{debug, info, instrument, warn};

use ethicsgen_shared::{
    Category, CategoryTaxonomy, CrawlRecord, DecodingConfig, EthicsGenError, Result,
    TrainingExample,
};

use crate::llm::{CompletionClient, CompletionRequest};
use crate::plan::{Pairing, plan_pairings};
use crate::reasoning::ParsedReasoning;
use crate::template::PromptTemplate;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Records read from the sampler's JSONL output, with skip counts.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<CrawlRecord>,
    pub files: Vec<PathBuf>,
    /// Lines that were not valid CrawlRecord JSON.
    pub malformed: usize,
    /// Records with text shorter than the minimum.
    pub too_short: usize,
}

/// Load records from a JSONL file or every `*.jsonl` file in a directory
/// (sorted by name).
#[instrument(skip_all, fields(path = %path.display(), min_chars))]
pub fn load_records(path: &Path, min_chars: usize) -> Result<LoadedRecords> {
    let files = if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .map_err(|e| EthicsGenError::io(path, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(EthicsGenError::validation(format!(
                "no .jsonl files in {}",
                path.display()
            )));
        }
        files
    } else {
        vec![path.to_path_buf()]
    };

    let mut loaded = LoadedRecords::default();
    for file in &files {
        let content = fs::read_to_string(file).map_err(|e| EthicsGenError::io(file, e))?;
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CrawlRecord>(line) {
                Ok(record) if record.text.trim().is_empty() => loaded.too_short += 1,
                Ok(record) if record.text.chars().count() < min_chars => loaded.too_short += 1,
                Ok(record) => loaded.records.push(record),
                Err(e) => {
                    debug!(file = %file.display(), line = n + 1, error = %e, "skipping malformed record");
                    loaded.malformed += 1;
                }
            }
        }
    }
    loaded.files = files;

    info!(
        records = loaded.records.len(),
        malformed = loaded.malformed,
        too_short = loaded.too_short,
        "records loaded"
    );
    Ok(loaded)
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Parameters for one generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub model: String,
    pub decoding: DecodingConfig,
    pub taxonomy: CategoryTaxonomy,
    /// Requested number of examples.
    pub count: usize,
    /// Start each passage with its keyword-detected category.
    pub match_hints: bool,
    /// Completion calls in flight at once (at least 1).
    pub concurrency: usize,
}

/// A planned example that produced nothing.
#[derive(Debug, Clone)]
pub struct GenerationFailure {
    pub url: String,
    pub category: Category,
    pub reason: String,
}

/// Summary of a generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerationReport {
    pub requested: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Requested examples that had no unused (passage, category) pair.
    pub shortfall: usize,
    pub failures: Vec<GenerationFailure>,
    pub duration: Duration,
}

/// Progress callback for the generator.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each completion is parsed (or fails).
    fn example_finished(&self, current: usize, total: usize, succeeded: bool);
    /// Called when generation completes.
    fn done(&self, report: &GenerationReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn example_finished(&self, _current: usize, _total: usize, _succeeded: bool) {}
    fn done(&self, _report: &GenerationReport) {}
}

/// Generate up to `opts.count` examples from `records`.
///
/// Per-example failures (endpoint errors, malformed output) are recorded in
/// the report and never abort the run. Results keep plan order regardless
/// of concurrency.
#[instrument(skip_all, fields(count = opts.count, model = %opts.model, concurrency = opts.concurrency))]
pub async fn generate_examples<C: CompletionClient>(
    client: &C,
    template: &PromptTemplate,
    records: &[CrawlRecord],
    opts: &GenerateOptions,
    progress: &dyn ProgressReporter,
) -> (Vec<TrainingExample>, GenerationReport) {
    let start = Instant::now();
    let plan = plan_pairings(records, &opts.taxonomy, opts.count, opts.match_hints);
    if plan.shortfall > 0 {
        warn!(
            requested = plan.requested,
            available = plan.pairings.len(),
            "not enough unused passage/category pairs"
        );
    }

    let jobs: Vec<(Pairing, CompletionRequest)> = plan
        .pairings
        .iter()
        .map(|pairing| {
            let rendered = template.render(pairing.category, &records[pairing.record].text);
            (*pairing, CompletionRequest::new(&opts.model, rendered, &opts.decoding))
        })
        .collect();
    let total = jobs.len();

    progress.phase("Generating examples");
    let mut completions = stream::iter(jobs)
        .map(move |(pairing, request)| async move {
            let outcome = client.complete(&request).await;
            (pairing, outcome)
        })
        .buffered(opts.concurrency.max(1));

    let mut examples = Vec::with_capacity(total);
    let mut report = GenerationReport {
        requested: plan.requested,
        shortfall: plan.shortfall,
        ..Default::default()
    };

    while let Some((pairing, outcome)) = completions.next().await {
        let record = &records[pairing.record];
        report.attempted += 1;

        let parsed = outcome.and_then(|text| ParsedReasoning::parse(&text).map_err(Into::into));
        let succeeded = match parsed {
            Ok(reasoning) => {
                debug!(url = %record.url, category = %pairing.category, "example accepted");
                examples.push(TrainingExample {
                    passage: record.text.clone(),
                    category: pairing.category,
                    reasoning: reasoning.to_reasoning_string(),
                    url: Some(record.url.clone()),
                    domain: (!record.domain.is_empty()).then(|| record.domain.clone()),
                });
                report.succeeded += 1;
                true
            }
            Err(e) => {
                warn!(url = %record.url, category = %pairing.category, error = %e, "example discarded");
                report.failed += 1;
                report.failures.push(GenerationFailure {
                    url: record.url.clone(),
                    category: pairing.category,
                    reason: e.to_string(),
                });
                false
            }
        };
        progress.example_finished(report.attempted, total, succeeded);
    }

    report.duration = start.elapsed();
    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        shortfall = report.shortfall,
        duration_ms = report.duration.as_millis(),
        "generation completed"
    );
    progress.done(&report);

    (examples, report)
}
