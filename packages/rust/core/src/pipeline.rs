//! The `generate` pipeline: load records, generate examples, write the
//! training file once at the end.

use std::path::PathBuf;

use tracing::{info, instrument};

use ethicsgen_shared::Result;

use crate::generator::{
    GenerateOptions, GenerationReport, LoadedRecords, ProgressReporter, generate_examples,
    load_records,
};
use crate::llm::CompletionClient;
use crate::template::PromptTemplate;
use crate::training::{TrainingFormat, ensure_writable, write_training_file};

/// Inputs for a generate run.
#[derive(Debug, Clone)]
pub struct GenerateJob {
    /// JSONL file or directory of JSONL files.
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: TrainingFormat,
    /// Skip records with fewer characters than this.
    pub min_chars: usize,
    pub options: GenerateOptions,
}

/// Outcome of a generate run.
#[derive(Debug, Clone)]
pub struct GenerateSummary {
    /// `None` when nothing was requested and the input was not read.
    pub loaded: Option<LoadedRecords>,
    pub report: GenerationReport,
    pub output: PathBuf,
}

/// Run the full `generate` pipeline.
///
/// 1. Check the output path is writable
/// 2. Load records (skipping malformed and short ones)
/// 3. Plan pairings and generate
/// 4. Write the output file once
///
/// A count of zero writes an empty training file without reading the input
/// or contacting the model.
#[instrument(skip_all, fields(input = %job.input.display(), output = %job.output.display()))]
pub async fn run_generate<C: CompletionClient>(
    client: &C,
    template: &PromptTemplate,
    job: &GenerateJob,
    progress: &dyn ProgressReporter,
) -> Result<GenerateSummary> {
    if job.options.count == 0 {
        info!("count is 0, writing empty output");
        write_training_file(&job.output, &[], job.format)?;
        return Ok(GenerateSummary {
            loaded: None,
            report: GenerationReport::default(),
            output: job.output.clone(),
        });
    }

    ensure_writable(&job.output)?;

    progress.phase("Loading records");
    let loaded = load_records(&job.input, job.min_chars)?;

    let (examples, report) =
        generate_examples(client, template, &loaded.records, &job.options, progress).await;

    progress.phase("Writing output");
    write_training_file(&job.output, &examples, job.format)?;

    Ok(GenerateSummary {
        loaded: Some(loaded),
        report,
        output: job.output.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SilentProgress;
    use crate::reasoning::{BEGIN_THOUGHT, END_SOLUTION};
    use crate::testutil::StubClient;
    use crate::training::read_training_file;
    use ethicsgen_shared::{Category, CategoryTaxonomy, CrawlRecord, DecodingConfig};

    fn job(dir: &std::path::Path, count: usize) -> GenerateJob {
        GenerateJob {
            input: dir.join("records.jsonl"),
            output: dir.join("out/training.json"),
            format: TrainingFormat::Json,
            min_chars: 0,
            options: GenerateOptions {
                model: "stub".into(),
                decoding: DecodingConfig::default(),
                taxonomy: CategoryTaxonomy::new(vec![Category::Privacy]).unwrap(),
                count,
                match_hints: true,
                concurrency: 1,
            },
        }
    }

    fn write_records(dir: &std::path::Path, texts: &[&str]) {
        let body: String = texts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                serde_json::to_string(&CrawlRecord::new(format!("https://s{i}.org/"), *t)).unwrap()
                    + "\n"
            })
            .collect();
        std::fs::write(dir.join("records.jsonl"), body).unwrap();
    }

    #[tokio::test]
    async fn writes_examples_once_at_end() {
        let dir = tempfile::tempdir().unwrap();
        write_records(dir.path(), &["Companies track browsing habits without consent."]);
        let client = StubClient::well_formed();

        let summary = run_generate(
            &client,
            &PromptTemplate::new(1500),
            &job(dir.path(), 1),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.report.succeeded, 1);
        let written = read_training_file(&summary.output).unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].passage, "Companies track browsing habits without consent.");
        assert!(written[0].reasoning.starts_with(BEGIN_THOUGHT));
        assert!(written[0].reasoning.ends_with(END_SOLUTION));
    }

    #[tokio::test]
    async fn malformed_reply_leaves_nothing_partial() {
        let dir = tempfile::tempdir().unwrap();
        write_records(dir.path(), &["Companies track browsing habits without consent."]);
        let client = StubClient::fixed(
            "<|begin_of_thought|>t<|begin_of_solution|>s<|end_of_solution|>",
        );

        let summary = run_generate(
            &client,
            &PromptTemplate::new(1500),
            &job(dir.path(), 1),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(summary.report.failed, 1);
        assert!(read_training_file(&summary.output).unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_count_writes_empty_array_without_input() {
        let dir = tempfile::tempdir().unwrap();
        let client = StubClient::unreachable();

        let summary = run_generate(
            &client,
            &PromptTemplate::new(1500),
            &job(dir.path(), 0),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert!(summary.loaded.is_none());
        assert_eq!(client.calls(), 0);
        assert_eq!(std::fs::read_to_string(&summary.output).unwrap().trim(), "[]");
    }

    #[tokio::test]
    async fn unwritable_output_fails_before_any_completion() {
        let dir = tempfile::tempdir().unwrap();
        write_records(dir.path(), &["Companies track browsing habits without consent."]);
        std::fs::write(dir.path().join("blocker"), "a file, not a directory").unwrap();
        let client = StubClient::well_formed();
        let job = GenerateJob {
            output: dir.path().join("blocker/training.json"),
            ..job(dir.path(), 1)
        };

        let result =
            run_generate(&client, &PromptTemplate::new(1500), &job, &SilentProgress).await;

        assert!(result.is_err());
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let client = StubClient::well_formed();

        let result = run_generate(
            &client,
            &PromptTemplate::new(1500),
            &job(dir.path(), 3),
            &SilentProgress,
        )
        .await;
        assert!(result.is_err());
        assert!(!dir.path().join("out/training.json").exists());
    }
}
