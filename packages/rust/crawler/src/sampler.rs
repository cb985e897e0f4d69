//! CommonCrawl sampler.
//!
//! Resolves a crawl id, lists its WARC segments, downloads a random subset
//! under a byte budget, and turns the archived HTML responses into
//! keyword-filtered, deduplicated [`CrawlRecord`]s written as JSONL.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use flate2::read::MultiGzDecoder;
use futures::StreamExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use ethicsgen_extract::{ExtractOptions, decode_body, extract_text};
use ethicsgen_shared::{CrawlRecord, CrawlSettings, EthicsGenError, FilterMode, Result};

use crate::filter::KeywordFilter;
use crate::warc::{WarcError, WarcReader};

/// User-Agent string for CommonCrawl requests.
const USER_AGENT: &str = concat!("Ethicsgen/", env!("CARGO_PKG_VERSION"));

const BYTES_PER_MB: u64 = 1024 * 1024;

static CRAWL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CC-MAIN-\d{4}-\d{2}$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Options, report, progress
// ---------------------------------------------------------------------------

/// Parameters for one sampling run.
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Byte budget in MiB, shared by downloads and output.
    pub budget_mb: u64,
    /// JSONL output file.
    pub output_path: PathBuf,
    /// Where downloaded segments are staged.
    pub segment_dir: PathBuf,
    pub filter_mode: FilterMode,
    /// Use this crawl instead of resolving the latest one.
    pub crawl_id: Option<String>,
    /// Seed for segment selection.
    pub seed: Option<u64>,
    pub keep_segments: bool,
}

/// Outcome of streaming one segment to disk.
#[derive(Debug)]
pub struct SegmentDownload {
    /// Bytes written to the destination file, including any partial transfer.
    pub bytes: u64,
    /// What ended the transfer early; `None` when it completed or hit the cap.
    pub error: Option<EthicsGenError>,
}

/// Summary of a completed sampling run.
#[derive(Debug, Clone, Default)]
pub struct SampleReport {
    pub crawl_id: String,
    pub segments_attempted: usize,
    pub segments_downloaded: usize,
    pub segments_failed: usize,
    pub bytes_downloaded: u64,
    /// WARC records read, of any type.
    pub records_examined: usize,
    /// HTML responses whose text was extracted.
    pub records_decoded: usize,
    /// Records skipped for malformed headers, missing URI, or unparseable HTTP.
    pub records_malformed: usize,
    /// HTML responses with no visible text.
    pub records_empty: usize,
    /// Decoded records rejected by the keyword filter.
    pub records_filtered: usize,
    pub duplicates: usize,
    pub records_written: usize,
    pub bytes_written: u64,
    /// The run stopped because the next record would exceed the budget.
    pub budget_exhausted: bool,
    pub output_path: PathBuf,
    pub duration: Duration,
}

/// Progress callback for the sampler.
pub trait SampleProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a segment is downloaded.
    fn segment_started(&self, path: &str, current: usize, total: usize);
    /// Called after a segment has been processed.
    fn segment_finished(&self, path: &str, records_written: usize);
    /// Called when the run completes.
    fn done(&self, report: &SampleReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl SampleProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn segment_started(&self, _path: &str, _current: usize, _total: usize) {}
    fn segment_finished(&self, _path: &str, _records_written: usize) {}
    fn done(&self, _report: &SampleReport) {}
}

// ---------------------------------------------------------------------------
// Sampler
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CollInfo {
    id: String,
}

/// HTTP side of the sampler: crawl index, segment listing, segment download.
pub struct Sampler {
    settings: CrawlSettings,
    client: Client,
}

impl Sampler {
    pub fn new(settings: CrawlSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| EthicsGenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { settings, client })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.timeout_secs)
    }

    /// The explicit id if given, else the newest crawl from the index, else
    /// the configured fallback.
    pub async fn resolve_crawl_id(&self, explicit: Option<&str>) -> String {
        if let Some(id) = explicit {
            return id.to_string();
        }
        match self.latest_crawl_id().await {
            Ok(id) => {
                info!(crawl_id = %id, "resolved latest crawl");
                id
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = %self.settings.fallback_crawl_id,
                    "could not resolve latest crawl, using fallback"
                );
                self.settings.fallback_crawl_id.clone()
            }
        }
    }

    async fn latest_crawl_id(&self) -> Result<String> {
        let url = format!("{}/collinfo.json", self.settings.index_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| EthicsGenError::Network(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(EthicsGenError::Network(format!(
                "{url}: HTTP {}",
                response.status().as_u16()
            )));
        }

        let entries: Vec<CollInfo> = response
            .json()
            .await
            .map_err(|e| EthicsGenError::parse(format!("{url}: {e}")))?;

        entries
            .into_iter()
            .map(|c| c.id)
            .find(|id| CRAWL_ID_RE.is_match(id))
            .ok_or_else(|| EthicsGenError::parse(format!("{url}: no CC-MAIN crawl listed")))
    }

    /// Fetch and gunzip `warc.paths.gz` for a crawl.
    #[instrument(skip(self))]
    pub async fn list_segments(&self, crawl_id: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/crawl-data/{crawl_id}/warc.paths.gz",
            self.settings.data_url.trim_end_matches('/')
        );
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout())
            .send()
            .await
            .map_err(|e| EthicsGenError::Network(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(EthicsGenError::Network(format!(
                "{url}: HTTP {}",
                response.status().as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EthicsGenError::Network(format!("{url}: {e}")))?;

        let mut listing = String::new();
        MultiGzDecoder::new(&bytes[..])
            .read_to_string(&mut listing)
            .map_err(|e| EthicsGenError::parse(format!("{url}: {e}")))?;

        let paths: Vec<String> = listing
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();

        if paths.is_empty() {
            return Err(EthicsGenError::parse(format!("{url}: no segments listed")));
        }

        debug!(count = paths.len(), "listed segments");
        Ok(paths)
    }

    /// Stream one segment to `dest`, stopping after `max_bytes`.
    ///
    /// Never fails outright: the returned [`SegmentDownload`] carries the
    /// bytes that reached disk and the error that ended the transfer early,
    /// if any. A partially written file is left in place; the caller removes it.
    #[instrument(skip(self, dest))]
    pub async fn download_segment(&self, path: &str, dest: &Path, max_bytes: u64) -> SegmentDownload {
        let mut bytes = 0;
        let error = self.stream_segment(path, dest, max_bytes, &mut bytes).await.err();
        debug!(bytes, failed = error.is_some(), "segment download finished");
        SegmentDownload { bytes, error }
    }

    async fn stream_segment(
        &self,
        path: &str,
        dest: &Path,
        max_bytes: u64,
        written: &mut u64,
    ) -> Result<()> {
        let url = format!(
            "{}/{}",
            self.settings.data_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let stalled = || {
            EthicsGenError::Network(format!("{url}: no data for {}s", self.settings.timeout_secs))
        };

        let response = tokio::time::timeout(self.timeout(), self.client.get(&url).send())
            .await
            .map_err(|_| stalled())?
            .map_err(|e| EthicsGenError::Network(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(EthicsGenError::Network(format!(
                "{url}: HTTP {}",
                response.status().as_u16()
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| EthicsGenError::io(dest, e))?;

        let mut stream = response.bytes_stream();

        // Idle timeout per chunk; a whole-request timeout would cut large segments.
        while *written < max_bytes {
            let next = tokio::time::timeout(self.timeout(), stream.next())
                .await
                .map_err(|_| stalled())?;
            let Some(chunk) = next else { break };
            let chunk = chunk.map_err(|e| EthicsGenError::Network(format!("{url}: {e}")))?;

            let take = (max_bytes - *written).min(chunk.len() as u64) as usize;
            file.write_all(&chunk[..take])
                .await
                .map_err(|e| EthicsGenError::io(dest, e))?;
            *written += take as u64;
        }

        file.flush().await.map_err(|e| EthicsGenError::io(dest, e))
    }

    /// Run a full sampling pass.
    ///
    /// 1. Resolve the crawl id (fallback on failure)
    /// 2. List segments (fatal on failure)
    /// 3. Select `max(1, budget / segment size)` segments
    /// 4. Download, decode, filter and emit each segment in turn
    #[instrument(skip_all, fields(budget_mb = opts.budget_mb, mode = %opts.filter_mode))]
    pub async fn run(
        &self,
        opts: &SampleOptions,
        progress: &dyn SampleProgress,
    ) -> Result<SampleReport> {
        let start = Instant::now();
        let filter = KeywordFilter::new(opts.filter_mode, &self.settings.keywords)?;
        let budget = opts.budget_mb.saturating_mul(BYTES_PER_MB);

        progress.phase("Resolving crawl");
        let crawl_id = self.resolve_crawl_id(opts.crawl_id.as_deref()).await;

        progress.phase("Listing segments");
        let paths = self.list_segments(&crawl_id).await?;
        let count = segment_count(opts.budget_mb, self.settings.segment_mb);
        let selected = select_segments(&paths, count, opts.seed);

        info!(
            crawl_id = %crawl_id,
            available = paths.len(),
            selected = selected.len(),
            "starting sample"
        );

        std::fs::create_dir_all(&opts.segment_dir)
            .map_err(|e| EthicsGenError::io(&opts.segment_dir, e))?;
        let mut sink = RecordSink::create(&opts.output_path, budget)?;

        let mut report = SampleReport {
            crawl_id,
            output_path: opts.output_path.clone(),
            ..Default::default()
        };

        let segment_cap = self.settings.segment_mb.saturating_mul(BYTES_PER_MB);
        progress.phase("Sampling segments");

        for (i, path) in selected.iter().enumerate() {
            let remaining = budget.saturating_sub(report.bytes_downloaded);
            if remaining == 0 {
                info!("download budget spent");
                break;
            }

            progress.segment_started(path, i + 1, selected.len());
            report.segments_attempted += 1;

            let dest = opts.segment_dir.join(segment_file_name(path));
            let download = self
                .download_segment(path, &dest, segment_cap.min(remaining))
                .await;
            report.bytes_downloaded += download.bytes;
            if let Some(e) = download.error {
                warn!(
                    segment = %path,
                    bytes = download.bytes,
                    error = %e,
                    "segment download failed, skipping"
                );
                report.segments_failed += 1;
                remove_segment(&dest);
                continue;
            }
            report.segments_downloaded += 1;

            let exhausted = match File::open(&dest) {
                Ok(file) => {
                    let reader = BufReader::new(MultiGzDecoder::new(BufReader::new(file)));
                    process_segment(reader, &filter, &self.settings, &mut sink, &mut report)?
                }
                Err(e) => {
                    warn!(segment = %path, error = %e, "could not reopen segment");
                    false
                }
            };

            if !opts.keep_segments {
                remove_segment(&dest);
            }
            progress.segment_finished(path, report.records_written);

            if exhausted {
                info!(bytes_written = sink.bytes_written(), "output budget reached");
                report.budget_exhausted = true;
                break;
            }
        }

        report.bytes_written = sink.bytes_written();
        report.duration = start.elapsed();

        info!(
            segments_downloaded = report.segments_downloaded,
            segments_failed = report.segments_failed,
            records_examined = report.records_examined,
            records_written = report.records_written,
            duration_ms = report.duration.as_millis(),
            "sample completed"
        );

        progress.done(&report);
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Segment selection
// ---------------------------------------------------------------------------

/// How many segments a budget buys: `max(1, budget_mb / segment_mb)`.
pub fn segment_count(budget_mb: u64, segment_mb: u64) -> usize {
    let n = budget_mb.checked_div(segment_mb).unwrap_or(0);
    usize::try_from(n).unwrap_or(usize::MAX).max(1)
}

/// Sample `count` distinct paths. A seed makes the choice reproducible.
pub fn select_segments(paths: &[String], count: usize, seed: Option<u64>) -> Vec<String> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    paths.choose_multiple(&mut rng, count).cloned().collect()
}

fn segment_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn remove_segment(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove segment file");
        }
    }
}

// ---------------------------------------------------------------------------
// Segment processing
// ---------------------------------------------------------------------------

/// Decode one (possibly truncated) segment into the sink.
///
/// Returns `true` when the sink's budget stopped the run.
pub fn process_segment<R: BufRead, W: Write>(
    reader: R,
    filter: &KeywordFilter,
    settings: &CrawlSettings,
    sink: &mut RecordSink<W>,
    report: &mut SampleReport,
) -> Result<bool> {
    let extract_opts = ExtractOptions {
        max_chars: Some(settings.max_text_chars),
    };
    let mut reader = WarcReader::new(reader);
    let mut examined = 0usize;

    while examined < settings.max_records_per_segment {
        let record = match reader.next() {
            None => break,
            Some(Ok(record)) => record,
            Some(Err(e)) if e.is_recoverable() => {
                debug!(error = %e, "skipping unreadable record");
                report.records_malformed += 1;
                continue;
            }
            Some(Err(WarcError::Truncated)) => {
                debug!("segment ends mid-record");
                break;
            }
            Some(Err(e)) => {
                debug!(error = %e, "segment stream ended");
                break;
            }
        };
        examined += 1;
        report.records_examined += 1;

        if record.record_type() != Some("response") {
            continue;
        }
        let Some(uri) = record.target_uri() else {
            report.records_malformed += 1;
            continue;
        };
        let Some(http) = record.http_response() else {
            report.records_malformed += 1;
            continue;
        };
        if !http.is_success() || !http.is_html() {
            continue;
        }

        let html = decode_body(http.body);
        let extracted = extract_text(&html, &extract_opts);
        report.records_decoded += 1;

        if extracted.text.is_empty() {
            report.records_empty += 1;
            continue;
        }
        if extracted.truncated {
            debug!(url = %uri, max_chars = settings.max_text_chars, "text truncated");
        }
        if !filter.matches(&extracted.text) {
            report.records_filtered += 1;
            continue;
        }

        match sink.emit(&CrawlRecord::new(uri, extracted.text))? {
            EmitOutcome::Written => report.records_written += 1,
            EmitOutcome::Duplicate => report.duplicates += 1,
            EmitOutcome::BudgetExhausted => return Ok(true),
        }
    }

    Ok(false)
}

// ---------------------------------------------------------------------------
// RecordSink
// ---------------------------------------------------------------------------

/// What happened to a record offered to a [`RecordSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Written,
    Duplicate,
    BudgetExhausted,
}

/// Line-flushed JSONL writer that drops duplicate ids and never exceeds its
/// byte budget.
pub struct RecordSink<W: Write> {
    writer: W,
    path: PathBuf,
    budget: u64,
    bytes_written: u64,
    seen: HashSet<String>,
}

impl RecordSink<BufWriter<File>> {
    /// Create (truncate) the output file, making parent directories.
    pub fn create(path: &Path, budget: u64) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| EthicsGenError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| EthicsGenError::io(path, e))?;
        Ok(Self::new(BufWriter::new(file), path, budget))
    }
}

impl<W: Write> RecordSink<W> {
    pub fn new(writer: W, path: impl Into<PathBuf>, budget: u64) -> Self {
        Self {
            writer,
            path: path.into(),
            budget,
            bytes_written: 0,
            seen: HashSet::new(),
        }
    }

    pub fn emit(&mut self, record: &CrawlRecord) -> Result<EmitOutcome> {
        if self.seen.contains(&record.id) {
            return Ok(EmitOutcome::Duplicate);
        }

        let mut line = serde_json::to_string(record)
            .map_err(|e| EthicsGenError::parse(format!("serializing record: {e}")))?;
        line.push('\n');

        let len = line.len() as u64;
        if self.bytes_written + len > self.budget {
            return Ok(EmitOutcome::BudgetExhausted);
        }

        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| EthicsGenError::io(&self.path, e))?;

        self.bytes_written += len;
        self.seen.insert(record.id.clone());
        Ok(EmitOutcome::Written)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
