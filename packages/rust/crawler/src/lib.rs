//! CommonCrawl sampling: WARC reading, keyword filtering, segment download.
//!
//! This crate provides:
//! - [`warc`]: Streaming WARC record reader over (gunzipped) segments
//! - [`KeywordFilter`]: Case-insensitive keyword relevance filter
//! - [`sampler`]: Crawl id resolution, segment selection and the sampling run

pub mod filter;
pub mod sampler;
pub mod warc;

#[cfg(test)]
pub(crate) mod testutil;

pub use filter::KeywordFilter;
pub use sampler::{
    EmitOutcome, RecordSink, SampleOptions, SampleProgress, SampleReport, Sampler, SegmentDownload,
    SilentProgress, process_segment, segment_count, select_segments,
};
pub use warc::{HttpResponse, WarcError, WarcReader, WarcRecord};
