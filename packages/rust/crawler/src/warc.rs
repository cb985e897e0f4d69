//! Streaming WARC record reader.
//!
//! Reads records one at a time from any `BufRead` (typically a
//! `MultiGzDecoder` over a downloaded segment), so a segment is never held in
//! memory as a whole. Segments downloaded under a byte budget are usually cut
//! mid-record; the reader reports the truncation once and then stops.

use std::io::{self, BufRead, Read};

/// Bodies larger than this are skipped rather than buffered.
pub const DEFAULT_MAX_BODY: usize = 8 * 1024 * 1024;

/// Errors produced while reading WARC records.
#[derive(Debug, thiserror::Error)]
pub enum WarcError {
    /// Underlying read failed (including a corrupt or cut gzip stream).
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// Input ended in the middle of a record.
    #[error("input ended mid-record")]
    Truncated,

    /// The record header block could not be interpreted.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Record body exceeded the configured limit and was skipped.
    #[error("record body of {len} bytes exceeds limit of {limit}")]
    Oversized { len: usize, limit: usize },
}

impl WarcError {
    /// Whether the reader can continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Oversized { .. })
    }
}

// ---------------------------------------------------------------------------
// WarcRecord
// ---------------------------------------------------------------------------

/// A single WARC record: named headers plus the raw block.
#[derive(Debug, Clone)]
pub struct WarcRecord {
    /// Header fields in file order.
    pub headers: Vec<(String, String)>,
    /// The record block (for `response` records, a full HTTP response).
    pub body: Vec<u8>,
}

impl WarcRecord {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `WARC-Type` (e.g. `response`, `request`, `warcinfo`).
    pub fn record_type(&self) -> Option<&str> {
        self.header("WARC-Type")
    }

    /// `WARC-Target-URI`, if present.
    pub fn target_uri(&self) -> Option<&str> {
        self.header("WARC-Target-URI")
    }

    /// Parse the block as an HTTP response. Only meaningful for `response` records.
    pub fn http_response(&self) -> Option<HttpResponse<'_>> {
        HttpResponse::parse(&self.body)
    }
}

// ---------------------------------------------------------------------------
// HttpResponse
// ---------------------------------------------------------------------------

/// A borrowed view of an archived HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse<'a> {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: &'a [u8],
}

impl<'a> HttpResponse<'a> {
    /// Split status line, headers and body. Returns `None` if no header
    /// terminator is found or the status line is not HTTP.
    pub fn parse(raw: &'a [u8]) -> Option<Self> {
        let (head_end, body_start) = find_header_end(raw)?;
        let head = String::from_utf8_lossy(&raw[..head_end]);
        let mut lines = head.lines();

        let status_line = lines.next()?;
        if !status_line.starts_with("HTTP/") {
            return None;
        }
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        let headers = lines
            .filter_map(|line| {
                let (k, v) = line.split_once(':')?;
                Some((k.trim().to_string(), v.trim().to_string()))
            })
            .collect();

        Some(Self {
            status,
            headers,
            body: &raw[body_start..],
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx status line.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the payload declares an HTML content type.
    pub fn is_html(&self) -> bool {
        self.header("Content-Type")
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false)
    }
}

/// Locate the end of an HTTP header block (`\r\n\r\n` or bare `\n\n`).
fn find_header_end(raw: &[u8]) -> Option<(usize, usize)> {
    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some((pos, pos + 4));
    }
    raw.windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| (pos, pos + 2))
}

// ---------------------------------------------------------------------------
// WarcReader
// ---------------------------------------------------------------------------

/// Iterator over the records of a WARC stream.
pub struct WarcReader<R> {
    inner: R,
    max_body: usize,
    finished: bool,
}

impl<R: BufRead> WarcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_body: DEFAULT_MAX_BODY,
            finished: false,
        }
    }

    /// Skip (rather than buffer) bodies larger than `max_body` bytes.
    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    /// Read one line including its terminator. `Ok(None)` at clean EOF.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = self.inner.read_until(b'\n', &mut buf)?;
        Ok((n > 0).then_some(buf))
    }

    /// Advance past the next `WARC/` version line, skipping separators and
    /// any garbage left behind by a malformed record. `false` at EOF.
    fn seek_record_start(&mut self) -> Result<bool, WarcError> {
        while let Some(line) = self.read_line()? {
            if line.starts_with(b"WARC/") {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn read_headers(&mut self) -> Result<Vec<(String, String)>, WarcError> {
        let mut headers: Vec<(String, String)> = Vec::new();
        loop {
            let Some(line) = self.read_line()? else {
                return Err(WarcError::Truncated);
            };
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\r', '\n']);
            if text.is_empty() {
                return Ok(headers);
            }

            // Folded continuation line
            if text.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.last_mut() {
                    value.push(' ');
                    value.push_str(text.trim());
                    continue;
                }
            }

            let (name, value) = text
                .split_once(':')
                .ok_or_else(|| WarcError::Malformed(format!("bad header line: {text}")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    fn read_record(&mut self) -> Result<Option<WarcRecord>, WarcError> {
        if !self.seek_record_start()? {
            return Ok(None);
        }
        let headers = self.read_headers()?;

        let len: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("Content-Length"))
            .and_then(|(_, v)| v.parse().ok())
            .ok_or_else(|| WarcError::Malformed("missing or invalid Content-Length".into()))?;

        if len > self.max_body {
            let skipped = io::copy(&mut (&mut self.inner).take(len as u64), &mut io::sink())?;
            if (skipped as usize) < len {
                return Err(WarcError::Truncated);
            }
            return Err(WarcError::Oversized {
                len,
                limit: self.max_body,
            });
        }

        let mut body = vec![0u8; len];
        self.inner.read_exact(&mut body).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => WarcError::Truncated,
            _ => WarcError::Io(e),
        })?;

        Ok(Some(WarcRecord { headers, body }))
    }
}

impl<R: BufRead> Iterator for WarcReader<R> {
    type Item = Result<WarcRecord, WarcError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                if !e.is_recoverable() {
                    self.finished = true;
                }
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{gzip_members, html_response, warc_record};
    use flate2::read::MultiGzDecoder;
    use std::io::{BufReader, Cursor};

    #[test]
    fn reads_plain_records() {
        let mut data = warc_record("warcinfo", None, b"software: test\r\n");
        data.extend(warc_record(
            "response",
            Some("http://x.com/a"),
            &html_response("text/html; charset=utf-8", "<p>hi</p>"),
        ));

        let records: Vec<_> = WarcReader::new(Cursor::new(data))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type(), Some("warcinfo"));
        assert_eq!(records[1].target_uri(), Some("http://x.com/a"));

        let http = records[1].http_response().unwrap();
        assert_eq!(http.status, 200);
        assert!(http.is_success());
        assert!(http.is_html());
        assert_eq!(http.body, b"<p>hi</p>");
    }

    #[test]
    fn reads_concatenated_gzip_members() {
        let a = warc_record("request", Some("http://x.com/"), b"GET / HTTP/1.1\r\n\r\n");
        let b = warc_record(
            "response",
            Some("http://x.com/"),
            &html_response("text/html", "<p>body</p>"),
        );
        let gz = gzip_members(&[a, b]);

        let reader = WarcReader::new(BufReader::new(MultiGzDecoder::new(Cursor::new(gz))));
        let types: Vec<String> = reader
            .map(|r| r.unwrap().record_type().unwrap_or_default().to_string())
            .collect();
        assert_eq!(types, vec!["request", "response"]);
    }

    #[test]
    fn truncated_tail_stops_iteration() {
        let mut data = warc_record("response", Some("http://x.com/"), &html_response("text/html", "ok"));
        let second = warc_record("response", Some("http://y.com/"), &html_response("text/html", "cut"));
        data.extend_from_slice(&second[..second.len() - 10]);

        let results: Vec<_> = WarcReader::new(Cursor::new(data)).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(WarcError::Truncated)));
    }

    #[test]
    fn truncated_gzip_stream_stops_iteration() {
        let gz = gzip_members(&[
            warc_record("response", Some("http://x.com/"), &html_response("text/html", "one")),
            warc_record("response", Some("http://y.com/"), &html_response("text/html", "two")),
        ]);
        let cut = &gz[..gz.len() - 7];

        let reader = WarcReader::new(BufReader::new(MultiGzDecoder::new(Cursor::new(cut))));
        let results: Vec<_> = reader.collect();
        assert!(results[0].is_ok());
        assert!(results.last().unwrap().is_err());
    }

    #[test]
    fn malformed_record_is_skipped() {
        let mut data = b"WARC/1.0\r\nWARC-Type: response\r\n\r\ngarbage\r\n\r\n".to_vec();
        data.extend(warc_record("response", Some("http://ok.com/"), &html_response("text/html", "fine")));

        let results: Vec<_> = WarcReader::new(Cursor::new(data)).collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(WarcError::Malformed(_))));
        assert_eq!(results[1].as_ref().unwrap().target_uri(), Some("http://ok.com/"));
    }

    #[test]
    fn oversized_body_is_skipped() {
        let mut data = warc_record("response", Some("http://big.com/"), &[b'x'; 64]);
        data.extend(warc_record("response", Some("http://small.com/"), b"y"));

        let results: Vec<_> = WarcReader::new(Cursor::new(data)).with_max_body(32).collect();
        assert!(matches!(results[0], Err(WarcError::Oversized { len: 64, limit: 32 })));
        assert_eq!(results[1].as_ref().unwrap().target_uri(), Some("http://small.com/"));
    }

    #[test]
    fn http_response_without_header_terminator() {
        assert!(HttpResponse::parse(b"HTTP/1.1 200 OK\r\nContent-Type: text/html").is_none());
        assert!(HttpResponse::parse(b"not http\r\n\r\nbody").is_none());
    }
}
