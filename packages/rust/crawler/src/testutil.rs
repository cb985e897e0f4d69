//! WARC and gzip builders for tests.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

/// Serialize one WARC/1.0 record with the given type, target URI and block.
pub(crate) fn warc_record(kind: &str, uri: Option<&str>, block: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"WARC/1.0\r\n");
    out.extend_from_slice(format!("WARC-Type: {kind}\r\n").as_bytes());
    if let Some(uri) = uri {
        out.extend_from_slice(format!("WARC-Target-URI: {uri}\r\n").as_bytes());
    }
    out.extend_from_slice(b"Content-Type: application/http; msgtype=response\r\n");
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", block.len()).as_bytes());
    out.extend_from_slice(block);
    out.extend_from_slice(b"\r\n\r\n");
    out
}

/// An archived `200 OK` HTTP response block.
pub(crate) fn html_response(content_type: &str, body: &str) -> Vec<u8> {
    http_response("200 OK", content_type, body)
}

/// An archived HTTP response block with the given status, e.g. `404 Not Found`.
pub(crate) fn http_response(status: &str, content_type: &str, body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

pub(crate) fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::fast());
    enc.write_all(bytes).unwrap();
    enc.finish().unwrap()
}

/// One gzip member per record, concatenated, as CommonCrawl segments are laid out.
pub(crate) fn gzip_members(records: &[Vec<u8>]) -> Vec<u8> {
    records.iter().flat_map(|r| gzip(r)).collect()
}
