//! HTML-to-text extraction for archived web pages.
//!
//! Decodes raw HTTP body bytes, parses the HTML with `scraper`, drops page
//! chrome (scripts, styles, headers, footers, navigation), and runs a cleanup
//! pipeline over the remaining visible text.

mod cleanup;

use scraper::{ElementRef, Html};
use tracing::{debug, instrument};

/// Elements whose subtrees never contribute visible text.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "header", "footer", "nav", "noscript", "head", "template", "svg",
    "iframe",
];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Result of extracting text from an HTML page.
#[derive(Debug, Clone)]
pub struct ExtractResult {
    /// Cleaned visible text, one phrase per line.
    pub text: String,
    /// Whether `text` was cut to `max_chars`.
    pub truncated: bool,
}

/// Options for text extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Truncate the cleaned text to this many characters.
    pub max_chars: Option<usize>,
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract visible text from an HTML document.
///
/// 1. Parse the document (scraper is lenient; this never fails)
/// 2. Walk the tree, skipping chrome subtrees, collecting text nodes
/// 3. Run the cleanup pipeline
/// 4. Truncate on a char boundary if requested
#[instrument(skip_all, fields(html_len = html.len()))]
pub fn extract_text(html: &str, opts: &ExtractOptions) -> ExtractResult {
    let doc = Html::parse_document(html);

    let mut fragments: Vec<&str> = Vec::new();
    collect_text(doc.root_element(), &mut fragments);
    let raw = fragments.join("\n");

    let cleaned = cleanup::run_pipeline(&raw);
    let (text, truncated) = match opts.max_chars {
        Some(max) => truncate_chars(&cleaned, max),
        None => (cleaned, false),
    };

    debug!(text_len = text.len(), truncated, "text extraction complete");

    ExtractResult { text, truncated }
}

/// Decode an HTTP body: UTF-8 first, falling back to Windows-1252.
///
/// Windows-1252 is Latin-1 with printable characters in 0x80..=0x9F; the five
/// bytes it leaves undefined map to the matching C1 control, as browsers do.
/// Every byte maps to a code point, so this never fails.
pub fn decode_body(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            debug!(len = bytes.len(), "body is not UTF-8, decoding as Windows-1252");
            bytes.iter().map(|&b| windows_1252(b)).collect()
        }
    }
}

/// 0x80..=0x9F in Windows-1252.
const CP1252_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8D}', 'Ž', '\u{8F}',
    '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9D}', 'ž', 'Ÿ',
];

fn windows_1252(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[usize::from(byte - 0x80)],
        _ => char::from(byte),
    }
}

/// Truncate to at most `max` characters. Returns the text and whether it was cut.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Depth-first walk collecting text nodes outside skipped subtrees.
fn collect_text<'a>(el: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if !SKIP_TAGS.contains(&child_el.value().name()) {
                collect_text(child_el, out);
            }
        } else if let Some(text) = child.value().as_text() {
            out.push(&**text);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
