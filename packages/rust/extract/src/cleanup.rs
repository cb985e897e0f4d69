//! Post-extraction cleanup pipeline for visible page text.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! The pipeline normalizes whitespace and line structure so that records are
//! compact and keyword matching is not fooled by layout artifacts.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full cleanup pipeline on raw extracted text.
pub(crate) fn run_pipeline(text: &str) -> String {
    let mut result = text.to_string();

    result = normalize_line_endings(&result);
    result = normalize_spaces(&result);
    result = split_phrases(&result);
    result = drop_empty_lines(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: Exotic spaces
// ---------------------------------------------------------------------------

/// Map tabs and non-breaking / zero-width spaces to plain spaces.
fn normalize_spaces(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' | '\u{a0}' | '\u{2007}' | '\u{202f}' => ' ',
            '\u{200b}' | '\u{feff}' => ' ',
            other => other,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 3: Split phrases
// ---------------------------------------------------------------------------

/// Trim every line and break runs of two or more spaces into separate lines.
///
/// Layout whitespace between inline blocks usually shows up as wide gaps;
/// treating the gap as a line break keeps unrelated fragments apart.
fn split_phrases(text: &str) -> String {
    static GAP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r" {2,}").expect("valid regex"));

    text.lines()
        .flat_map(|line| GAP_RE.split(line.trim()).map(str::trim).collect::<Vec<_>>())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 4: Empty lines
// ---------------------------------------------------------------------------

fn drop_empty_lines(text: &str) -> String {
    text.lines()
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_splits_and_trims() {
        let raw = "  Title  \r\n\r\n\tLeft column   Right column\n\n\n  last ";
        assert_eq!(run_pipeline(raw), "Title\nLeft column\nRight column\nlast");
    }

    #[test]
    fn single_spaces_survive() {
        assert_eq!(run_pipeline("one two three"), "one two three");
    }

    #[test]
    fn nbsp_becomes_gap() {
        assert_eq!(run_pipeline("a\u{a0}\u{a0}b"), "a\nb");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(run_pipeline(" \n \n"), "");
    }
}
