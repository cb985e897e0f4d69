//! Keyword relevance filter for extracted page text.

use regex::{Regex, RegexBuilder};

use ethicsgen_shared::{EthicsGenError, FilterMode, Result};

/// Decides which extracted texts are kept by the sampler.
///
/// In [`FilterMode::Keywords`] a text passes when it contains at least one
/// keyword as a case-insensitive substring. [`FilterMode::All`] passes
/// everything.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    matcher: Option<Regex>,
}

impl KeywordFilter {
    pub fn new<S: AsRef<str>>(mode: FilterMode, keywords: &[S]) -> Result<Self> {
        let matcher = match mode {
            FilterMode::All => None,
            FilterMode::Keywords => Some(build_matcher(keywords)?),
        };
        Ok(Self { matcher })
    }

    /// A filter that keeps every text.
    pub fn pass_all() -> Self {
        Self { matcher: None }
    }

    pub fn matches(&self, text: &str) -> bool {
        match &self.matcher {
            Some(re) => re.is_match(text),
            None => true,
        }
    }
}

/// One alternation over all escaped keywords, matched case-insensitively.
fn build_matcher<S: AsRef<str>>(keywords: &[S]) -> Result<Regex> {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().trim())
        .filter(|k| !k.is_empty())
        .map(regex::escape)
        .collect();

    if alternatives.is_empty() {
        return Err(EthicsGenError::config(
            "keyword filter needs at least one non-empty keyword",
        ));
    }

    RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()
        .map_err(|e| EthicsGenError::config(format!("invalid keyword list: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethicsgen_shared::DEFAULT_KEYWORDS;

    #[test]
    fn keywords_match_case_insensitively() {
        let filter = KeywordFilter::new(FilterMode::Keywords, DEFAULT_KEYWORDS).unwrap();
        assert!(filter.matches("The report discusses INCOME inequality."));
        assert!(filter.matches("A Stereotype persists."));
        assert!(!filter.matches("Recipe: two eggs and a cup of flour."));
    }

    #[test]
    fn keywords_are_substrings() {
        let filter = KeywordFilter::new(FilterMode::Keywords, &["bias"]).unwrap();
        // Substring semantics: "biased" contains "bias".
        assert!(filter.matches("a biased sample"));
        assert!(filter.matches("a Biased sample"));
    }

    #[test]
    fn keywords_are_escaped() {
        let filter = KeywordFilter::new(FilterMode::Keywords, &["a.b"]).unwrap();
        assert!(filter.matches("x a.b y"));
        assert!(!filter.matches("x axb y"));
    }

    #[test]
    fn all_mode_passes_everything() {
        let filter = KeywordFilter::new(FilterMode::All, &[] as &[&str]).unwrap();
        assert!(filter.matches("anything"));
        assert!(filter.matches(""));
        assert!(KeywordFilter::pass_all().matches("x"));
    }

    #[test]
    fn empty_keyword_list_is_rejected() {
        assert!(KeywordFilter::new(FilterMode::Keywords, &["", "  "]).is_err());
    }
}
