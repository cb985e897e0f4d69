//! Core domain types: crawl records, training examples, and the category taxonomy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{EthicsGenError, Result};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// An ethical dimension used to condition prompt generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Privacy,
    Fairness,
    Autonomy,
    Harm,
    Deception,
    GeneralEthics,
}

impl Category {
    /// Every category, in default taxonomy order.
    pub const ALL: [Category; 6] = [
        Self::Privacy,
        Self::Fairness,
        Self::Autonomy,
        Self::Harm,
        Self::Deception,
        Self::GeneralEthics,
    ];

    /// The snake_case label written to training files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Privacy => "privacy",
            Self::Fairness => "fairness",
            Self::Autonomy => "autonomy",
            Self::Harm => "harm",
            Self::Deception => "deception",
            Self::GeneralEthics => "general_ethics",
        }
    }

    /// Human phrasing used inside prompts ("general ethics" rather than the label).
    pub fn prompt_label(&self) -> &'static str {
        match self {
            Self::GeneralEthics => "general ethics",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = EthicsGenError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| {
                EthicsGenError::config(format!(
                    "unknown category '{s}': expected one of {}",
                    Self::ALL.map(|c| c.as_str()).join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// CategoryTaxonomy
// ---------------------------------------------------------------------------

/// A non-empty, ordered set of distinct categories, fixed for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Category>", into = "Vec<Category>")]
pub struct CategoryTaxonomy(Vec<Category>);

impl CategoryTaxonomy {
    /// Build a taxonomy, rejecting empty or duplicated lists.
    pub fn new(categories: Vec<Category>) -> Result<Self> {
        if categories.is_empty() {
            return Err(EthicsGenError::config("category taxonomy must not be empty"));
        }
        for (i, c) in categories.iter().enumerate() {
            if categories[..i].contains(c) {
                return Err(EthicsGenError::config(format!(
                    "category '{c}' listed more than once"
                )));
            }
        }
        Ok(Self(categories))
    }

    /// Parse a taxonomy from labels (e.g. a `--categories privacy,harm` flag).
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let categories = labels
            .iter()
            .map(|l| l.as_ref().parse())
            .collect::<Result<Vec<Category>>>()?;
        Self::new(categories)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Category> {
        self.0.get(index).copied()
    }

    pub fn position(&self, category: Category) -> Option<usize> {
        self.0.iter().position(|c| *c == category)
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Category] {
        &self.0
    }
}

impl Default for CategoryTaxonomy {
    fn default() -> Self {
        Self(Category::ALL.to_vec())
    }
}

impl TryFrom<Vec<Category>> for CategoryTaxonomy {
    type Error = EthicsGenError;

    fn try_from(categories: Vec<Category>) -> Result<Self> {
        Self::new(categories)
    }
}

impl From<CategoryTaxonomy> for Vec<Category> {
    fn from(taxonomy: CategoryTaxonomy) -> Self {
        taxonomy.0
    }
}

// ---------------------------------------------------------------------------
// FilterMode
// ---------------------------------------------------------------------------

/// Which decoded crawl records the sampler keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Keep records containing at least one configured keyword.
    #[default]
    #[serde(alias = "bias")]
    Keywords,
    /// Keep every decoded record.
    All,
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keywords => "keywords",
            Self::All => "all",
        })
    }
}

impl FromStr for FilterMode {
    type Err = EthicsGenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keywords" | "bias" => Ok(Self::Keywords),
            "all" => Ok(Self::All),
            other => Err(EthicsGenError::config(format!(
                "unknown filter mode '{other}': expected 'bias', 'keywords' or 'all'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// CrawlRecord
// ---------------------------------------------------------------------------

/// One extracted web-page text sample with provenance, as written to JSONL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    /// Original target URI of the archived response.
    pub url: String,
    /// Host of `url`, without port.
    pub domain: String,
    /// SHA-256 of `text`, hex encoded.
    pub id: String,
    /// Visible text extracted from the page.
    pub text: String,
}

impl CrawlRecord {
    /// Build a record, deriving `domain` from the URL and `id` from the text.
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        let url = url.into();
        let text = text.into();
        Self {
            domain: domain_of(&url),
            id: content_hash(&text),
            url,
            text,
        }
    }
}

/// Host of a URL, lowercased, without port. Empty if the URL does not parse.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default()
}

/// Compute SHA-256 hash of content.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// TrainingExample
// ---------------------------------------------------------------------------

/// One generated passage/category/reasoning triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Source passage the reasoning is about.
    pub passage: String,
    /// Ethical dimension the model was asked to focus on.
    pub category: Category,
    /// Canonical sentinel-delimited thought/solution text.
    pub reasoning: String,
    /// Provenance URL of the passage, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Provenance domain of the passage, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}
