//! Keyword-based category detection for free text.

use ethicsgen_shared::{Category, CategoryTaxonomy};

/// Keyword table per category. Categories without an entry never match.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Privacy,
        &["privacy", "data", "surveillance", "tracking", "consent", "collection"],
    ),
    (
        Category::Fairness,
        &["fairness", "bias", "discrimination", "equality", "equity", "justice"],
    ),
    (
        Category::Autonomy,
        &["autonomy", "freedom", "choice", "control", "coercion", "manipulation"],
    ),
    (
        Category::Harm,
        &["harm", "injury", "damage", "pain", "suffering", "safety", "risk"],
    ),
    (
        Category::Deception,
        &["deception", "truth", "honesty", "transparency", "misleading", "lying"],
    ),
];

/// Number of the category's keywords present in `lowered` (substring match).
fn score(category: Category, lowered: &str) -> usize {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, words)| words.iter().filter(|w| lowered.contains(*w)).count())
        .unwrap_or(0)
}

/// The taxonomy category with the most keyword hits, ties going to the
/// earlier category. `None` when nothing matches.
pub fn keyword_hint(text: &str, taxonomy: &CategoryTaxonomy) -> Option<Category> {
    let lowered = text.to_lowercase();
    let mut best: Option<(Category, usize)> = None;
    for category in taxonomy.iter() {
        let hits = score(category, &lowered);
        if hits > 0 && best.is_none_or(|(_, top)| hits > top) {
            best = Some((category, hits));
        }
    }
    best.map(|(c, _)| c)
}

/// Category for a scenario: the keyword hint, or `general_ethics`.
pub fn detect_category(text: &str, taxonomy: &CategoryTaxonomy) -> Category {
    keyword_hint(text, taxonomy).unwrap_or(Category::GeneralEthics)
}
