//! Deterministic (passage, category) pairing.
//!
//! Every record gets a category order: its keyword hint first (when enabled
//! and present in the taxonomy), otherwise `taxonomy[i mod len]`, followed by
//! the rest of the taxonomy cyclically. Pairs are issued in passes: pass 0
//! pairs every record with its first category, pass 1 with its second, and
//! so on. No pair is ever issued twice.

use ethicsgen_shared::{Category, CategoryTaxonomy, CrawlRecord};

use crate::categorize::keyword_hint;

/// One planned generation: a record index and the category to ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub record: usize,
    pub category: Category,
}

/// The pairings for a run and how far short of the request it falls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub pairings: Vec<Pairing>,
    pub requested: usize,
    /// Requested pairings that could not be planned (all pairs used).
    pub shortfall: usize,
}

/// Plan up to `count` distinct pairings over `records`.
pub fn plan_pairings(
    records: &[CrawlRecord],
    taxonomy: &CategoryTaxonomy,
    count: usize,
    match_hints: bool,
) -> Plan {
    let len = taxonomy.len();
    let starts: Vec<usize> = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let hinted = match_hints
                .then(|| keyword_hint(&record.text, taxonomy))
                .flatten()
                .and_then(|c| taxonomy.position(c));
            hinted.unwrap_or(i % len.max(1))
        })
        .collect();

    let capacity = records.len().saturating_mul(len);
    let target = count.min(capacity);
    let mut pairings = Vec::with_capacity(target);

    'passes: for pass in 0..len {
        for (record, start) in starts.iter().enumerate() {
            if pairings.len() == target {
                break 'passes;
            }
            if let Some(category) = taxonomy.get((start + pass) % len) {
                pairings.push(Pairing { record, category });
            }
        }
    }

    Plan {
        shortfall: count - pairings.len(),
        requested: count,
        pairings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn records(texts: &[&str]) -> Vec<CrawlRecord> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| CrawlRecord::new(format!("http://site{i}.com/"), *t))
            .collect()
    }

    #[test]
    fn first_pass_cycles_taxonomy_without_hints() {
        let recs = records(&["one", "two", "three"]);
        let plan = plan_pairings(&recs, &CategoryTaxonomy::default(), 3, false);

        let cats: Vec<Category> = plan.pairings.iter().map(|p| p.category).collect();
        assert_eq!(cats, vec![Category::Privacy, Category::Fairness, Category::Autonomy]);
        assert_eq!(plan.shortfall, 0);
    }

    #[test]
    fn hints_pick_the_first_category() {
        let recs = records(&["a story about deception and lying", "plain words"]);
        let plan = plan_pairings(&recs, &CategoryTaxonomy::default(), 2, true);

        assert_eq!(plan.pairings[0], Pairing { record: 0, category: Category::Deception });
        // No hint: falls back to taxonomy[1].
        assert_eq!(plan.pairings[1], Pairing { record: 1, category: Category::Fairness });
    }

    #[test]
    fn count_beyond_passages_reuses_under_new_categories() {
        let recs = records(&["a", "b"]);
        let plan = plan_pairings(&recs, &CategoryTaxonomy::default(), 5, false);

        let got: Vec<(usize, Category)> =
            plan.pairings.iter().map(|p| (p.record, p.category)).collect();
        assert_eq!(
            got,
            vec![
                (0, Category::Privacy),
                (1, Category::Fairness),
                (0, Category::Fairness),
                (1, Category::Autonomy),
                (0, Category::Autonomy),
            ]
        );
    }

    #[test]
    fn stops_short_when_pairs_run_out() {
        let recs = records(&["a", "b"]);
        let taxonomy = CategoryTaxonomy::new(vec![Category::Harm, Category::Privacy]).unwrap();
        let plan = plan_pairings(&recs, &taxonomy, 7, true);

        assert_eq!(plan.pairings.len(), 4);
        assert_eq!(plan.shortfall, 3);
        assert_eq!(plan.requested, 7);

        let unique: HashSet<(usize, Category)> =
            plan.pairings.iter().map(|p| (p.record, p.category)).collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn zero_count_and_no_records() {
        let recs = records(&["a"]);
        let plan = plan_pairings(&recs, &CategoryTaxonomy::default(), 0, true);
        assert!(plan.pairings.is_empty());
        assert_eq!(plan.shortfall, 0);

        let plan = plan_pairings(&[], &CategoryTaxonomy::default(), 3, true);
        assert!(plan.pairings.is_empty());
        assert_eq!(plan.shortfall, 3);
    }

    #[test]
    fn planning_is_deterministic() {
        let recs = records(&["privacy data", "bias", "x", "harm risk"]);
        let taxonomy = CategoryTaxonomy::default();
        assert_eq!(
            plan_pairings(&recs, &taxonomy, 15, true),
            plan_pairings(&recs, &taxonomy, 15, true)
        );
    }
}
