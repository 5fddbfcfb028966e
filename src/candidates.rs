use chrono::{DateTime, Utc};

use crate::model::Report;

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFilter {
    pub created_before: DateTime<Utc>,
    pub resolved_after: DateTime<Utc>,
    pub product: String,
    pub component: String,
}

impl CandidateFilter {
    pub fn for_query(query: &Report) -> Self {
        Self {
            created_before: query.creation_time,
            resolved_after: query.creation_time,
            product: query.product.clone(),
            component: query.component.clone(),
        }
    }

    pub fn matches(&self, candidate: &Report) -> bool {
        if !candidate.has_vectors() {
            return false;
        }

        if candidate.creation_time >= self.created_before {
            return false;
        }

        // Unresolved reports cannot satisfy the range check.
        let resolved_in_window = candidate
            .when_changed_to_resolved
            .is_some_and(|resolved| resolved > self.resolved_after);
        if !resolved_in_window {
            return false;
        }

        candidate.product == self.product || candidate.component == self.component
    }
}

pub fn is_eligible(query: &Report, candidate: &Report) -> bool {
    CandidateFilter::for_query(query).matches(candidate)
}

pub fn select_candidates<'a>(query: &Report, corpus: &'a [Report]) -> Vec<&'a Report> {
    let filter = CandidateFilter::for_query(query);
    corpus
        .iter()
        .filter(|candidate| filter.matches(candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, generated_corpus, report, scenario, vectorized};

    #[test]
    fn scenario_selects_r1_and_r4_only() {
        let (query, corpus) = scenario();
        let selected = select_candidates(&query, &corpus)
            .into_iter()
            .map(|candidate| candidate.bg_number)
            .collect::<Vec<i64>>();
        assert_eq!(selected, vec![1, 4]);
    }

    #[test]
    fn candidates_without_vectors_are_excluded() {
        let query = at(report(10, "P1", "C1", "dev-A"), "2010-01-01", None);
        let bare = at(report(11, "P1", "C1", "dev-A"), "2009-01-01", Some("2011-01-01"));
        assert!(!is_eligible(&query, &bare));
        assert!(is_eligible(&query, &vectorized(bare, 0)));
    }

    #[test]
    fn boundary_timestamps_are_excluded() {
        let query = at(report(10, "P1", "C1", "dev-A"), "2010-01-01", None);
        let same_creation = vectorized(
            at(report(11, "P1", "C1", "dev-A"), "2010-01-01", Some("2011-01-01")),
            1,
        );
        let resolved_at_query_time = vectorized(
            at(report(12, "P1", "C1", "dev-A"), "2009-01-01", Some("2010-01-01")),
            2,
        );
        let unresolved = vectorized(at(report(13, "P1", "C1", "dev-A"), "2009-01-01", None), 3);

        assert!(!is_eligible(&query, &same_creation));
        assert!(!is_eligible(&query, &resolved_at_query_time));
        assert!(!is_eligible(&query, &unresolved));
    }

    #[test]
    fn categorical_overlap_is_inclusive_or() {
        let query = at(report(10, "P1", "C1", "dev-A"), "2010-01-01", None);
        let window = |id: i64, product: &str, component: &str| {
            vectorized(
                at(report(id, product, component, "dev"), "2009-01-01", Some("2011-01-01")),
                id as usize,
            )
        };

        assert!(is_eligible(&query, &window(1, "P1", "C9")));
        assert!(is_eligible(&query, &window(2, "P9", "C1")));
        assert!(is_eligible(&query, &window(3, "P1", "C1")));
        assert!(!is_eligible(&query, &window(4, "P9", "C9")));
        assert!(!is_eligible(&query, &window(5, "p1", "c1")));
    }

    #[test]
    fn selection_never_violates_temporal_causality() {
        let corpus = generated_corpus(240, 0x5EED);
        for query in corpus.iter().step_by(7) {
            for candidate in select_candidates(query, &corpus) {
                assert!(candidate.creation_time < query.creation_time);
                let resolved = candidate
                    .when_changed_to_resolved
                    .expect("eligible candidates are resolved");
                assert!(resolved > query.creation_time);
                assert_ne!(candidate.bg_number, query.bg_number);
            }
        }
    }

    #[test]
    fn empty_corpus_yields_empty_selection() {
        let query = at(report(10, "P1", "C1", "dev-A"), "2010-01-01", None);
        assert!(select_candidates(&query, &[]).is_empty());
    }
}
