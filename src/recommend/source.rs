use tracing::warn;

use super::RecommendError;
use crate::arcs::score_pair;
use crate::candidates::{CandidateFilter, is_eligible};
use crate::model::{Report, SignalScores};
use crate::store::ReportStore;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub report: Report,
    pub signals: SignalScores,
}

pub trait ArcSource {
    fn name(&self) -> &'static str;

    fn resolve(&self, query: &Report) -> Result<Vec<ScoredCandidate>, RecommendError>;
}

pub struct PrecomputedArcs<'a, S: ReportStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ReportStore + ?Sized> PrecomputedArcs<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: ReportStore + ?Sized> ArcSource for PrecomputedArcs<'_, S> {
    fn name(&self) -> &'static str {
        "precomputed"
    }

    fn resolve(&self, query: &Report) -> Result<Vec<ScoredCandidate>, RecommendError> {
        // No arcs means "no candidates" only for a query the arc pass has seen.
        if !self.store.is_processed_query(query.bg_number)? {
            return Err(RecommendError::NotProcessed {
                bg_number: query.bg_number,
            });
        }

        let arcs = self.store.arcs_from(query.bg_number)?;
        let mut out = Vec::with_capacity(arcs.len());

        for arc in arcs {
            let Some(report) = self.store.load_report(arc.to)? else {
                warn!(
                    query = query.bg_number,
                    candidate = arc.to,
                    "arc points at a missing report"
                );
                continue;
            };
            // A re-import can move a target out of the query's window.
            if !is_eligible(query, &report) {
                warn!(
                    query = query.bg_number,
                    candidate = arc.to,
                    "arc target no longer eligible"
                );
                continue;
            }
            out.push(ScoredCandidate {
                report,
                signals: arc.signals(),
            });
        }

        Ok(out)
    }
}

pub struct LiveScoring<'a, S: ReportStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ReportStore + ?Sized> LiveScoring<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: ReportStore + ?Sized> ArcSource for LiveScoring<'_, S> {
    fn name(&self) -> &'static str {
        "live"
    }

    fn resolve(&self, query: &Report) -> Result<Vec<ScoredCandidate>, RecommendError> {
        if !query.has_vectors() {
            return Err(RecommendError::MissingVector {
                bg_number: query.bg_number,
            });
        }

        let filter = CandidateFilter::for_query(query);
        let mut candidates = self.store.find_candidates(&filter)?;
        candidates.retain(|candidate| filter.matches(candidate));
        let mut out = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match score_pair(query, &candidate) {
                Ok(arc) => out.push(ScoredCandidate {
                    signals: arc.signals(),
                    report: candidate,
                }),
                Err(error) => warn!(
                    query = query.bg_number,
                    candidate = candidate.bg_number,
                    error = %error,
                    "candidate skipped"
                ),
            }
        }

        Ok(out)
    }
}
