//! Top-K assignee recommendation.
//!
//! Candidates are ranked by a strategy-weighted sum of their similarity
//! signals. Equal scores are ordered by ascending `bg_number`, so a ranking is
//! fully determined by its inputs.

mod source;
mod strategy;
#[cfg(test)]
mod tests;

use crate::error::StoreError;
use crate::model::{BugId, Report, SignalScores};
use crate::store::ReportStore;

pub use source::{ArcSource, LiveScoring, PrecomputedArcs, ScoredCandidate};
pub use strategy::{ScoringConfig, ScoringStrategy};

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("query {bg_number} has no vectors and cannot be scored")]
    MissingVector { bg_number: BugId },

    #[error("query {bg_number} has not been through the arc pass")]
    NotProcessed { bg_number: BugId },

    #[error("failed to resolve candidates")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub rank: usize,
    pub report: Report,
    pub score: f64,
    pub signals: SignalScores,
}

pub struct Recommender<'a> {
    source: Box<dyn ArcSource + 'a>,
    config: ScoringConfig,
}

impl<'a> Recommender<'a> {
    pub fn new(source: Box<dyn ArcSource + 'a>, config: ScoringConfig) -> Self {
        Self { source, config }
    }

    pub fn precomputed<S: ReportStore + ?Sized>(store: &'a S, config: ScoringConfig) -> Self {
        Self::new(Box::new(PrecomputedArcs::new(store)), config)
    }

    pub fn live<S: ReportStore + ?Sized>(store: &'a S, config: ScoringConfig) -> Self {
        Self::new(Box::new(LiveScoring::new(store)), config)
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    pub fn get_recommendations(
        &self,
        query: &Report,
        k: usize,
        strategy: ScoringStrategy,
    ) -> Result<Vec<Recommendation>, RecommendError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.source.resolve(query)?;
        Ok(rank_candidates(candidates, k, strategy, &self.config))
    }
}

pub fn rank_candidates(
    candidates: Vec<ScoredCandidate>,
    k: usize,
    strategy: ScoringStrategy,
    config: &ScoringConfig,
) -> Vec<Recommendation> {
    let mut scored = candidates
        .into_iter()
        .map(|candidate| {
            let score = config.composite(strategy, &candidate.signals);
            (score, candidate)
        })
        .collect::<Vec<(f64, ScoredCandidate)>>();

    scored.sort_by(|(left_score, left), (right_score, right)| {
        right_score
            .total_cmp(left_score)
            .then(left.report.bg_number.cmp(&right.report.bg_number))
    });
    scored.truncate(k);

    scored
        .into_iter()
        .enumerate()
        .map(|(index, (score, candidate))| Recommendation {
            rank: index + 1,
            report: candidate.report,
            score,
            signals: candidate.signals,
        })
        .collect()
}
