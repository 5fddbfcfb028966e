//! Similarity-arc construction and persistence.
//!
//! Re-running the arc pass is idempotent: a query the store marks as processed
//! is skipped, and the store ignores `(from, to)` pairs it already holds.

use serde::Serialize;
use tracing::{debug, warn};

use crate::candidates::{CandidateFilter, select_candidates};
use crate::error::{ScoringError, StoreError};
use crate::model::{BugId, Report, SimilarityArc};
use crate::similarity::{categorical_similarity, embedding_similarity, tfidf_similarity};
use crate::store::ReportStore;
use crate::vectors::{DenseVector, SparseVector};

#[derive(Debug, thiserror::Error)]
pub enum ArcError {
    #[error("cannot score query")]
    Scoring(#[from] ScoringError),

    #[error("failed to load candidates")]
    Store(#[from] StoreError),

    /// The batch was computed but not written; it is handed back intact.
    #[error("failed to persist {} arcs for query {}", .batch.arcs.len(), .batch.query)]
    Persist {
        batch: Box<ArcBatch>,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArcBatch {
    pub query: BugId,
    pub arcs: Vec<SimilarityArc>,
    pub skipped_candidates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcOutcome {
    AlreadyProcessed,
    NoCandidates {
        skipped_candidates: usize,
    },
    Persisted {
        arcs: usize,
        skipped_candidates: usize,
    },
}

pub fn score_pair(query: &Report, candidate: &Report) -> Result<SimilarityArc, ScoringError> {
    let (query_tfidf, query_embedding) = report_vectors(query)?;
    let (candidate_tfidf, candidate_embedding) = report_vectors(candidate)?;

    let cos_similarity_word_embeddings =
        embedding_similarity(query_embedding, candidate_embedding)?;

    Ok(SimilarityArc {
        from: query.bg_number,
        to: candidate.bg_number,
        cos_similarity_tfidf: tfidf_similarity(query_tfidf, candidate_tfidf),
        cos_similarity_word_embeddings,
        categoric_similarity: categorical_similarity(query, candidate),
    })
}

fn report_vectors(report: &Report) -> Result<(&SparseVector, &DenseVector), ScoringError> {
    let tfidf = report
        .tfidf_vector
        .as_ref()
        .ok_or(ScoringError::MissingVector {
            bg_number: report.bg_number,
            vector: "tfidf",
        })?;
    let embedding = report
        .embeddings_vector
        .as_ref()
        .ok_or(ScoringError::MissingVector {
            bg_number: report.bg_number,
            vector: "embeddings",
        })?;
    Ok((tfidf, embedding))
}

pub fn build_arcs<'a, I>(query: &Report, candidates: I) -> Result<ArcBatch, ScoringError>
where
    I: IntoIterator<Item = &'a Report>,
{
    report_vectors(query)?;

    let mut batch = ArcBatch {
        query: query.bg_number,
        arcs: Vec::new(),
        skipped_candidates: 0,
    };

    for candidate in candidates {
        match score_pair(query, candidate) {
            Ok(arc) => batch.arcs.push(arc),
            Err(error) => {
                warn!(
                    query = query.bg_number,
                    candidate = candidate.bg_number,
                    error = %error,
                    "candidate skipped"
                );
                batch.skipped_candidates += 1;
            }
        }
    }

    Ok(batch)
}

pub fn persist_arcs<S: ReportStore + ?Sized>(
    store: &S,
    batch: &ArcBatch,
) -> Result<usize, StoreError> {
    store.insert_arcs(batch.query, &batch.arcs)
}

pub struct ArcBuilder<'a, S: ReportStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ReportStore + ?Sized> ArcBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn run_for_query(&self, query: &Report) -> Result<ArcOutcome, ArcError> {
        if self.store.is_processed_query(query.bg_number)? {
            debug!(query = query.bg_number, "query already processed, skipping");
            return Ok(ArcOutcome::AlreadyProcessed);
        }

        let fetched = self
            .store
            .find_candidates(&CandidateFilter::for_query(query))?;
        let batch = build_arcs(query, select_candidates(query, &fetched))?;

        let written = match persist_arcs(self.store, &batch) {
            Ok(written) => written,
            Err(source) => {
                return Err(ArcError::Persist {
                    batch: Box::new(batch),
                    source,
                });
            }
        };

        if batch.arcs.is_empty() {
            debug!(
                query = query.bg_number,
                skipped = batch.skipped_candidates,
                "no candidates"
            );
            return Ok(ArcOutcome::NoCandidates {
                skipped_candidates: batch.skipped_candidates,
            });
        }

        debug!(query = query.bg_number, arcs = written, "arcs persisted");
        Ok(ArcOutcome::Persisted {
            arcs: batch.arcs.len(),
            skipped_candidates: batch.skipped_candidates,
        })
    }
}
