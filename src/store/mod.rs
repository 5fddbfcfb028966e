mod schema;
mod sqlite;

use serde::{Deserialize, Serialize};

use crate::candidates::CandidateFilter;
use crate::error::StoreError;
use crate::model::{BugId, EvaluationRecord, Report, SimilarityArc, VectorUpdate};
use crate::semantic::SemanticModelConfig;
use crate::tfidf::TfidfModel;

pub use sqlite::SqliteStore;

pub trait ReportStore {
    fn find_sample_reports(&self) -> Result<Vec<Report>, StoreError>;

    fn find_reports_missing_vectors(&self) -> Result<Vec<Report>, StoreError>;

    fn find_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Report>, StoreError>;

    fn load_report(&self, bg_number: BugId) -> Result<Option<Report>, StoreError>;

    fn arcs_from(&self, bg_number: BugId) -> Result<Vec<SimilarityArc>, StoreError>;

    /// True once the arc pass has handled `bg_number`, including queries that
    /// produced no arcs.
    fn is_processed_query(&self, bg_number: BugId) -> Result<bool, StoreError>;

    /// Writes `query`'s arcs and its processed marker in one transaction. Arcs
    /// whose `(from, to)` pair already exists are left untouched. Returns the
    /// number of new arc rows.
    fn insert_arcs(&self, query: BugId, batch: &[SimilarityArc]) -> Result<usize, StoreError>;

    fn insert_evaluation_records(&self, records: &[EvaluationRecord]) -> Result<usize, StoreError>;

    /// Fills vectors that are still missing; vectors already assigned are kept.
    fn update_report_vectors(&self, batch: &[VectorUpdate]) -> Result<usize, StoreError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredVectorizer {
    pub vectorizer_id: String,
    pub tfidf: TfidfModel,
    pub embedding_model: SemanticModelConfig,
    pub created_at: String,
}
