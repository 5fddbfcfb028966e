use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vectors::{DenseVector, SparseVector};

pub type BugId = i64;

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub bg_number: BugId,
    pub summary: String,
    pub description: String,
    pub product: String,
    pub component: String,
    pub assigned_to: String,
    pub creation_time: DateTime<Utc>,
    pub when_changed_to_resolved: Option<DateTime<Utc>>,
    pub when_final_change_assigned_to: Option<DateTime<Utc>>,
    pub tfidf_vector: Option<SparseVector>,
    pub embeddings_vector: Option<DenseVector>,
    pub vectorizer_id: Option<String>,
    pub sample_set: bool,
}

impl Report {
    pub fn has_vectors(&self) -> bool {
        self.tfidf_vector.is_some() && self.embeddings_vector.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityArc {
    pub from: BugId,
    pub to: BugId,
    pub cos_similarity_tfidf: f64,
    pub cos_similarity_word_embeddings: f64,
    pub categoric_similarity: f64,
}

impl SimilarityArc {
    pub fn signals(&self) -> SignalScores {
        SignalScores {
            tfidf: self.cos_similarity_tfidf,
            embedding: self.cos_similarity_word_embeddings,
            categoric: self.categoric_similarity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalScores {
    pub tfidf: f64,
    pub embedding: f64,
    pub categoric: f64,
}

#[derive(Debug, Clone)]
pub struct VectorUpdate {
    pub bg_number: BugId,
    pub tfidf_vector: SparseVector,
    pub embeddings_vector: DenseVector,
    pub vectorizer_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub bg_number: BugId,
    pub summary: String,
    pub description: String,
    pub product: String,
    pub component: String,
    pub assigned_to: String,
    pub creation_time: DateTime<Utc>,
    pub when_changed_to_resolved: Option<DateTime<Utc>>,
    pub when_final_change_assigned_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    Failed,
}

impl RecordStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSnapshot {
    pub rank: usize,
    pub bg_number: BugId,
    pub summary: String,
    pub product: String,
    pub component: String,
    pub assigned_to: String,
    pub score: f64,
    pub cos_similarity_tfidf: f64,
    pub cos_similarity_word_embeddings: f64,
    pub categoric_similarity: f64,
    pub relevant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub version: String,
    pub strategy: String,
    pub k: usize,
    pub query: BugId,
    pub status: RecordStatus,
    pub failure_reason: Option<String>,
    pub feedback: f64,
    pub precision: f64,
    pub likelihood: f64,
    pub recommendations: Vec<RecommendationSnapshot>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreCounts {
    pub reports: i64,
    pub vectorized: i64,
    pub sampled: i64,
    pub arcs: i64,
    pub arc_sources: i64,
    pub arc_queries: i64,
    pub evaluation_records: i64,
    pub vectorizers: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub input_path: String,
    pub records_read: usize,
    pub records_imported: usize,
    pub records_rejected: usize,
    pub derived_resolution_times: usize,
    pub duration_ms: u128,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorizeRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub vectorizer_id: String,
    pub vectorizer_reused: bool,
    pub vocabulary_size: usize,
    pub fitted_documents: usize,
    pub embedding_model_id: String,
    pub embedding_dim: usize,
    pub reports_missing_vectors: usize,
    pub reports_updated: usize,
    pub batch_size: usize,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub requested_size: usize,
    pub pool_size: usize,
    pub sampled: usize,
    pub seed: u64,
    pub creation_time_start: String,
    pub creation_time_end: String,
    pub years: BTreeMap<i32, usize>,
    pub products: BTreeMap<String, usize>,
    pub components: BTreeMap<String, usize>,
    pub bg_numbers: Vec<BugId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArcRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub queries: usize,
    pub queries_with_arcs: usize,
    pub queries_without_candidates: usize,
    pub queries_already_processed: usize,
    pub queries_failed: usize,
    pub arcs_written: usize,
    pub candidates_skipped: usize,
    pub spilled_batches: Vec<String>,
    pub duration_ms: u128,
}

/// Aggregates of one evaluation pass. Means are taken over the queries that
/// evaluated successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub version: String,
    pub strategy: String,
    pub k: usize,
    pub queries: usize,
    pub evaluated: usize,
    pub failed: usize,
    pub avg_feedback: f64,
    pub avg_precision: f64,
    pub avg_likelihood: f64,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub arc_source: String,
    pub sample_size: usize,
    pub strategies: Vec<String>,
    pub ks: Vec<usize>,
    pub records_saved: bool,
    pub passes: Vec<EvaluationSummary>,
    pub spilled_records: Vec<String>,
    pub duration_ms: u128,
}
