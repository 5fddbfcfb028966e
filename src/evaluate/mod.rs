mod metrics;
mod sweep;

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::model::{
    EvaluationRecord, EvaluationSummary, RecommendationSnapshot, RecordStatus, Report,
};
use crate::recommend::{Recommendation, Recommender, ScoringStrategy};
use crate::store::ReportStore;
use crate::util::now_utc_string;

pub use metrics::{feedback, is_relevant, likelihood, mean, precision};
pub use sweep::{SweepPlan, run_sweep};

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(
        "failed to persist {} evaluation records for {} K={}",
        .pass.records.len(),
        .pass.summary.strategy,
        .pass.summary.k
    )]
    Persist {
        pass: Box<EvaluationPass>,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone)]
pub struct EvaluationPass {
    pub summary: EvaluationSummary,
    pub records: Vec<EvaluationRecord>,
}

pub struct EvaluationHarness<'a, S: ReportStore + ?Sized> {
    store: &'a S,
    recommender: Recommender<'a>,
    persist: bool,
}

impl<'a, S: ReportStore + ?Sized> EvaluationHarness<'a, S> {
    pub fn new(store: &'a S, recommender: Recommender<'a>) -> Self {
        Self {
            store,
            recommender,
            persist: false,
        }
    }

    pub fn with_persistence(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn recommender(&self) -> &Recommender<'a> {
        &self.recommender
    }

    /// Runs one pass. A query that cannot be recommended for gets a failed
    /// record and is left out of the averages.
    pub fn evaluate(
        &self,
        sample: &[Report],
        k: usize,
        version: &str,
        strategy: ScoringStrategy,
    ) -> Result<EvaluationPass, EvaluationError> {
        let started = Instant::now();
        let created_at = now_utc_string();
        let mut records = Vec::<EvaluationRecord>::with_capacity(sample.len());

        for query in sample {
            debug!(
                query = query.bg_number,
                summary = %query.summary,
                "requesting recommendations"
            );

            let record = match self.recommender.get_recommendations(query, k, strategy) {
                Ok(recommendations) => {
                    log_recommendations(query, &recommendations);
                    EvaluationRecord {
                        version: version.to_string(),
                        strategy: strategy.as_str().to_string(),
                        k,
                        query: query.bg_number,
                        status: RecordStatus::Ok,
                        failure_reason: None,
                        feedback: feedback(recommendations.len(), k),
                        precision: precision(query, &recommendations),
                        likelihood: likelihood(query, &recommendations),
                        recommendations: snapshot(query, &recommendations),
                        created_at: created_at.clone(),
                    }
                }
                Err(error) => {
                    let reason = error_chain(&error);
                    warn!(query = query.bg_number, error = %reason, "query evaluation failed");
                    EvaluationRecord {
                        version: version.to_string(),
                        strategy: strategy.as_str().to_string(),
                        k,
                        query: query.bg_number,
                        status: RecordStatus::Failed,
                        failure_reason: Some(reason),
                        feedback: 0.0,
                        precision: 0.0,
                        likelihood: 0.0,
                        recommendations: Vec::new(),
                        created_at: created_at.clone(),
                    }
                }
            };
            records.push(record);
        }

        let summary = summarize(&records, k, version, strategy, started.elapsed().as_millis());
        info!(
            version = %summary.version,
            strategy = %summary.strategy,
            k = summary.k,
            queries = summary.queries,
            failed = summary.failed,
            avg_feedback = summary.avg_feedback,
            avg_precision = summary.avg_precision,
            avg_likelihood = summary.avg_likelihood,
            duration_ms = summary.duration_ms as u64,
            "evaluation pass complete"
        );

        let pass = EvaluationPass { summary, records };
        if !self.persist {
            return Ok(pass);
        }

        match self.store.insert_evaluation_records(&pass.records) {
            Ok(written) => {
                debug!(records = written, "evaluation records saved");
                Ok(pass)
            }
            Err(source) => Err(EvaluationError::Persist {
                pass: Box::new(pass),
                source,
            }),
        }
    }
}

fn summarize(
    records: &[EvaluationRecord],
    k: usize,
    version: &str,
    strategy: ScoringStrategy,
    duration_ms: u128,
) -> EvaluationSummary {
    let evaluated = records
        .iter()
        .filter(|record| record.status == RecordStatus::Ok)
        .collect::<Vec<&EvaluationRecord>>();
    let values = |metric: fn(&EvaluationRecord) -> f64| {
        evaluated.iter().copied().map(metric).collect::<Vec<f64>>()
    };

    EvaluationSummary {
        version: version.to_string(),
        strategy: strategy.as_str().to_string(),
        k,
        queries: records.len(),
        evaluated: evaluated.len(),
        failed: records.len() - evaluated.len(),
        avg_feedback: mean(&values(|record| record.feedback)),
        avg_precision: mean(&values(|record| record.precision)),
        avg_likelihood: mean(&values(|record| record.likelihood)),
        duration_ms,
    }
}

fn snapshot(query: &Report, recommendations: &[Recommendation]) -> Vec<RecommendationSnapshot> {
    recommendations
        .iter()
        .map(|item| RecommendationSnapshot {
            rank: item.rank,
            bg_number: item.report.bg_number,
            summary: item.report.summary.clone(),
            product: item.report.product.clone(),
            component: item.report.component.clone(),
            assigned_to: item.report.assigned_to.clone(),
            score: item.score,
            cos_similarity_tfidf: item.signals.tfidf,
            cos_similarity_word_embeddings: item.signals.embedding,
            categoric_similarity: item.signals.categoric,
            relevant: is_relevant(query, &item.report),
        })
        .collect()
}

fn log_recommendations(query: &Report, recommendations: &[Recommendation]) {
    for item in recommendations {
        debug!(
            query = query.bg_number,
            rank = item.rank,
            bg_number = item.report.bg_number,
            rlv = is_relevant(query, &item.report),
            scr = item.score,
            comp = %item.report.component,
            prod = %item.report.product,
            summ = %item.report.summary,
            "recommendation"
        );
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut cause = error.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        cause = inner.source();
    }
    message
}
