use std::time::Instant;

use tracing::{info, warn};

use super::{EvaluationError, EvaluationHarness, EvaluationPass};
use crate::model::{EvaluationSummary, Report};
use crate::recommend::ScoringStrategy;
use crate::store::ReportStore;

pub const DEFAULT_MAX_K: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepPlan {
    pub strategies: Vec<ScoringStrategy>,
    pub ks: Vec<usize>,
    pub version_prefix: Option<String>,
}

impl Default for SweepPlan {
    fn default() -> Self {
        Self {
            strategies: ScoringStrategy::ALL.to_vec(),
            ks: (1..=DEFAULT_MAX_K).collect(),
            version_prefix: None,
        }
    }
}

impl SweepPlan {
    pub fn version_for(&self, strategy: ScoringStrategy) -> String {
        match self.version_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{}", strategy.as_str()),
            _ => strategy.as_str().to_string(),
        }
    }

    pub fn pass_count(&self) -> usize {
        self.strategies.len() * self.ks.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    pub summaries: Vec<EvaluationSummary>,
    pub unwritten: Vec<EvaluationPass>,
    pub duration_ms: u128,
}

/// Runs every pass of `plan` in order. A pass whose records fail to persist
/// still contributes its summary and the sweep carries on.
pub fn run_sweep<S: ReportStore + ?Sized>(
    harness: &EvaluationHarness<'_, S>,
    sample: &[Report],
    plan: &SweepPlan,
) -> SweepOutcome {
    let started = Instant::now();
    let total = plan.pass_count();
    let mut outcome = SweepOutcome::default();

    for strategy in &plan.strategies {
        let version = plan.version_for(*strategy);
        for k in &plan.ks {
            match harness.evaluate(sample, *k, &version, *strategy) {
                Ok(pass) => outcome.summaries.push(pass.summary),
                Err(EvaluationError::Persist { pass, source }) => {
                    warn!(
                        strategy = strategy.as_str(),
                        k = *k,
                        records = pass.records.len(),
                        error = %source,
                        "evaluation records not saved"
                    );
                    outcome.summaries.push(pass.summary.clone());
                    outcome.unwritten.push(*pass);
                }
            }

            info!(
                pass = outcome.summaries.len(),
                total,
                strategy = strategy.as_str(),
                k = *k,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "sweep progress"
            );
        }
    }

    outcome.duration_ms = started.elapsed().as_millis();
    outcome
}
