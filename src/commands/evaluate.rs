use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{EvaluateArgs, StoreArgs};
use crate::commands::{build_recommender, open_store};
use crate::evaluate::{EvaluationHarness, EvaluationPass, SweepPlan, run_sweep};
use crate::model::SweepManifest;
use crate::recommend::ScoringConfig;
use crate::store::ReportStore;
use crate::util::{ensure_directory, manifest_path, now_utc_string, run_id, write_json_pretty};

pub fn run(args: EvaluateArgs, store_args: &StoreArgs) -> Result<()> {
    let started = Instant::now();
    let generated_at = now_utc_string();
    let run_id = run_id("evaluate");
    let manifest_dir = store_args.manifest_dir();
    ensure_directory(&manifest_dir)?;

    let config = ScoringConfig::load(args.scoring_config.as_deref())?;
    let plan = sweep_plan(&args);
    let store = open_store(store_args)?;
    let sample = store
        .find_sample_reports()
        .context("failed to load sampled reports")?;
    if sample.is_empty() {
        warn!("no sampled reports; run `bugrec sample` first");
    }

    let harness = EvaluationHarness::new(&store, build_recommender(&store, args.source, config))
        .with_persistence(args.save_results);
    info!(
        sample = sample.len(),
        passes = plan.pass_count(),
        source = harness.recommender().source_name(),
        save_results = args.save_results,
        "evaluation sweep started"
    );

    let outcome = run_sweep(&harness, &sample, &plan);
    let spilled_records = outcome
        .unwritten
        .iter()
        .map(|pass| spill_pass(&manifest_dir, &run_id, pass))
        .collect::<Result<Vec<String>>>()?;

    let manifest = SweepManifest {
        manifest_version: 1,
        run_id,
        generated_at,
        arc_source: harness.recommender().source_name().to_string(),
        sample_size: sample.len(),
        strategies: plan
            .strategies
            .iter()
            .map(|strategy| strategy.as_str().to_string())
            .collect(),
        ks: plan.ks.clone(),
        records_saved: args.save_results,
        passes: outcome.summaries,
        spilled_records,
        duration_ms: started.elapsed().as_millis(),
    };
    let manifest_path = manifest_path(&manifest_dir, "evaluation_sweep");
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        passes = manifest.passes.len(),
        spilled = manifest.spilled_records.len(),
        duration_ms = manifest.duration_ms as u64,
        "evaluation sweep completed"
    );

    Ok(())
}

fn sweep_plan(args: &EvaluateArgs) -> SweepPlan {
    let mut plan = SweepPlan::default();
    if !args.strategies.is_empty() {
        plan.strategies = args.strategies.clone();
    }
    if !args.ks.is_empty() {
        plan.ks = args.ks.clone();
    }
    plan.version_prefix = args.version_prefix.clone();
    plan
}

fn spill_pass(manifest_dir: &Path, run_id: &str, pass: &EvaluationPass) -> Result<String> {
    let path = manifest_dir.join(format!(
        "{run_id}_unwritten_{}_k{}.json",
        pass.summary.strategy, pass.summary.k
    ));
    write_json_pretty(&path, &pass.records)?;
    Ok(path.display().to_string())
}
