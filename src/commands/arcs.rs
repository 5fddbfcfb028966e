use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::arcs::{ArcBatch, ArcBuilder, ArcError, ArcOutcome};
use crate::cli::{ArcsArgs, StoreArgs};
use crate::commands::open_store;
use crate::model::ArcRunManifest;
use crate::store::ReportStore;
use crate::util::{ensure_directory, manifest_path, now_utc_string, run_id, write_json_pretty};

pub fn run(args: ArcsArgs, store_args: &StoreArgs) -> Result<()> {
    let started = Instant::now();
    let generated_at = now_utc_string();
    let run_id = run_id("arcs");
    let manifest_dir = store_args.manifest_dir();
    ensure_directory(&manifest_dir)?;

    let store = open_store(store_args)?;
    let mut sample = store
        .find_sample_reports()
        .context("failed to load sampled reports")?;
    if let Some(limit) = args.limit {
        sample.truncate(limit);
    }
    if sample.is_empty() {
        warn!("no sampled reports; run `bugrec sample` first");
    }

    let builder = ArcBuilder::new(&store);
    let mut manifest = ArcRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        generated_at,
        queries: sample.len(),
        queries_with_arcs: 0,
        queries_without_candidates: 0,
        queries_already_processed: 0,
        queries_failed: 0,
        arcs_written: 0,
        candidates_skipped: 0,
        spilled_batches: Vec::new(),
        duration_ms: 0,
    };

    for (index, query) in sample.iter().enumerate() {
        match builder.run_for_query(query) {
            Ok(ArcOutcome::Persisted {
                arcs,
                skipped_candidates,
            }) => {
                manifest.queries_with_arcs += 1;
                manifest.arcs_written += arcs;
                manifest.candidates_skipped += skipped_candidates;
                info!(bg_number = query.bg_number, arcs, "arcs persisted");
            }
            Ok(ArcOutcome::NoCandidates { skipped_candidates }) => {
                manifest.queries_without_candidates += 1;
                manifest.candidates_skipped += skipped_candidates;
                info!(bg_number = query.bg_number, skipped_candidates, "no candidates");
            }
            Ok(ArcOutcome::AlreadyProcessed) => {
                manifest.queries_already_processed += 1;
            }
            Err(ArcError::Persist { batch, source }) if source.is_retryable() => {
                manifest.queries_failed += 1;
                warn!(
                    bg_number = query.bg_number,
                    arcs = batch.arcs.len(),
                    error = %source,
                    "arc batch not persisted"
                );
                let path = spill_batch(&manifest_dir, &run_id, &batch)?;
                manifest.spilled_batches.push(path);
            }
            Err(ArcError::Scoring(error)) => {
                manifest.queries_failed += 1;
                warn!(bg_number = query.bg_number, error = %error, "query skipped");
            }
            Err(error @ (ArcError::Store(_) | ArcError::Persist { .. })) => {
                return Err(error).with_context(|| {
                    format!("arc pass aborted at report {}", query.bg_number)
                });
            }
        }

        if (index + 1) % 500 == 0 {
            info!(
                processed = index + 1,
                queries = manifest.queries,
                arcs_written = manifest.arcs_written,
                "arc pass progress"
            );
        }
    }

    manifest.duration_ms = started.elapsed().as_millis();
    let manifest_path = manifest_path(&manifest_dir, "arc_run");
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        queries = manifest.queries,
        queries_with_arcs = manifest.queries_with_arcs,
        queries_failed = manifest.queries_failed,
        arcs_written = manifest.arcs_written,
        duration_ms = manifest.duration_ms as u64,
        "arc pass completed"
    );

    Ok(())
}

fn spill_batch(manifest_dir: &Path, run_id: &str, batch: &ArcBatch) -> Result<String> {
    let path = manifest_dir.join(format!("{run_id}_unwritten_{}.json", batch.query));
    write_json_pretty(&path, batch)?;
    Ok(path.display().to_string())
}
