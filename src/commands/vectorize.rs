use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::{StoreArgs, VectorizeArgs};
use crate::commands::open_store;
use crate::model::{Report, VectorUpdate, VectorizeRunManifest};
use crate::semantic::{embed_text_local, report_payload_for_embedding, resolve_model_config};
use crate::store::{ReportStore, SqliteStore, StoredVectorizer};
use crate::tfidf::{TfidfModel, Tokenizer};
use crate::util::{ensure_directory, manifest_path, now_utc_string, run_id, write_json_pretty};
use crate::vectors::chunked;

pub fn run(args: VectorizeArgs, store_args: &StoreArgs) -> Result<()> {
    let started = Instant::now();
    let generated_at = now_utc_string();
    let run_id = run_id("vectorize");
    let batch_size = args.batch_size.max(1);
    let manifest_dir = store_args.manifest_dir();
    ensure_directory(&manifest_dir)?;

    let store = open_store(store_args)?;
    let tokenizer = Tokenizer::new()?;
    let (vectorizer, vectorizer_reused) = resolve_vectorizer(&store, &tokenizer, &args.model_id)?;

    let missing = store
        .find_reports_missing_vectors()
        .context("failed to load reports missing vectors")?;
    let reports_missing_vectors = missing.len();
    let dimensions = vectorizer.embedding_model.dimensions;

    let mut reports_updated = 0usize;
    for batch in chunked(missing, batch_size) {
        let updates = batch
            .iter()
            .map(|report| vectorize_report(report, &vectorizer, &tokenizer, dimensions))
            .collect::<Vec<VectorUpdate>>();
        reports_updated += store
            .update_report_vectors(&updates)
            .with_context(|| format!("failed to write vectors for {} reports", updates.len()))?;
        info!(
            vectorizer_id = %vectorizer.vectorizer_id,
            reports_updated,
            reports_missing_vectors,
            "vector batch committed"
        );
    }

    let manifest = VectorizeRunManifest {
        manifest_version: 1,
        run_id,
        generated_at,
        vectorizer_id: vectorizer.vectorizer_id.clone(),
        vectorizer_reused,
        vocabulary_size: vectorizer.tfidf.vocabulary.len(),
        fitted_documents: vectorizer.tfidf.doc_count,
        embedding_model_id: vectorizer.embedding_model.model_id.clone(),
        embedding_dim: dimensions,
        reports_missing_vectors,
        reports_updated,
        batch_size,
        duration_ms: started.elapsed().as_millis(),
    };
    let manifest_path = manifest_path(&manifest_dir, "vectorize_run");
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        vectorizer_id = %manifest.vectorizer_id,
        vectorizer_reused,
        reports_updated,
        "vectorization completed"
    );

    Ok(())
}

fn resolve_vectorizer(
    store: &SqliteStore,
    tokenizer: &Tokenizer,
    model_id: &str,
) -> Result<(StoredVectorizer, bool)> {
    let requested = resolve_model_config(model_id);

    if let Some(existing) = store.load_latest_vectorizer()? {
        if existing.embedding_model != requested {
            warn!(
                requested = %requested.model_id,
                stored = %existing.embedding_model.model_id,
                "keeping the stored embedding model"
            );
        }
        return Ok((existing, true));
    }

    let texts = store.load_report_texts()?;
    let documents = texts
        .iter()
        .map(|(_, summary, description)| report_text(summary, description))
        .collect::<Vec<String>>();
    let tfidf = TfidfModel::fit(tokenizer, documents.iter().map(String::as_str));
    let vectorizer_id = vectorizer_id(&tfidf, &requested.model_id);

    let vectorizer = StoredVectorizer {
        vectorizer_id,
        tfidf,
        embedding_model: requested,
        created_at: now_utc_string(),
    };
    store
        .save_vectorizer(&vectorizer)
        .context("failed to save vectorizer")?;

    info!(
        vectorizer_id = %vectorizer.vectorizer_id,
        vocabulary = vectorizer.tfidf.vocabulary.len(),
        documents = vectorizer.tfidf.doc_count,
        "vectorizer fitted"
    );
    Ok((vectorizer, false))
}

fn vectorizer_id(tfidf: &TfidfModel, model_id: &str) -> String {
    let fingerprint = tfidf.fingerprint();
    let short = fingerprint.chars().take(16).collect::<String>();
    format!("tfidf-{short}+{model_id}")
}

fn report_text(summary: &str, description: &str) -> String {
    report_payload_for_embedding(summary, description).unwrap_or_default()
}

fn vectorize_report(
    report: &Report,
    vectorizer: &StoredVectorizer,
    tokenizer: &Tokenizer,
    dimensions: usize,
) -> VectorUpdate {
    let text = report_text(&report.summary, &report.description);
    VectorUpdate {
        bg_number: report.bg_number,
        tfidf_vector: vectorizer.tfidf.transform(tokenizer, &text),
        embeddings_vector: embed_text_local(&text, dimensions),
        vectorizer_id: vectorizer.vectorizer_id.clone(),
    }
}
