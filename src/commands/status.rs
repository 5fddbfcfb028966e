use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StoreArgs;
use crate::store::SqliteStore;

pub fn run(store_args: &StoreArgs) -> Result<()> {
    let db_path = store_args.db_path();
    info!(cache_root = %store_args.cache_root.display(), "status requested");

    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing");
        return Ok(());
    }

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let counts = store.counts().context("failed to count store rows")?;

    info!(
        path = %db_path.display(),
        reports = counts.reports,
        vectorized = counts.vectorized,
        sampled = counts.sampled,
        arcs = counts.arcs,
        arc_sources = counts.arc_sources,
        arc_queries = counts.arc_queries,
        evaluation_records = counts.evaluation_records,
        vectorizers = counts.vectorizers,
        "database status"
    );

    match store.load_latest_vectorizer()? {
        Some(vectorizer) => info!(
            vectorizer_id = %vectorizer.vectorizer_id,
            vocabulary = vectorizer.tfidf.vocabulary.len(),
            embedding_model = %vectorizer.embedding_model.model_id,
            created_at = %vectorizer.created_at,
            "active vectorizer"
        ),
        None => warn!("no vectorizer fitted yet"),
    }

    if counts.reports > counts.vectorized {
        warn!(
            missing = counts.reports - counts.vectorized,
            "reports without vectors"
        );
    }
    if counts.sampled > 0 && counts.arc_queries == 0 {
        warn!("arc pass has not run over the sample yet");
    }

    Ok(())
}
