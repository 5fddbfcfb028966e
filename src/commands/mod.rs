pub mod arcs;
pub mod evaluate;
pub mod import;
pub mod recommend;
pub mod sample;
pub mod status;
pub mod vectorize;

use anyhow::{Context, Result};

use crate::cli::{ArcSourceKind, StoreArgs};
use crate::recommend::{Recommender, ScoringConfig};
use crate::store::SqliteStore;
use crate::util::ensure_directory;

pub fn open_store(args: &StoreArgs) -> Result<SqliteStore> {
    let db_path = args.db_path();
    if let Some(parent) = db_path.parent().filter(|path| !path.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open store: {}", db_path.display()))
}

pub fn build_recommender(
    store: &SqliteStore,
    source: ArcSourceKind,
    config: ScoringConfig,
) -> Recommender<'_> {
    match source {
        ArcSourceKind::Precomputed => Recommender::precomputed(store, config),
        ArcSourceKind::Live => Recommender::live(store, config),
    }
}
