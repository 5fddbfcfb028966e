use rusqlite::Connection;

use crate::util::now_utc_string;

pub(super) const DB_SCHEMA_VERSION: &str = "0.3.0";

pub(super) fn configure_connection(connection: &Connection) -> rusqlite::Result<()> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reports (
          bg_number INTEGER PRIMARY KEY,
          summary TEXT,
          description TEXT,
          product TEXT,
          component TEXT,
          assigned_to TEXT,
          creation_time INTEGER,
          when_changed_to_resolved INTEGER,
          when_final_change_assigned_to INTEGER,
          tfidf_vector BLOB,
          embeddings_vector BLOB,
          vectorizer_id TEXT,
          sample_set INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS arcs (
          from_id INTEGER NOT NULL,
          to_id INTEGER NOT NULL,
          cos_similarity_tfidf REAL NOT NULL,
          cos_similarity_word_embeddings REAL NOT NULL,
          categoric_similarity REAL NOT NULL,
          created_at TEXT NOT NULL,
          PRIMARY KEY (from_id, to_id)
        );

        CREATE TABLE IF NOT EXISTS arc_queries (
          from_id INTEGER PRIMARY KEY,
          arcs INTEGER NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS evaluation_results (
          result_id INTEGER PRIMARY KEY AUTOINCREMENT,
          version TEXT NOT NULL,
          strategy TEXT NOT NULL,
          k INTEGER NOT NULL,
          query INTEGER NOT NULL,
          status TEXT NOT NULL,
          failure_reason TEXT,
          feedback REAL NOT NULL,
          precision REAL NOT NULL,
          likelihood REAL NOT NULL,
          recommendations_json TEXT NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS vectorizers (
          vectorizer_id TEXT PRIMARY KEY,
          tfidf_json TEXT NOT NULL,
          embedding_json TEXT NOT NULL,
          created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reports_product ON reports(product);
        CREATE INDEX IF NOT EXISTS idx_reports_component ON reports(component);
        CREATE INDEX IF NOT EXISTS idx_reports_creation_time ON reports(creation_time);
        CREATE INDEX IF NOT EXISTS idx_reports_sample_set ON reports(sample_set);
        CREATE INDEX IF NOT EXISTS idx_evaluation_results_version_k ON evaluation_results(version, k);
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_opened_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}
