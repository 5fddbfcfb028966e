use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, Transaction, params};

use super::schema::{configure_connection, ensure_schema};
use super::{ReportStore, StoredVectorizer};
use crate::candidates::CandidateFilter;
use crate::error::StoreError;
use crate::model::{
    BugId, EvaluationRecord, NewReport, Report, SimilarityArc, StoreCounts, VectorUpdate,
};
use crate::util::now_utc_string;
use crate::vectors::{decode_dense_blob, decode_sparse_blob, encode_dense_blob, encode_sparse_blob};

const REPORT_COLUMNS: &str = "
  bg_number,
  summary,
  description,
  product,
  component,
  assigned_to,
  creation_time,
  when_changed_to_resolved,
  when_final_change_assigned_to,
  tfidf_vector,
  embeddings_vector,
  vectorizer_id,
  sample_set
";

pub struct SqliteStore {
    connection: Connection,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let connection = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure_connection(&connection)?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        ensure_schema(&connection)?;
        Ok(Self { connection })
    }

    #[cfg(test)]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Inserts or refreshes report metadata. Vectors and sample flags of
    /// existing rows are preserved.
    pub fn upsert_reports(&self, reports: &[NewReport]) -> Result<usize, StoreError> {
        if reports.is_empty() {
            return Ok(0);
        }

        self.write_batch("upsert_reports", reports.len(), |tx| {
            let mut statement = tx.prepare(
                "
                INSERT INTO reports(
                  bg_number, summary, description, product, component, assigned_to,
                  creation_time, when_changed_to_resolved, when_final_change_assigned_to
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT(bg_number) DO UPDATE SET
                  summary=excluded.summary,
                  description=excluded.description,
                  product=excluded.product,
                  component=excluded.component,
                  assigned_to=excluded.assigned_to,
                  creation_time=excluded.creation_time,
                  when_changed_to_resolved=excluded.when_changed_to_resolved,
                  when_final_change_assigned_to=excluded.when_final_change_assigned_to
                ",
            )?;

            let mut written = 0usize;
            for report in reports {
                written += statement.execute(params![
                    report.bg_number,
                    report.summary,
                    report.description,
                    report.product,
                    report.component,
                    report.assigned_to,
                    report.creation_time.timestamp_millis(),
                    report.when_changed_to_resolved.map(|value| value.timestamp_millis()),
                    report
                        .when_final_change_assigned_to
                        .map(|value| value.timestamp_millis()),
                ])?;
            }
            Ok(written)
        })
    }

    pub fn find_sample_pool(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Report>, StoreError> {
        self.query_reports(
            &format!(
                "
                SELECT {REPORT_COLUMNS}
                FROM reports
                WHERE tfidf_vector IS NOT NULL
                  AND embeddings_vector IS NOT NULL
                  AND creation_time > ?1
                  AND creation_time < ?2
                  AND sample_set = 0
                ORDER BY bg_number ASC
                "
            ),
            params![start.timestamp_millis(), end.timestamp_millis()],
        )
    }

    pub fn mark_sample(&self, bg_numbers: &[BugId]) -> Result<usize, StoreError> {
        if bg_numbers.is_empty() {
            return Ok(0);
        }

        self.write_batch("mark_sample", bg_numbers.len(), |tx| {
            let mut statement =
                tx.prepare("UPDATE reports SET sample_set = 1 WHERE bg_number = ?1")?;
            let mut written = 0usize;
            for bg_number in bg_numbers {
                written += statement.execute([bg_number])?;
            }
            Ok(written)
        })
    }

    pub fn load_report_texts(&self) -> Result<Vec<(BugId, String, String)>, StoreError> {
        let mut statement = self.connection.prepare(
            "
            SELECT bg_number, COALESCE(summary, ''), COALESCE(description, '')
            FROM reports
            ORDER BY bg_number ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((row.get(0)?, row.get(1)?, row.get(2)?));
        }
        Ok(out)
    }

    pub fn save_vectorizer(&self, vectorizer: &StoredVectorizer) -> Result<(), StoreError> {
        let tfidf_json = serde_json::to_string(&vectorizer.tfidf)?;
        let embedding_json = serde_json::to_string(&vectorizer.embedding_model)?;

        self.write_batch("save_vectorizer", 1, |tx| {
            tx.execute(
                "
                INSERT INTO vectorizers(vectorizer_id, tfidf_json, embedding_json, created_at)
                VALUES(?1, ?2, ?3, ?4)
                ON CONFLICT(vectorizer_id) DO NOTHING
                ",
                params![
                    vectorizer.vectorizer_id,
                    tfidf_json,
                    embedding_json,
                    vectorizer.created_at,
                ],
            )
        })?;

        Ok(())
    }

    pub fn load_latest_vectorizer(&self) -> Result<Option<StoredVectorizer>, StoreError> {
        let row = self
            .connection
            .query_row(
                "
                SELECT vectorizer_id, tfidf_json, embedding_json, created_at
                FROM vectorizers
                ORDER BY created_at DESC, vectorizer_id DESC
                LIMIT 1
                ",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((vectorizer_id, tfidf_json, embedding_json, created_at)) = row else {
            return Ok(None);
        };

        Ok(Some(StoredVectorizer {
            vectorizer_id,
            tfidf: serde_json::from_str(&tfidf_json)?,
            embedding_model: serde_json::from_str(&embedding_json)?,
            created_at,
        }))
    }

    pub fn counts(&self) -> Result<StoreCounts, StoreError> {
        Ok(StoreCounts {
            reports: self.count("SELECT COUNT(*) FROM reports")?,
            vectorized: self.count(
                "SELECT COUNT(*) FROM reports
                 WHERE tfidf_vector IS NOT NULL AND embeddings_vector IS NOT NULL",
            )?,
            sampled: self.count("SELECT COUNT(*) FROM reports WHERE sample_set = 1")?,
            arcs: self.count("SELECT COUNT(*) FROM arcs")?,
            arc_sources: self.count("SELECT COUNT(DISTINCT from_id) FROM arcs")?,
            arc_queries: self.count("SELECT COUNT(*) FROM arc_queries")?,
            evaluation_records: self.count("SELECT COUNT(*) FROM evaluation_results")?,
            vectorizers: self.count("SELECT COUNT(*) FROM vectorizers")?,
        })
    }

    #[cfg(test)]
    pub fn load_evaluation_records(&self) -> Result<Vec<EvaluationRecord>, StoreError> {
        use crate::model::RecordStatus;

        let mut statement = self.connection.prepare(
            "
            SELECT version, strategy, k, query, status, failure_reason,
                   feedback, precision, likelihood, recommendations_json, created_at
            FROM evaluation_results
            ORDER BY result_id ASC
            ",
        )?;

        let mut rows = statement.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let status = match row.get::<_, String>(4)?.as_str() {
                "ok" => RecordStatus::Ok,
                _ => RecordStatus::Failed,
            };
            let recommendations_json = row.get::<_, String>(9)?;
            out.push(EvaluationRecord {
                version: row.get(0)?,
                strategy: row.get(1)?,
                k: row.get::<_, i64>(2)? as usize,
                query: row.get(3)?,
                status,
                failure_reason: row.get(5)?,
                feedback: row.get(6)?,
                precision: row.get(7)?,
                likelihood: row.get(8)?,
                recommendations: serde_json::from_str(&recommendations_json)?,
                created_at: row.get(10)?,
            });
        }
        Ok(out)
    }

    fn count(&self, sql: &str) -> Result<i64, StoreError> {
        Ok(self.connection.query_row(sql, [], |row| row.get(0))?)
    }

    fn query_reports<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<Report>, StoreError> {
        let mut statement = self.connection.prepare(sql)?;
        let mut rows = statement.query(params)?;

        let mut out = Vec::<Report>::new();
        while let Some(row) = rows.next()? {
            out.push(read_report_row(row)?.into_report()?);
        }
        Ok(out)
    }

    /// Runs `write` inside one transaction. Any failure rolls back the whole
    /// batch and surfaces as a single retryable `Persistence` error.
    fn write_batch<F>(
        &self,
        operation: &'static str,
        pending: usize,
        write: F,
    ) -> Result<usize, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> rusqlite::Result<usize>,
    {
        let run = || -> rusqlite::Result<usize> {
            let tx = self.connection.unchecked_transaction()?;
            let written = write(&tx)?;
            tx.commit()?;
            Ok(written)
        };

        run().map_err(|source| StoreError::Persistence {
            operation,
            pending,
            source,
        })
    }
}

impl ReportStore for SqliteStore {
    fn find_sample_reports(&self) -> Result<Vec<Report>, StoreError> {
        self.query_reports(
            &format!(
                "SELECT {REPORT_COLUMNS} FROM reports WHERE sample_set = 1 ORDER BY bg_number ASC"
            ),
            [],
        )
    }

    fn find_reports_missing_vectors(&self) -> Result<Vec<Report>, StoreError> {
        self.query_reports(
            &format!(
                "
                SELECT {REPORT_COLUMNS}
                FROM reports
                WHERE tfidf_vector IS NULL OR embeddings_vector IS NULL
                ORDER BY bg_number ASC
                "
            ),
            [],
        )
    }

    fn find_candidates(&self, filter: &CandidateFilter) -> Result<Vec<Report>, StoreError> {
        self.query_reports(
            &format!(
                "
                SELECT {REPORT_COLUMNS}
                FROM reports
                WHERE tfidf_vector IS NOT NULL
                  AND embeddings_vector IS NOT NULL
                  AND creation_time < ?1
                  AND when_changed_to_resolved IS NOT NULL
                  AND when_changed_to_resolved > ?2
                  AND (product = ?3 OR component = ?4)
                ORDER BY bg_number ASC
                "
            ),
            params![
                filter.created_before.timestamp_millis(),
                filter.resolved_after.timestamp_millis(),
                filter.product,
                filter.component,
            ],
        )
    }

    fn load_report(&self, bg_number: BugId) -> Result<Option<Report>, StoreError> {
        let mut reports = self.query_reports(
            &format!("SELECT {REPORT_COLUMNS} FROM reports WHERE bg_number = ?1"),
            [bg_number],
        )?;
        Ok(reports.pop())
    }

    fn arcs_from(&self, bg_number: BugId) -> Result<Vec<SimilarityArc>, StoreError> {
        let mut statement = self.connection.prepare(
            "
            SELECT from_id, to_id, cos_similarity_tfidf, cos_similarity_word_embeddings,
                   categoric_similarity
            FROM arcs
            WHERE from_id = ?1
            ORDER BY to_id ASC
            ",
        )?;

        let mut rows = statement.query([bg_number])?;
        let mut out = Vec::<SimilarityArc>::new();
        while let Some(row) = rows.next()? {
            out.push(SimilarityArc {
                from: row.get(0)?,
                to: row.get(1)?,
                cos_similarity_tfidf: row.get(2)?,
                cos_similarity_word_embeddings: row.get(3)?,
                categoric_similarity: row.get(4)?,
            });
        }
        Ok(out)
    }

    fn is_processed_query(&self, bg_number: BugId) -> Result<bool, StoreError> {
        // Stores written before arc_queries existed only carry the arcs.
        let processed = self.connection.query_row(
            "
            SELECT EXISTS(SELECT 1 FROM arc_queries WHERE from_id = ?1)
                OR EXISTS(SELECT 1 FROM arcs WHERE from_id = ?1)
            ",
            [bg_number],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(processed)
    }

    fn insert_arcs(&self, query: BugId, batch: &[SimilarityArc]) -> Result<usize, StoreError> {
        let created_at = now_utc_string();
        self.write_batch("insert_arcs", batch.len(), |tx| {
            let mut statement = tx.prepare(
                "
                INSERT INTO arcs(
                  from_id, to_id, cos_similarity_tfidf, cos_similarity_word_embeddings,
                  categoric_similarity, created_at
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(from_id, to_id) DO NOTHING
                ",
            )?;

            let mut written = 0usize;
            for arc in batch {
                written += statement.execute(params![
                    arc.from,
                    arc.to,
                    arc.cos_similarity_tfidf,
                    arc.cos_similarity_word_embeddings,
                    arc.categoric_similarity,
                    created_at,
                ])?;
            }

            tx.execute(
                "
                INSERT INTO arc_queries(from_id, arcs, created_at)
                VALUES(?1, ?2, ?3)
                ON CONFLICT(from_id) DO NOTHING
                ",
                params![query, batch.len() as i64, created_at],
            )?;
            Ok(written)
        })
    }

    fn insert_evaluation_records(&self, records: &[EvaluationRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let encoded = records
            .iter()
            .map(|record| serde_json::to_string(&record.recommendations))
            .collect::<Result<Vec<String>, serde_json::Error>>()?;

        self.write_batch("insert_evaluation_records", records.len(), |tx| {
            let mut statement = tx.prepare(
                "
                INSERT INTO evaluation_results(
                  version, strategy, k, query, status, failure_reason,
                  feedback, precision, likelihood, recommendations_json, created_at
                )
                VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ",
            )?;

            let mut written = 0usize;
            for (record, recommendations_json) in records.iter().zip(&encoded) {
                written += statement.execute(params![
                    record.version,
                    record.strategy,
                    record.k as i64,
                    record.query,
                    record.status.as_str(),
                    record.failure_reason,
                    record.feedback,
                    record.precision,
                    record.likelihood,
                    recommendations_json,
                    record.created_at,
                ])?;
            }
            Ok(written)
        })
    }

    fn update_report_vectors(&self, batch: &[VectorUpdate]) -> Result<usize, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }

        self.write_batch("update_report_vectors", batch.len(), |tx| {
            let mut statement = tx.prepare(
                "
                UPDATE reports SET
                  tfidf_vector = COALESCE(tfidf_vector, ?2),
                  embeddings_vector = COALESCE(embeddings_vector, ?3),
                  vectorizer_id = COALESCE(vectorizer_id, ?4)
                WHERE bg_number = ?1
                  AND (tfidf_vector IS NULL OR embeddings_vector IS NULL)
                ",
            )?;

            let mut written = 0usize;
            for update in batch {
                written += statement.execute(params![
                    update.bg_number,
                    encode_sparse_blob(&update.tfidf_vector),
                    encode_dense_blob(&update.embeddings_vector),
                    update.vectorizer_id,
                ])?;
            }
            Ok(written)
        })
    }
}

struct ReportRow {
    bg_number: BugId,
    summary: Option<String>,
    description: Option<String>,
    product: Option<String>,
    component: Option<String>,
    assigned_to: Option<String>,
    creation_time: Option<i64>,
    when_changed_to_resolved: Option<i64>,
    when_final_change_assigned_to: Option<i64>,
    tfidf_vector: Option<Vec<u8>>,
    embeddings_vector: Option<Vec<u8>>,
    vectorizer_id: Option<String>,
    sample_set: bool,
}

fn read_report_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        bg_number: row.get(0)?,
        summary: row.get(1)?,
        description: row.get(2)?,
        product: row.get(3)?,
        component: row.get(4)?,
        assigned_to: row.get(5)?,
        creation_time: row.get(6)?,
        when_changed_to_resolved: row.get(7)?,
        when_final_change_assigned_to: row.get(8)?,
        tfidf_vector: row.get(9)?,
        embeddings_vector: row.get(10)?,
        vectorizer_id: row.get(11)?,
        sample_set: row.get::<_, i64>(12)? != 0,
    })
}

impl ReportRow {
    fn into_report(self) -> Result<Report, StoreError> {
        let bg_number = self.bg_number;
        let required = |value: Option<String>, field: &str| {
            value.ok_or_else(|| StoreError::InvalidRecord {
                bg_number,
                reason: format!("missing {field}"),
            })
        };
        let timestamp = |millis: i64, field: &str| {
            DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                StoreError::InvalidRecord {
                    bg_number,
                    reason: format!("{field} out of range: {millis}"),
                }
            })
        };

        let product = required(self.product, "product")?;
        let component = required(self.component, "component")?;
        let assigned_to = required(self.assigned_to, "assigned_to")?;
        let creation_time = self
            .creation_time
            .ok_or_else(|| StoreError::InvalidRecord {
                bg_number,
                reason: "missing creation_time".to_string(),
            })
            .and_then(|millis| timestamp(millis, "creation_time"))?;
        let when_changed_to_resolved = self
            .when_changed_to_resolved
            .map(|millis| timestamp(millis, "when_changed_to_resolved"))
            .transpose()?;
        let when_final_change_assigned_to = self
            .when_final_change_assigned_to
            .map(|millis| timestamp(millis, "when_final_change_assigned_to"))
            .transpose()?;

        let tfidf_vector = self
            .tfidf_vector
            .map(|blob| decode_sparse_blob(&blob))
            .transpose()
            .map_err(|source| StoreError::Codec {
                bg_number,
                vector: "tfidf",
                source,
            })?;
        let embeddings_vector = self
            .embeddings_vector
            .map(|blob| decode_dense_blob(&blob))
            .transpose()
            .map_err(|source| StoreError::Codec {
                bg_number,
                vector: "embeddings",
                source,
            })?;

        Ok(Report {
            bg_number,
            summary: self.summary.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            product,
            component,
            assigned_to,
            creation_time,
            when_changed_to_resolved,
            when_final_change_assigned_to,
            tfidf_vector,
            embeddings_vector,
            vectorizer_id: self.vectorizer_id,
            sample_set: self.sample_set,
        })
    }
}
