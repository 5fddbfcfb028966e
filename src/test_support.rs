use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::model::{NewReport, Report, VectorUpdate};
use crate::store::{ReportStore, SqliteStore};
use crate::vectors::{DenseVector, SparseVector};

pub const TEST_TFIDF_DIM: u32 = 16;
pub const TEST_EMBEDDING_DIM: usize = 8;

pub fn ts(date: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .expect("fixture date parses")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
}

pub fn report(bg_number: i64, product: &str, component: &str, assigned_to: &str) -> Report {
    Report {
        bg_number,
        summary: format!("summary {bg_number}"),
        description: format!("description of report {bg_number}"),
        product: product.to_string(),
        component: component.to_string(),
        assigned_to: assigned_to.to_string(),
        creation_time: ts("2009-01-01"),
        when_changed_to_resolved: None,
        when_final_change_assigned_to: None,
        tfidf_vector: None,
        embeddings_vector: None,
        vectorizer_id: None,
        sample_set: false,
    }
}

pub fn at(mut report: Report, created: &str, resolved: Option<&str>) -> Report {
    report.creation_time = ts(created);
    report.when_changed_to_resolved = resolved.map(ts);
    report
}

pub fn vectorized(mut report: Report, seed: usize) -> Report {
    let dim = TEST_TFIDF_DIM as usize;
    let entries = (0..4)
        .map(|offset| {
            let index = ((seed * 3 + offset * 5) % dim) as u32;
            (index, 0.2 + ((seed + offset) % 5) as f32 * 0.1)
        })
        .collect::<Vec<(u32, f32)>>();
    let embedding = (0..TEST_EMBEDDING_DIM)
        .map(|index| (((seed * 7 + index * 3) % 11) as f32 - 5.0) / 5.0)
        .collect::<Vec<f32>>();

    report.tfidf_vector = Some(SparseVector::new(TEST_TFIDF_DIM, entries).normalized());
    report.embeddings_vector = Some(DenseVector::new(embedding));
    report.vectorizer_id = Some("test-vectorizer".to_string());
    report
}

pub fn scenario() -> (Report, Vec<Report>) {
    let query = vectorized(
        at(report(100, "P1", "C1", "dev-A"), "2010-01-01", None),
        100,
    );
    let r1 = vectorized(
        at(report(1, "P1", "C7", "dev-A"), "2009-06-01", Some("2010-02-01")),
        1,
    );
    let r2 = vectorized(
        at(report(2, "P1", "C1", "dev-A"), "2011-01-01", Some("2011-06-01")),
        2,
    );
    let r3 = vectorized(
        at(report(3, "P1", "C1", "dev-A"), "2009-01-01", Some("2009-12-01")),
        3,
    );
    let r4 = vectorized(
        at(report(4, "P2", "C1", "dev-B"), "2009-03-01", Some("2010-06-01")),
        4,
    );

    let corpus = vec![r1, r2, r3, r4, query.clone()];
    (query, corpus)
}

pub fn generated_corpus(size: usize, seed: u64) -> Vec<Report> {
    let products = ["Core", "Firefox", "Toolkit"];
    let components = ["DOM", "Networking", "Graphics", "General"];
    let assignees = ["dev-a", "dev-b", "dev-c", "dev-d", "dev-e"];
    let origin = ts("2008-01-01");

    let mut rng = StdRng::seed_from_u64(seed);

    (0..size)
        .map(|index| {
            let product = products[rng.gen_range(0..products.len())];
            let component = components[rng.gen_range(0..components.len())];
            let assignee = assignees[rng.gen_range(0..assignees.len())];
            let created = origin + Duration::days(rng.gen_range(0..1800));
            let resolved = if rng.gen_bool(0.75) {
                Some(created + Duration::days(rng.gen_range(1..=400)))
            } else {
                None
            };

            let mut value = report(index as i64 + 1, product, component, assignee);
            value.creation_time = created;
            value.when_changed_to_resolved = resolved;
            vectorized(value, index)
        })
        .collect()
}

pub fn new_report(report: &Report) -> NewReport {
    NewReport {
        bg_number: report.bg_number,
        summary: report.summary.clone(),
        description: report.description.clone(),
        product: report.product.clone(),
        component: report.component.clone(),
        assigned_to: report.assigned_to.clone(),
        creation_time: report.creation_time,
        when_changed_to_resolved: report.when_changed_to_resolved,
        when_final_change_assigned_to: report.when_final_change_assigned_to,
    }
}

pub fn seeded_store(reports: &[Report]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("store opens");
    let rows = reports.iter().map(new_report).collect::<Vec<NewReport>>();
    store.upsert_reports(&rows).expect("reports insert");

    let updates = reports
        .iter()
        .filter_map(|report| {
            Some(VectorUpdate {
                bg_number: report.bg_number,
                tfidf_vector: report.tfidf_vector.clone()?,
                embeddings_vector: report.embeddings_vector.clone()?,
                vectorizer_id: "test-vectorizer".to_string(),
            })
        })
        .collect::<Vec<VectorUpdate>>();
    store.update_report_vectors(&updates).expect("vectors update");
    store
}
