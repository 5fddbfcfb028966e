use std::fs;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::{ImportArgs, StoreArgs};
use crate::commands::open_store;
use crate::model::{ImportRunManifest, NewReport};
use crate::util::{ensure_directory, manifest_path, now_utc_string, run_id, write_json_pretty};
use crate::vectors::chunked;

const RESOLVED_STATUS: &str = "RESOLVED";
const MAX_LOGGED_REJECTIONS: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportPayload {
    Reports(Vec<RawBugReport>),
    Envelope { bugs: Vec<RawBugReport> },
}

#[derive(Debug, Clone, Deserialize)]
struct RawBugReport {
    #[serde(alias = "bg_number")]
    id: i64,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    component: Option<String>,
    #[serde(default)]
    assigned_to: Option<String>,
    #[serde(default)]
    creation_time: Option<String>,
    #[serde(default)]
    when_changed_to_resolved: Option<String>,
    #[serde(default)]
    when_final_change_assigned_to: Option<String>,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct HistoryEntry {
    when: String,
    #[serde(default)]
    changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Deserialize)]
struct FieldChange {
    field_name: String,
    #[serde(default)]
    added: String,
}

#[derive(Debug)]
struct ImportedReport {
    report: NewReport,
    derived_resolution: bool,
}

pub fn run(args: ImportArgs, store_args: &StoreArgs) -> Result<()> {
    let started = Instant::now();
    let generated_at = now_utc_string();
    let run_id = run_id("import");
    let manifest_dir = store_args.manifest_dir();
    ensure_directory(&manifest_dir)?;

    let raw = fs::read(&args.input)
        .with_context(|| format!("failed to read import file: {}", args.input.display()))?;
    let payload: ImportPayload = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse import file: {}", args.input.display()))?;
    let records = match payload {
        ImportPayload::Reports(records) => records,
        ImportPayload::Envelope { bugs } => bugs,
    };
    let records_read = records.len();

    let mut accepted = Vec::<NewReport>::with_capacity(records.len());
    let mut warnings = Vec::<String>::new();
    let mut derived_resolution_times = 0usize;
    for record in records {
        let bg_number = record.id;
        match convert_report(record) {
            Ok(imported) => {
                if imported.derived_resolution {
                    derived_resolution_times += 1;
                }
                accepted.push(imported.report);
            }
            Err(reason) => {
                if warnings.len() < MAX_LOGGED_REJECTIONS {
                    warn!(bg_number, reason = %reason, "report rejected");
                }
                warnings.push(format!("{bg_number}: {reason}"));
            }
        }
    }

    let store = open_store(store_args)?;
    let batch_size = args.batch_size.max(1);
    let mut records_imported = 0usize;
    for batch in chunked(accepted, batch_size) {
        records_imported += store
            .upsert_reports(&batch)
            .with_context(|| format!("failed to write {} reports", batch.len()))?;
        info!(records_imported, records_read, "import batch committed");
    }

    let manifest = ImportRunManifest {
        manifest_version: 1,
        run_id,
        generated_at,
        input_path: args.input.display().to_string(),
        records_read,
        records_imported,
        records_rejected: warnings.len(),
        derived_resolution_times,
        duration_ms: started.elapsed().as_millis(),
        warnings,
    };
    let manifest_path = manifest_path(&manifest_dir, "import_run");
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        path = %manifest_path.display(),
        records_read,
        records_imported,
        records_rejected = manifest.records_rejected,
        "import completed"
    );

    Ok(())
}

fn convert_report(raw: RawBugReport) -> Result<ImportedReport, String> {
    let required = |value: Option<String>, field: &str| {
        value
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| format!("missing {field}"))
    };

    let product = required(raw.product, "product")?;
    let component = required(raw.component, "component")?;
    let assigned_to = required(raw.assigned_to, "assigned_to")?;
    let creation_raw = required(raw.creation_time, "creation_time")?;
    let creation_time = parse_timestamp(&creation_raw)
        .ok_or_else(|| format!("unparseable creation_time: {creation_raw}"))?;

    let (when_changed_to_resolved, derived_resolution) =
        match non_empty(raw.when_changed_to_resolved.as_deref()) {
            Some(value) => (
                Some(
                    parse_timestamp(value)
                        .ok_or_else(|| format!("unparseable when_changed_to_resolved: {value}"))?,
                ),
                false,
            ),
            None => {
                let derived = resolved_at(&raw.history)?;
                let found = derived.is_some();
                (derived, found)
            }
        };

    let when_final_change_assigned_to =
        match non_empty(raw.when_final_change_assigned_to.as_deref()) {
            Some(value) => parse_timestamp(value).ok_or_else(|| {
                format!("unparseable when_final_change_assigned_to: {value}")
            })?,
            None => final_assignment_at(&raw.history, &assigned_to)?.unwrap_or(creation_time),
        };

    Ok(ImportedReport {
        report: NewReport {
            bg_number: raw.id,
            summary: raw.summary.unwrap_or_default(),
            description: raw.description.unwrap_or_default(),
            product,
            component,
            assigned_to,
            creation_time,
            when_changed_to_resolved,
            when_final_change_assigned_to: Some(when_final_change_assigned_to),
        },
        derived_resolution,
    })
}

fn resolved_at(history: &[HistoryEntry]) -> Result<Option<DateTime<Utc>>, String> {
    last_change_at(history, |change| {
        change.field_name == "status" && change.added == RESOLVED_STATUS
    })
}

fn final_assignment_at(
    history: &[HistoryEntry],
    assigned_to: &str,
) -> Result<Option<DateTime<Utc>>, String> {
    last_change_at(history, |change| {
        change.field_name == "assigned_to" && change.added == assigned_to
    })
}

/// History is chronological; the latest matching entry wins.
fn last_change_at<F>(history: &[HistoryEntry], matches: F) -> Result<Option<DateTime<Utc>>, String>
where
    F: Fn(&FieldChange) -> bool,
{
    let Some(entry) = history
        .iter()
        .rev()
        .find(|entry| entry.changes.iter().any(&matches))
    else {
        return Ok(None);
    };

    parse_timestamp(&entry.when)
        .map(Some)
        .ok_or_else(|| format!("unparseable history timestamp: {}", entry.when))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .into_iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}
