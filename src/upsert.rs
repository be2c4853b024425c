//! Idempotent bulk upsert keyed on each report type's natural key.
//!
//! Rows are deduplicated keep-last, bound in the descriptor's storage
//! column order, and written inside one transaction per attachment. The
//! conflict update is guarded with `IS DISTINCT FROM`, so re-ingesting an
//! unchanged report affects zero rows.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use postgres::types::ToSql;

use crate::error::IngestError;
use crate::normalize::{Field, Record};
use crate::report::{ColumnKind, ReportDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertCounts {
    /// Rows written after deduplication.
    pub rows_processed: u64,
    /// Rows the storage engine inserted or actually changed.
    pub rows_affected: u64,
}

/// Keeps the last row for each natural-key value, preserving source order
/// of the surviving rows. Rows with a null or absent key cannot be
/// upserted and are dropped; the count of those is returned alongside.
pub fn dedup_by_natural_key(rows: Vec<Record>, key: &str) -> (Vec<Record>, u64) {
    let mut seen = std::collections::HashSet::new();
    let mut missing = 0u64;
    let mut kept: Vec<Record> = Vec::with_capacity(rows.len());
    for row in rows.into_iter().rev() {
        match row.get(key) {
            None | Some(Field::Null) => missing += 1,
            Some(field) => {
                if seen.insert(key_text(field)) {
                    kept.push(row);
                }
            }
        }
    }
    kept.reverse();
    (kept, missing)
}

fn key_text(field: &Field) -> String {
    match field {
        Field::Text(s) => s.clone(),
        Field::Timestamp(ts) => ts.to_string(),
        Field::Null => String::new(),
    }
}

/// Builds the per-report upsert statement.
///
/// All mapped columns are listed in storage order, audit timestamps last.
/// On conflict every non-key mapped column is overwritten and
/// `updated_at` refreshed, but only when at least one value actually
/// differs.
pub fn build_upsert_sql(descriptor: &ReportDescriptor) -> String {
    let table = descriptor.table;
    let columns: Vec<&str> = descriptor.columns.iter().map(|c| c.name).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();
    let now_param = format!("${}", columns.len() + 1);

    let assignments: Vec<String> = descriptor
        .value_columns()
        .map(|c| format!("{name} = EXCLUDED.{name}", name = c.name))
        .collect();
    let current: Vec<String> = descriptor
        .value_columns()
        .map(|c| format!("{table}.{}", c.name))
        .collect();
    let incoming: Vec<String> = descriptor
        .value_columns()
        .map(|c| format!("EXCLUDED.{}", c.name))
        .collect();

    format!(
        "INSERT INTO {table} ({cols}, created_at, updated_at) \
         VALUES ({values}, {now_param}, {now_param}) \
         ON CONFLICT ({key}) DO UPDATE SET {assignments}, updated_at = {now_param} \
         WHERE ({current}) IS DISTINCT FROM ({incoming})",
        cols = columns.join(", "),
        values = placeholders.join(", "),
        key = descriptor.natural_key,
        assignments = assignments.join(", "),
        current = current.join(", "),
        incoming = incoming.join(", "),
    )
}

/// Deduplicates and writes `records` into the clinic database behind
/// `client`, atomically for this attachment.
pub fn upsert(
    client: &mut postgres::Client,
    descriptor: &ReportDescriptor,
    records: Vec<Record>,
) -> Result<UpsertCounts, IngestError> {
    let (rows, missing) = dedup_by_natural_key(records, descriptor.natural_key);
    if missing > 0 {
        warn!(
            "dropping {missing} row(s) without a {} value for table '{}'",
            descriptor.natural_key, descriptor.table
        );
    }
    if rows.is_empty() {
        return Ok(UpsertCounts {
            rows_processed: 0,
            rows_affected: 0,
        });
    }

    let sql = build_upsert_sql(descriptor);
    let mut tx = client.transaction().map_err(IngestError::upsert)?;
    let statement = tx.prepare(&sql).map_err(IngestError::upsert)?;
    let now = Utc::now();
    let mut affected = 0u64;
    for row in &rows {
        let params = bind_row(row, descriptor, &now);
        affected += tx.execute(&statement, &params).map_err(IngestError::upsert)?;
    }
    tx.commit().map_err(IngestError::upsert)?;

    debug!(
        "upserted {} row(s) into '{}' ({} affected)",
        rows.len(),
        descriptor.table,
        affected
    );
    Ok(UpsertCounts {
        rows_processed: rows.len() as u64,
        rows_affected: affected,
    })
}

static NULL_TEXT: Option<String> = None;
static NULL_TIMESTAMP: Option<chrono::NaiveDateTime> = None;

fn bind_row<'a>(
    row: &'a Record,
    descriptor: &ReportDescriptor,
    now: &'a DateTime<Utc>,
) -> Vec<&'a (dyn ToSql + Sync)> {
    let mut params: Vec<&(dyn ToSql + Sync)> = descriptor
        .columns
        .iter()
        .map(|col| match row.get(col.name) {
            Some(Field::Text(s)) => s as &(dyn ToSql + Sync),
            Some(Field::Timestamp(ts)) => ts as &(dyn ToSql + Sync),
            Some(Field::Null) | None => match col.kind {
                ColumnKind::Text => &NULL_TEXT as &(dyn ToSql + Sync),
                ColumnKind::Timestamp => &NULL_TIMESTAMP as &(dyn ToSql + Sync),
            },
        })
        .collect();
    params.push(now);
    params
}
