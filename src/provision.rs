//! Schema provisioning: per-clinic database plus per-report tables and
//! indexes, created lazily on first use.
//!
//! Every operation here is an idempotent existence-check-then-create and
//! is safe to run on each ingestion. Nothing ever alters an existing
//! schema. Tenant names come out of [`crate::tenant::resolve_tenant`]
//! restricted to `[a-z0-9_]` and are still quoted in DDL, since a tag may
//! start with a digit or collide with a keyword; table and column names
//! are compile-time constants that stand unquoted on their own.

use log::{debug, info};
use postgres::error::SqlState;

use crate::error::IngestError;
use crate::report::{ColumnKind, ReportDescriptor};

/// Sanitized tenant ids are lowercase `[a-z0-9_]` but may start with a
/// digit or collide with a keyword, so the identifier is always quoted.
fn create_database_sql(tenant: &str) -> String {
    format!("CREATE DATABASE \"{tenant}\"")
}

/// Creates the clinic's database if absent. Returns `true` when this call
/// created it. A concurrent creation losing the race is treated as
/// success.
pub fn ensure_database(client: &mut postgres::Client, tenant: &str) -> Result<bool, IngestError> {
    let exists = client
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&tenant])
        .map_err(IngestError::provisioning)?
        .is_some();
    if exists {
        debug!("clinic database '{tenant}' already exists");
        return Ok(false);
    }

    // CREATE DATABASE cannot run inside a transaction block.
    match client.execute(create_database_sql(tenant).as_str(), &[]) {
        Ok(_) => {
            info!("created clinic database '{tenant}'");
            Ok(true)
        }
        Err(err) if err.code() == Some(&SqlState::DUPLICATE_DATABASE) => {
            debug!("clinic database '{tenant}' created concurrently");
            Ok(false)
        }
        Err(err) => Err(IngestError::provisioning(err)),
    }
}

/// Creates the report table and its supporting indexes if absent.
pub fn ensure_table(
    client: &mut postgres::Client,
    descriptor: &ReportDescriptor,
) -> Result<(), IngestError> {
    client
        .batch_execute(&table_ddl(descriptor))
        .map_err(IngestError::provisioning)?;
    debug!("ensured table '{}' and its indexes", descriptor.table);
    Ok(())
}

/// DDL for one report table: surrogate key, mapped business columns, a
/// unique natural-key constraint, audit timestamps, and plain indexes on
/// the common query columns.
pub fn table_ddl(descriptor: &ReportDescriptor) -> String {
    let table = descriptor.table;
    let mut columns = Vec::with_capacity(descriptor.columns.len() + 3);
    columns.push("id BIGSERIAL PRIMARY KEY".to_string());
    for col in descriptor.columns {
        let sql_type = match col.kind {
            ColumnKind::Text => "TEXT",
            ColumnKind::Timestamp => "TIMESTAMP",
        };
        if col.name == descriptor.natural_key {
            columns.push(format!("{} {} NOT NULL UNIQUE", col.name, sql_type));
        } else {
            columns.push(format!("{} {}", col.name, sql_type));
        }
    }
    columns.push("created_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_string());
    columns.push("updated_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_string());

    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {table} ({});\n",
        columns.join(", ")
    );
    for indexed in descriptor.indexes {
        ddl.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{indexed} ON {table} ({indexed});\n"
        ));
    }
    ddl
}
