//! Read-side report browser: a thin presentation layer over the clinic
//! databases the ingestion pipeline provisions. Summary and interactive
//! query modes only; no writes happen here.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use chrono::NaiveDateTime;
use itertools::Itertools;
use postgres::NoTls;
use serde_json::json;

use crate::config::StorageConfig;
use crate::normalize::parse_timestamp;

/// Databases that are never clinic namespaces.
const SYSTEM_DATABASES: &[&str] = &["postgres", "template0", "template1", "railway"];

const APPOINTMENT_SUMMARY_COLUMNS: &[&str] = &[
    "appointment_id",
    "appointment_date",
    "client",
    "client_id",
    "practitioner",
    "appointment_type",
    "appointment_status",
];

fn connect(config: &StorageConfig, dbname: Option<&str>) -> Result<postgres::Client> {
    config
        .pg_config(dbname)
        .connect(NoTls)
        .with_context(|| format!("Connecting to '{}'", dbname.unwrap_or(&config.admin_db)))
}

/// Lists clinic databases, excluding the engine's own.
pub fn list_clinics(config: &StorageConfig) -> Result<Vec<String>> {
    let mut admin = connect(config, None)?;
    let rows = admin
        .query(
            "SELECT datname FROM pg_database WHERE datname <> ALL($1) ORDER BY datname",
            &[&SYSTEM_DATABASES],
        )
        .context("Listing clinic databases")?;
    Ok(rows.iter().map(|row| row.get(0)).collect())
}

/// Prints a per-clinic overview: tables, row counts, and appointment
/// statistics for each clinic database.
pub fn summary(config: &StorageConfig) -> Result<()> {
    let clinics = list_clinics(config)?;
    if clinics.is_empty() {
        println!("No clinic databases found.");
        println!("Clinic databases are created when report emails are ingested.");
        return Ok(());
    }

    for clinic in &clinics {
        let mut client = connect(config, Some(clinic))?;
        let tables = clinic_tables(&mut client)?;
        let total_rows: i64 = tables.iter().map(|(_, count)| count).sum();
        println!("\nClinic: {clinic} ({} table(s), {total_rows} row(s))", tables.len());
        for (table, count) in &tables {
            println!("  {table:<30} {count:>10} rows");
        }
        if tables.iter().any(|(name, _)| name == "appointments") {
            print_statistics(&mut client)?;
        }
    }
    Ok(())
}

fn clinic_tables(client: &mut postgres::Client) -> Result<Vec<(String, i64)>> {
    let rows = client.query(
        "SELECT table_name FROM information_schema.tables \
         WHERE table_schema = 'public' AND table_type = 'BASE TABLE' ORDER BY table_name",
        &[],
    )?;
    let mut tables = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.get(0);
        if !is_safe_identifier(&name) {
            continue;
        }
        let count: i64 = client
            .query_one(format!("SELECT COUNT(*) FROM {name}").as_str(), &[])?
            .get(0);
        tables.push((name, count));
    }
    Ok(tables)
}

fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
}

fn print_statistics(client: &mut postgres::Client) -> Result<()> {
    let total: i64 = client
        .query_one("SELECT COUNT(*) FROM appointments", &[])?
        .get(0);
    println!("  Appointments: {total}");

    let by_status = client.query(
        "SELECT COALESCE(appointment_status, '(no status)'), COUNT(*) \
         FROM appointments GROUP BY 1 ORDER BY 2 DESC",
        &[],
    )?;
    for row in &by_status {
        let status: String = row.get(0);
        let count: i64 = row.get(1);
        println!("    {status:<30} {count:>6}");
    }

    let practitioners = client.query(
        "SELECT practitioner, COUNT(*) FROM appointments \
         WHERE practitioner IS NOT NULL GROUP BY 1 ORDER BY 2 DESC LIMIT 5",
        &[],
    )?;
    if !practitioners.is_empty() {
        println!("  Top practitioners:");
        for row in &practitioners {
            let name: String = row.get(0);
            let count: i64 = row.get(1);
            println!("    {name:<35} {count:>6}");
        }
    }

    let range = client.query_one(
        "SELECT MIN(appointment_date), MAX(appointment_date) FROM appointments",
        &[],
    )?;
    let earliest: Option<NaiveDateTime> = range.get(0);
    let latest: Option<NaiveDateTime> = range.get(1);
    if let (Some(earliest), Some(latest)) = (earliest, latest) {
        println!("  Date range: {earliest} .. {latest}");
    }
    Ok(())
}

/// Interactive query loop over one clinic database.
pub fn interactive(config: &StorageConfig, clinic: Option<String>) -> Result<()> {
    let clinics = list_clinics(config)?;
    if clinics.is_empty() {
        println!("No clinic databases found.");
        return Ok(());
    }

    let clinic = match clinic {
        Some(name) => {
            if !clinics.contains(&name) {
                bail!("unknown clinic '{name}' (available: {})", clinics.iter().join(", "));
            }
            name
        }
        None => {
            println!("Available clinics:");
            for (idx, name) in clinics.iter().enumerate() {
                println!("  {}. {name}", idx + 1);
            }
            let choice: usize = prompt("Select clinic number (0 to exit): ")?
                .parse()
                .unwrap_or(0);
            if choice == 0 || choice > clinics.len() {
                return Ok(());
            }
            clinics[choice - 1].clone()
        }
    };

    let mut client = connect(config, Some(&clinic))?;
    loop {
        println!();
        println!("[{clinic}] 1 recent  2 by client  3 by practitioner  4 by date  5 stats  6 search  7 export  0 exit");
        match prompt("> ")?.as_str() {
            "0" | "q" | "quit" | "exit" => break,
            "1" => print_appointments(&mut client, RECENT_SQL, &[&10i64])?,
            "2" => {
                let pattern = like_pattern(&prompt("Client name: ")?);
                print_appointments(&mut client, BY_CLIENT_SQL, &[&pattern])?;
            }
            "3" => {
                let pattern = like_pattern(&prompt("Practitioner name: ")?);
                print_appointments(&mut client, BY_PRACTITIONER_SQL, &[&pattern])?;
            }
            "4" => {
                let Some(start) = parse_timestamp(&prompt("Start date (YYYY-MM-DD): ")?) else {
                    println!("Unrecognized date.");
                    continue;
                };
                let end_raw = prompt("End date (YYYY-MM-DD, blank for open-ended): ")?;
                match parse_timestamp(&end_raw) {
                    Some(end) => {
                        print_appointments(&mut client, BY_DATE_RANGE_SQL, &[&start, &end])?
                    }
                    None => print_appointments(&mut client, FROM_DATE_SQL, &[&start])?,
                }
            }
            "5" => print_statistics(&mut client)?,
            "6" => {
                let pattern = like_pattern(&prompt("Search term: ")?);
                print_appointments(&mut client, SEARCH_SQL, &[&pattern])?;
            }
            "7" => export_appointments(&mut client, &clinic)?,
            other => println!("Unknown option '{other}'."),
        }
    }
    Ok(())
}

const RECENT_SQL: &str = "SELECT appointment_id, appointment_date, client, client_id, \
     practitioner, appointment_type, appointment_status FROM appointments \
     ORDER BY appointment_date DESC NULLS LAST LIMIT $1";

const BY_CLIENT_SQL: &str = "SELECT appointment_id, appointment_date, client, client_id, \
     practitioner, appointment_type, appointment_status FROM appointments \
     WHERE client ILIKE $1 ORDER BY appointment_date DESC NULLS LAST LIMIT 100";

const BY_PRACTITIONER_SQL: &str = "SELECT appointment_id, appointment_date, client, client_id, \
     practitioner, appointment_type, appointment_status FROM appointments \
     WHERE practitioner ILIKE $1 ORDER BY appointment_date DESC NULLS LAST LIMIT 100";

const BY_DATE_RANGE_SQL: &str = "SELECT appointment_id, appointment_date, client, client_id, \
     practitioner, appointment_type, appointment_status FROM appointments \
     WHERE appointment_date BETWEEN $1 AND $2 ORDER BY appointment_date LIMIT 500";

const FROM_DATE_SQL: &str = "SELECT appointment_id, appointment_date, client, client_id, \
     practitioner, appointment_type, appointment_status FROM appointments \
     WHERE appointment_date >= $1 ORDER BY appointment_date LIMIT 500";

const SEARCH_SQL: &str = "SELECT appointment_id, appointment_date, client, client_id, \
     practitioner, appointment_type, appointment_status FROM appointments \
     WHERE client ILIKE $1 OR practitioner ILIKE $1 OR appointment_type ILIKE $1 \
        OR business ILIKE $1 OR clinical_note ILIKE $1 \
     ORDER BY appointment_date DESC NULLS LAST LIMIT 100";

fn like_pattern(term: &str) -> String {
    format!("%{}%", term.trim())
}

fn print_appointments(
    client: &mut postgres::Client,
    sql: &str,
    params: &[&(dyn postgres::types::ToSql + Sync)],
) -> Result<()> {
    let rows = client.query(sql, params)?;
    if rows.is_empty() {
        println!("No appointments found.");
        return Ok(());
    }
    let header = APPOINTMENT_SUMMARY_COLUMNS.join("  ");
    println!("{header}");
    println!("{}", "-".repeat(header.len()));
    for row in &rows {
        let cells: Vec<String> = (0..APPOINTMENT_SUMMARY_COLUMNS.len())
            .map(|idx| display_cell(row, idx))
            .collect();
        println!("{}", cells.join("  "));
    }
    println!("({} row(s))", rows.len());
    Ok(())
}

fn display_cell(row: &postgres::Row, idx: usize) -> String {
    // Column 1 is the only timestamp in the summary projection.
    if idx == 1 {
        let value: Option<NaiveDateTime> = row.get(idx);
        value.map(|ts| ts.to_string()).unwrap_or_default()
    } else {
        let value: Option<String> = row.get(idx);
        value.unwrap_or_default()
    }
}

fn export_appointments(client: &mut postgres::Client, clinic: &str) -> Result<()> {
    let rows = client.query(RECENT_SQL, &[&10_000i64])?;
    let exported: Vec<serde_json::Value> = rows
        .iter()
        .map(|row| {
            let fields: serde_json::Map<String, serde_json::Value> = APPOINTMENT_SUMMARY_COLUMNS
                .iter()
                .enumerate()
                .map(|(idx, name)| (name.to_string(), json!(display_cell(row, idx))))
                .collect();
            serde_json::Value::Object(fields)
        })
        .collect();
    let filename = format!(
        "appointments_{clinic}_{}.json",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let file = std::fs::File::create(&filename)
        .with_context(|| format!("Creating export file '{filename}'"))?;
    serde_json::to_writer_pretty(file, &exported).context("Writing export JSON")?;
    println!("Exported {} appointment(s) to {filename}", exported.len());
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Reading from stdin")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_databases_are_excluded_by_name() {
        for name in SYSTEM_DATABASES {
            assert!(is_safe_identifier(name));
        }
        assert!(!SYSTEM_DATABASES.contains(&"supertest"));
    }

    #[test]
    fn identifier_guard_rejects_injection_shapes() {
        assert!(is_safe_identifier("appointments"));
        assert!(!is_safe_identifier("appointments; DROP TABLE x"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("Appointments"));
    }

    #[test]
    fn like_pattern_wraps_and_trims() {
        assert_eq!(like_pattern("  smith "), "%smith%");
    }
}
