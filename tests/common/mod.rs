#![allow(dead_code)]

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::{Engine as _, engine::general_purpose};
use tempfile::{TempDir, tempdir};

use clinic_ingest::error::IngestError;
use clinic_ingest::normalize::{Field, Record};
use clinic_ingest::report::ReportDescriptor;
use clinic_ingest::store::Store;
use clinic_ingest::upsert::{UpsertCounts, dedup_by_natural_key};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

pub fn encode_attachment(content: &str) -> String {
    general_purpose::STANDARD.encode(content)
}

pub fn encode_attachment_bytes(content: &[u8]) -> String {
    general_purpose::STANDARD.encode(content)
}

/// Reads a binary fixture from `tests/data/`.
pub fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|err| panic!("reading fixture {path:?}: {err}"))
}

/// Builds a webhook payload JSON string with one or more attachments given
/// as (filename, plain-text content) pairs.
pub fn payload_json(to: &str, attachments: &[(&str, &str)]) -> String {
    let attachments: Vec<serde_json::Value> = attachments
        .iter()
        .map(|(name, content)| {
            serde_json::json!({
                "name": name,
                "size": content.len(),
                "data": encode_attachment(content),
            })
        })
        .collect();
    serde_json::json!({
        "from": "reports@clinic.example",
        "to": to,
        "subject": "Daily reports",
        "date": "2025-10-29",
        "body": "",
        "attachments": attachments,
    })
    .to_string()
}

/// In-memory [`Store`] mirroring the Postgres upsert semantics: unique
/// natural key per table, overwrite-on-conflict, and affected counting
/// that reports zero for value-identical rewrites.
#[derive(Default)]
pub struct MemoryStore {
    pub clinics: Vec<String>,
    /// (tenant, table) -> natural key -> record
    pub tables: HashMap<(String, String), HashMap<String, Record>>,
}

impl MemoryStore {
    pub fn table(&self, tenant: &str, table: &str) -> Option<&HashMap<String, Record>> {
        self.tables.get(&(tenant.to_string(), table.to_string()))
    }
}

impl Store for MemoryStore {
    fn ensure_clinic(&mut self, tenant: &str) -> Result<(), IngestError> {
        if !self.clinics.iter().any(|c| c == tenant) {
            self.clinics.push(tenant.to_string());
        }
        Ok(())
    }

    fn ensure_table(
        &mut self,
        tenant: &str,
        descriptor: &ReportDescriptor,
    ) -> Result<(), IngestError> {
        self.tables
            .entry((tenant.to_string(), descriptor.table.to_string()))
            .or_default();
        Ok(())
    }

    fn upsert(
        &mut self,
        tenant: &str,
        descriptor: &ReportDescriptor,
        rows: Vec<Record>,
    ) -> Result<UpsertCounts, IngestError> {
        let (rows, _missing) = dedup_by_natural_key(rows, descriptor.natural_key);
        let table = self
            .tables
            .entry((tenant.to_string(), descriptor.table.to_string()))
            .or_default();
        let mut affected = 0u64;
        for row in &rows {
            let key = match row.get(descriptor.natural_key) {
                Some(Field::Text(s)) => s.clone(),
                _ => continue,
            };
            match table.get(&key) {
                Some(existing) if existing == row => {}
                _ => {
                    table.insert(key, row.clone());
                    affected += 1;
                }
            }
        }
        Ok(UpsertCounts {
            rows_processed: rows.len() as u64,
            rows_affected: affected,
        })
    }
}
