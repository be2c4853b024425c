//! Storage seam between the orchestrator and Postgres.
//!
//! The orchestrator only ever talks to a [`Store`]; [`PgStore`] is the
//! production implementation. Each operation opens its own connection and
//! closes it on every exit path, per-attachment writes commit as one
//! transaction inside [`crate::upsert`].

use log::debug;
use postgres::NoTls;

use crate::config::StorageConfig;
use crate::error::IngestError;
use crate::normalize::Record;
use crate::provision;
use crate::report::ReportDescriptor;
use crate::upsert::{self, UpsertCounts};

pub trait Store {
    /// Idempotently creates the clinic's storage namespace.
    fn ensure_clinic(&mut self, tenant: &str) -> Result<(), IngestError>;

    /// Idempotently creates the report table and indexes inside the
    /// clinic's namespace.
    fn ensure_table(
        &mut self,
        tenant: &str,
        descriptor: &ReportDescriptor,
    ) -> Result<(), IngestError>;

    /// Deduplicates and upserts `rows` into the clinic's report table.
    fn upsert(
        &mut self,
        tenant: &str,
        descriptor: &ReportDescriptor,
        rows: Vec<Record>,
    ) -> Result<UpsertCounts, IngestError>;
}

pub struct PgStore {
    config: StorageConfig,
}

impl PgStore {
    pub fn new(config: StorageConfig) -> Self {
        PgStore { config }
    }

    fn connect(&self, dbname: Option<&str>) -> Result<postgres::Client, IngestError> {
        let target = dbname.unwrap_or(&self.config.admin_db);
        debug!("connecting to database '{target}'");
        self.config
            .pg_config(dbname)
            .connect(NoTls)
            .map_err(|err| IngestError::Connection(format!("database '{target}': {err}")))
    }
}

impl Store for PgStore {
    fn ensure_clinic(&mut self, tenant: &str) -> Result<(), IngestError> {
        let mut admin = self.connect(None)?;
        provision::ensure_database(&mut admin, tenant)?;
        Ok(())
    }

    fn ensure_table(
        &mut self,
        tenant: &str,
        descriptor: &ReportDescriptor,
    ) -> Result<(), IngestError> {
        let mut client = self.connect(Some(tenant))?;
        provision::ensure_table(&mut client, descriptor)
    }

    fn upsert(
        &mut self,
        tenant: &str,
        descriptor: &ReportDescriptor,
        rows: Vec<Record>,
    ) -> Result<UpsertCounts, IngestError> {
        let mut client = self.connect(Some(tenant))?;
        upsert::upsert(&mut client, descriptor, rows)
    }
}
