//! Ingestion orchestrator: sequences tenant resolution, provisioning,
//! decoding, normalization, and upsert over one inbound message.
//!
//! Terminal states are `Rejected` (tenant unresolved or its database
//! unprovisionable; nothing attempted) and `Completed` (every attachment
//! produced an outcome; one attachment failing never aborts its siblings).
//! Attachments are processed in payload order, exactly once each, and
//! outcomes preserve that order.

use log::{info, warn};

use crate::config::ClassifierMode;
use crate::error::IngestError;
use crate::message::{AttachmentOutcome, EmailAttachment, InboundEmail, IngestionResult};
use crate::normalize::map_and_normalize;
use crate::report::{Classification, ReportDescriptor, classify};
use crate::sheet::decode_attachment;
use crate::store::Store;
use crate::tenant::resolve_tenant;

pub struct Ingestor<S: Store> {
    store: S,
    mode: ClassifierMode,
}

impl<S: Store> Ingestor<S> {
    pub fn new(store: S, mode: ClassifierMode) -> Self {
        Ingestor { store, mode }
    }

    /// Releases the underlying store, mainly so tests can inspect it.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Processes one inbound message and returns the structured result.
    /// Never returns an error: every failure is folded into the result.
    pub fn ingest(&mut self, email: &InboundEmail) -> IngestionResult {
        let tenant = match resolve_tenant(&email.to) {
            Ok(tenant) => tenant,
            Err(err) => {
                warn!("rejecting message: {err}");
                return IngestionResult::rejected(None, &err.to_string());
            }
        };
        info!(
            "ingesting message for clinic '{tenant}' with {} attachment(s)",
            email.attachments.len()
        );

        if let Err(err) = self.store.ensure_clinic(&tenant) {
            warn!("rejecting message for '{tenant}': {err}");
            return IngestionResult::rejected(Some(&tenant), &err.to_string());
        }

        let outcomes = email
            .attachments
            .iter()
            .map(|attachment| self.process_attachment(&tenant, attachment))
            .collect();
        IngestionResult::completed(&tenant, outcomes)
    }

    fn process_attachment(
        &mut self,
        tenant: &str,
        attachment: &EmailAttachment,
    ) -> AttachmentOutcome {
        let filename = attachment.name.as_str();
        let descriptor = match classify(filename, self.mode) {
            Classification::Known(descriptor) => descriptor,
            Classification::Unsupported { guessed } => {
                let (table, reason) = match guessed {
                    Some(table) => {
                        let reason = format!(
                            "filename maps to unsupported table '{table}'; no schema is defined for it"
                        );
                        (table, reason)
                    }
                    None => (
                        "unknown".to_string(),
                        "filename matches no known report type".to_string(),
                    ),
                };
                info!("skipping attachment '{filename}': {reason}");
                return AttachmentOutcome::skipped(filename, &table, &reason);
            }
        };

        match self.load_attachment(tenant, descriptor, attachment) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("attachment '{filename}' failed: {err}");
                AttachmentOutcome::error(filename, descriptor.table, tenant, &err.to_string())
            }
        }
    }

    fn load_attachment(
        &mut self,
        tenant: &str,
        descriptor: &ReportDescriptor,
        attachment: &EmailAttachment,
    ) -> Result<AttachmentOutcome, IngestError> {
        self.store.ensure_table(tenant, descriptor)?;
        let sheet = decode_attachment(&attachment.name, &attachment.data)?;
        let records = map_and_normalize(&sheet, descriptor);
        if records.iter().all(|record| record.is_empty()) {
            return Ok(AttachmentOutcome::warning(
                &attachment.name,
                descriptor.table,
                tenant,
                "no source columns matched the report's column mapping",
            ));
        }
        let counts = self.store.upsert(tenant, descriptor, records)?;
        info!(
            "attachment '{}' -> '{}.{}': {} processed, {} affected",
            attachment.name, tenant, descriptor.table, counts.rows_processed, counts.rows_affected
        );
        Ok(AttachmentOutcome::success(
            &attachment.name,
            descriptor.table,
            tenant,
            counts.rows_processed,
            counts.rows_affected,
        ))
    }
}
