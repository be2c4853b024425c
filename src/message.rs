//! Wire types for the inbound webhook payload and the structured result
//! returned to the transport layer.

use serde::{Deserialize, Serialize};

/// One forwarded email as delivered by the webhook.
///
/// Only `to` and the attachment `name`/`data` fields drive ingestion; the
/// rest is carried for the audit snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEmail {
    #[serde(default)]
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAttachment {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    /// Base64-encoded file content.
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Warning,
    Error,
    Skipped,
}

/// Per-attachment processing record. Response-only; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AttachmentOutcome {
    pub filename: String,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_processed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AttachmentOutcome {
    pub fn success(
        filename: &str,
        table: &str,
        tenant: &str,
        rows_processed: u64,
        rows_affected: u64,
    ) -> Self {
        AttachmentOutcome {
            filename: filename.to_string(),
            table: table.to_string(),
            tenant: Some(tenant.to_string()),
            status: OutcomeStatus::Success,
            rows_processed: Some(rows_processed),
            rows_affected: Some(rows_affected),
            message: None,
            reason: None,
        }
    }

    pub fn warning(filename: &str, table: &str, tenant: &str, message: &str) -> Self {
        AttachmentOutcome {
            filename: filename.to_string(),
            table: table.to_string(),
            tenant: Some(tenant.to_string()),
            status: OutcomeStatus::Warning,
            rows_processed: None,
            rows_affected: None,
            message: Some(message.to_string()),
            reason: None,
        }
    }

    pub fn error(filename: &str, table: &str, tenant: &str, message: &str) -> Self {
        AttachmentOutcome {
            filename: filename.to_string(),
            table: table.to_string(),
            tenant: Some(tenant.to_string()),
            status: OutcomeStatus::Error,
            rows_processed: None,
            rows_affected: None,
            message: Some(message.to_string()),
            reason: None,
        }
    }

    pub fn skipped(filename: &str, table: &str, reason: &str) -> Self {
        AttachmentOutcome {
            filename: filename.to_string(),
            table: table.to_string(),
            tenant: None,
            status: OutcomeStatus::Skipped,
            rows_processed: None,
            rows_affected: None,
            message: None,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Aggregated result of processing one inbound message.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<AttachmentOutcome>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IngestionResult {
    pub fn completed(tenant: &str, results: Vec<AttachmentOutcome>) -> Self {
        IngestionResult {
            status: ResultStatus::Success,
            tenant: Some(tenant.to_string()),
            results: Some(results),
            message: None,
        }
    }

    /// Whole-message rejection: tenant unresolved or its database could not
    /// be provisioned. No attachments were attempted. `tenant` is carried
    /// when resolution succeeded, so the audit trail names the clinic even
    /// for provisioning failures.
    pub fn rejected(tenant: Option<&str>, message: &str) -> Self {
        IngestionResult {
            status: ResultStatus::Error,
            tenant: tenant.map(str::to_string),
            results: None,
            message: Some(message.to_string()),
        }
    }
}
