use thiserror::Error;

/// Failure taxonomy for the ingestion pipeline.
///
/// Only `TenantResolution` rejects a whole inbound message; every other
/// variant is converted into a per-attachment outcome by the orchestrator
/// and never propagates past it.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Recipient address carries no `+tag@` clinic marker.
    #[error("recipient '{0}' carries no +tag clinic marker")]
    TenantResolution(String),

    /// Database, table, or index creation failed.
    #[error("schema provisioning failed: {0}")]
    Provisioning(String),

    /// Invalid base64, unparseable spreadsheet, or empty table.
    #[error("attachment decode failed: {0}")]
    Decode(String),

    /// Storage write failed; the attachment's transaction was rolled back.
    #[error("upsert failed: {0}")]
    Upsert(String),

    /// Attachment classified outside the known report types.
    #[error("unsupported report type for '{0}'")]
    UnsupportedReport(String),

    /// Could not open a connection to the storage engine.
    #[error("storage connection failed: {0}")]
    Connection(String),
}

impl IngestError {
    pub fn provisioning(err: impl std::fmt::Display) -> Self {
        IngestError::Provisioning(err.to_string())
    }

    pub fn upsert(err: impl std::fmt::Display) -> Self {
        IngestError::Upsert(err.to_string())
    }
}
