use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ClassifierMode;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load clinic report emails into per-clinic Postgres databases", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest one webhook email payload (JSON) into the clinic's database
    Ingest(IngestArgs),
    /// Print an overview of every clinic database and its tables
    Summary(SummaryArgs),
    /// Interactively query a clinic's ingested reports
    Browse(BrowseArgs),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Payload JSON file ('-' reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// How to treat attachment filenames outside the known report types
    #[arg(long = "classifier", value_enum, default_value = "strict")]
    pub classifier: ClassifierMode,
    /// Directory for raw-payload audit snapshots
    #[arg(long = "audit-dir", default_value = "emails")]
    pub audit_dir: PathBuf,
    /// Skip writing the raw-payload audit snapshot
    #[arg(long = "no-audit")]
    pub no_audit: bool,
    /// Pretty-print the ingestion result
    #[arg(long = "pretty")]
    pub pretty: bool,
    /// Exit nonzero when the whole message is rejected
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {}

#[derive(Debug, Args)]
pub struct BrowseArgs {
    /// Clinic database to open (prompts when omitted)
    #[arg(short = 'c', long = "clinic")]
    pub clinic: Option<String>,
}
