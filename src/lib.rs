pub mod browse;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod message;
pub mod normalize;
pub mod provision;
pub mod report;
pub mod sheet;
pub mod store;
pub mod tenant;
pub mod upsert;

use std::{
    env,
    fs::File,
    io::Read,
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::cli::{Cli, Commands, IngestArgs};
use crate::config::StorageConfig;
use crate::ingest::Ingestor;
use crate::message::{InboundEmail, ResultStatus};
use crate::store::PgStore;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("clinic_ingest", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = StorageConfig::from_env();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&config, &args),
        Commands::Summary(_) => browse::summary(&config),
        Commands::Browse(args) => browse::interactive(&config, args.clinic),
    }
}

fn handle_ingest(config: &StorageConfig, args: &IngestArgs) -> Result<()> {
    let email = read_payload(&args.input)?;
    info!(
        "received email from '{}' to '{}' with {} attachment(s)",
        email.from,
        email.to,
        email.attachments.len()
    );
    if !args.no_audit
        && let Err(err) = write_audit_snapshot(&args.audit_dir, &email)
    {
        warn!("could not write audit snapshot: {err:#}");
    }

    let store = PgStore::new(config.clone());
    let mut ingestor = Ingestor::new(store, args.classifier);
    let result = ingestor.ingest(&email);

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("Serializing ingestion result")?;
    println!("{rendered}");

    if args.fail_fast && result.status == ResultStatus::Error {
        bail!(
            "message rejected: {}",
            result.message.as_deref().unwrap_or("unknown reason")
        );
    }
    Ok(())
}

fn read_payload(path: &Path) -> Result<InboundEmail> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Reading payload from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Reading payload {path:?}"))?
    };
    serde_json::from_str(&raw).with_context(|| format!("Parsing payload JSON from {path:?}"))
}

/// Saves the raw inbound payload for later inspection, one file per
/// message. Best-effort only; ingestion proceeds regardless.
fn write_audit_snapshot(dir: &Path, email: &InboundEmail) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Creating audit directory {dir:?}"))?;
    let path = dir.join(format!(
        "email_{}.json",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = File::create(&path).with_context(|| format!("Creating audit file {path:?}"))?;
    serde_json::to_writer_pretty(file, email).context("Writing audit JSON")?;
    info!("audit snapshot saved to {path:?}");
    Ok(())
}
