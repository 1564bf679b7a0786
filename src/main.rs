//! glottocat batch import
//!
//! Reconciles one corpus version of harvested bibliography records into the
//! canonical catalog and writes the change log next to the corpus.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glottocat::bib::RawRecord;
use glottocat::config::AppConfig;
use glottocat::services::ImportService;
use glottocat::store::PgCatalogStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("glottocat={}", config.logging.level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting glottocat import v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to catalog store");

    let batch_dir = Path::new(&config.import.data_dir).join(&config.import.version);
    let records = read_corpus(&batch_dir.join("refs.jsonl"))?;
    tracing::info!(
        version = %config.import.version,
        records = records.len(),
        mode = ?config.import.mode,
        "corpus loaded"
    );

    let store = Arc::new(PgCatalogStore::new(pool));
    let service = ImportService::new(store)?;
    let outcome = service.run(config.import.mode, records).await?;

    tracing::info!(
        "{} records updated or imported, {} skipped because of lack of information",
        outcome.changed,
        outcome.skipped
    );

    // Change log artifact for downstream reviewer tooling
    let changes_path = batch_dir.join("refs-changes.json");
    let file = BufWriter::new(File::create(&changes_path)?);
    serde_json::to_writer_pretty(file, &outcome)?;
    tracing::info!(path = %changes_path.display(), "change log written");

    Ok(())
}

/// Read a JSON-lines corpus file, one raw record per line.
fn read_corpus(path: &Path) -> anyhow::Result<Vec<RawRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
