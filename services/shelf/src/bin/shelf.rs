//! services/shelf/src/bin/shelf.rs

use clap::Parser;
use shelf_core::Library;
use shelf_lib::{
    adapters::{HttpFetcher, JsonSettingsStore, SqliteStore},
    cli::{self, Cli},
    config::Config,
    error::AppError,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(data_dir = %config.data_dir.display(), "Configuration loaded");

    // --- 2. Build the Adapters ---
    // The database is opened and migrated lazily on the first query.
    let store = Arc::new(SqliteStore::new(config.database_path()));
    let settings = Arc::new(JsonSettingsStore::open(config.settings_path()));
    let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout)?);

    // --- 3. Initialize the Library ---
    let library = Library::new(store, settings, fetcher, config.page_size);
    library.init(config.seed.as_ref()).await?;

    // --- 4. Run the Command ---
    cli::run(cli.command, &library).await
}
