use biblend::application::engine::LendingEngine;
use biblend::application::registry::Registry;
use biblend::config::AppConfig;
use biblend::domain::money::DailyRate;
use biblend::domain::ports::{BookStore, BorrowingStore, UserStore};
use biblend::infrastructure::in_memory::InMemoryStore;
#[cfg(feature = "storage-rocksdb")]
use biblend::infrastructure::rocksdb::RocksDBStore;
use biblend::interfaces::catalog::Catalog;
use biblend::interfaces::csv::borrowing_writer::BorrowingWriter;
use biblend::interfaces::csv::command_reader::CommandReader;
use biblend::interfaces::csv::inventory_writer::InventoryWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input lending commands CSV file
    input: PathBuf,

    /// JSON catalog of users and books to register before processing
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Overrides the configured lending limit
    #[arg(long)]
    max_active_loans: Option<u32>,

    /// Overrides the configured fine per late day
    #[arg(long)]
    daily_fine_rate: Option<Decimal>,

    /// Writes every borrowing to this CSV file after processing
    #[arg(long)]
    loans_out: Option<PathBuf>,
}

impl Cli {
    fn app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path).into_diagnostic()?,
            None => AppConfig::default(),
        };
        if let Some(limit) = self.max_active_loans {
            config.policy.max_active_loans = limit;
        }
        if let Some(rate) = self.daily_fine_rate {
            config.policy.daily_fine_rate = DailyRate::new(rate).into_diagnostic()?;
        }
        config.policy.validate().into_diagnostic()?;
        Ok(config)
    }
}

fn wire<S>(store: S, config: &AppConfig) -> (Registry, LendingEngine)
where
    S: UserStore + BookStore + BorrowingStore + Clone + 'static,
{
    let registry = Registry::new(Box::new(store.clone()), Box::new(store.clone()));
    let engine = LendingEngine::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        Box::new(store),
        config.policy.clone(),
    );
    (registry, engine)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.app_config()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.as_str().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();

    let (registry, engine) = match &cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            tracing::info!(path = %db_path.display(), "Using RocksDB storage");
            wire(RocksDBStore::open(db_path).into_diagnostic()?, &config)
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            tracing::warn!(
                "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            wire(InMemoryStore::new(), &config)
        }
        None => wire(InMemoryStore::new(), &config),
    };

    if let Some(path) = &cli.catalog {
        let report = Catalog::load(path)
            .into_diagnostic()?
            .seed(&registry)
            .await
            .into_diagnostic()?;
        tracing::info!(
            users = report.users,
            books = report.books,
            skipped = report.skipped,
            "Catalog seeded"
        );
    }

    // Process commands
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command_result in reader.commands() {
        match command_result {
            Ok(command) => {
                if let Err(e) = engine.process_command(command).await {
                    tracing::warn!(kind = ?e.kind(), "Error processing command: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("Error reading command: {}", e);
            }
        }
    }

    let stdout = io::stdout();
    let mut writer = InventoryWriter::new(stdout.lock());
    writer
        .write_books(registry.books().await.into_diagnostic()?)
        .into_diagnostic()?;

    if let Some(path) = &cli.loans_out {
        let borrowings = engine.all_borrowings().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        BorrowingWriter::new(file)
            .write_borrowings(&borrowings)
            .into_diagnostic()?;
    }

    Ok(())
}
