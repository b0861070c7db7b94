use caisse::application::{Collaborators, OrderEngine, Stores};
use caisse::config::EngineConfig;
use caisse::domain::payment::PaymentMethod;
use caisse::domain::ports::{ClosureStoreBox, LoyaltyStoreBox, OrderStoreBox};
use caisse::infrastructure::in_memory::{InMemoryClosureStore, InMemoryLoyaltyStore, InMemoryOrderStore};
use caisse::infrastructure::sources::{
    CollaboratorData, ManualClock, StaticCatalog, StaticPromotions, StaticSettings,
};
use caisse::interfaces::csv::ticket_writer::TicketWriter;
use caisse::interfaces::json::command::{CommandProcessor, CommandReader};
use chrono::Utc;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Commands file, one JSON object per line
    input: PathBuf,

    /// Catalog, promotions and settings as JSON
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "CAISSE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Offset of local time from UTC, used for business dates and happy hours
    #[arg(
        long,
        env = "CAISSE_UTC_OFFSET_MINUTES",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    utc_offset_minutes: i32,

    /// Payment method settled upstream and never modified locally (repeatable, default: online)
    #[arg(long = "locked-method", value_parser = parse_method)]
    locked_methods: Vec<PaymentMethod>,

    /// Write the Ticket Z records issued during the run to this CSV file
    #[arg(long)]
    tickets_csv: Option<PathBuf>,
}

fn parse_method(value: &str) -> std::result::Result<PaymentMethod, String> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| format!("unknown payment method: {}", value))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("CAISSE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn persistent_stores(path: PathBuf) -> Result<(OrderStoreBox, LoyaltyStoreBox, ClosureStoreBox)> {
    let store = caisse::infrastructure::rocksdb::RocksDBStore::open(path).into_diagnostic()?;
    Ok((Box::new(store.clone()), Box::new(store.clone()), Box::new(store)))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn persistent_stores(_path: PathBuf) -> Result<(OrderStoreBox, LoyaltyStoreBox, ClosureStoreBox)> {
    Err(miette::miette!(
        "--db-path requires a build with the storage-rocksdb feature"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = EngineConfig::default()
        .with_offset_minutes(cli.utc_offset_minutes)
        .into_diagnostic()?;
    if !cli.locked_methods.is_empty() {
        config = config.with_locked_methods(cli.locked_methods);
    }

    let data = match &cli.catalog {
        Some(path) => CollaboratorData::load(path).into_diagnostic()?,
        None => CollaboratorData::default(),
    };

    let (orders, loyalty, closures) = if let Some(db_path) = cli.db_path {
        persistent_stores(db_path)?
    } else {
        let orders: OrderStoreBox = Box::new(InMemoryOrderStore::new());
        let loyalty: LoyaltyStoreBox = Box::new(InMemoryLoyaltyStore::new());
        let closures: ClosureStoreBox = Box::new(InMemoryClosureStore::new());
        (orders, loyalty, closures)
    };

    // Commands may carry their own instant; otherwise time stands at start-up.
    let clock = ManualClock::new(Utc::now());
    let engine = OrderEngine::new(
        Stores {
            orders,
            loyalty,
            closures,
        },
        Collaborators {
            catalog: Box::new(StaticCatalog::new(data.products)),
            promotions: Box::new(StaticPromotions::new(data.promotions)),
            settings: Box::new(StaticSettings::new(data.settings)),
            clock: Box::new(clock.clone()),
        },
        config,
    );
    let mut processor = CommandProcessor::new(engine, clock);

    let file = File::open(cli.input).into_diagnostic()?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for envelope in CommandReader::new(file).commands() {
        match envelope {
            Ok(envelope) => {
                let response = processor.execute(envelope).await;
                serde_json::to_writer(&mut out, &response).into_diagnostic()?;
                writeln!(out).into_diagnostic()?;
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }
    out.flush().into_diagnostic()?;

    if let Some(path) = cli.tickets_csv {
        let file = File::create(path).into_diagnostic()?;
        TicketWriter::new(file)
            .write_tickets(processor.tickets())
            .into_diagnostic()?;
    }

    Ok(())
}
