use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vendgate::application::inquiry::{Inquiry, SearchKey};
use vendgate::application::orchestrator::{Outcome, VendOrchestrator};
use vendgate::config::{HubConfig, RetryConfig};
use vendgate::domain::ports::{HubTransportBox, TransactionLedgerBox};
use vendgate::domain::signer::{Credentials, Signer};
use vendgate::domain::transaction::{Amount, MeterNumber, VendRequest};
use vendgate::infrastructure::http::HttpTransport;
use vendgate::infrastructure::in_memory::InMemoryLedger;
use vendgate::infrastructure::mock::MockHubTransport;
use vendgate::infrastructure::retry::RetryPolicy;
use vendgate::interfaces::csv::receipt_writer::{Receipt, ReceiptWriter};
use vendgate::interfaces::csv::vend_reader::VendReader;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    hub: HubArgs,

    /// Path to persistent ledger (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Debug logging for this crate
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct HubArgs {
    /// Hub service URL; requests go to `<endpoint>?ACTION=<action>`
    #[arg(long, env = "HUB_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "TP_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "TP_USERPASS", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "TP_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Per-attempt timeout in seconds
    #[arg(long, env = "HUB_TIMEOUT_SECS", default_value_t = 15)]
    timeout_secs: u64,

    /// Attempts per hub request, including the first
    #[arg(long, env = "HUB_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Base backoff delay in milliseconds
    #[arg(long, env = "HUB_BACKOFF_BASE_MS", default_value_t = 1000)]
    backoff_base_ms: u64,

    /// Answer every request from the built-in mock hub instead of the network
    #[arg(long, env = "HUB_MOCK")]
    mock: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Buy credit for a meter
    Purchase {
        #[arg(long)]
        meter: String,
        #[arg(long)]
        amount: Decimal,
        /// Run CHECK before PURCHASE under the same transaction id
        #[arg(long)]
        two_step: bool,
        #[arg(long, default_value = "M")]
        calc_mode: String,
        #[arg(long)]
        verify_data: Option<String>,
    },
    /// Show the vendor account balance
    Balance,
    /// List the hub's most recent transactions for a meter
    LastTransactions {
        #[arg(long)]
        meter: String,
    },
    /// Look up a recorded transaction by id, or the latest one for a meter
    Lookup {
        #[arg(long, conflicts_with = "meter", required_unless_present = "meter")]
        id: Option<String>,
        #[arg(long)]
        meter: Option<String>,
    },
    /// Vend every `meter,amount` row of a CSV file and print CSV receipts
    Batch {
        input: PathBuf,
        #[arg(long)]
        two_step: bool,
        /// Maximum vends in flight at once
        #[arg(long, default_value_t = 8)]
        concurrency: usize,
    },
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let filter = if verbose {
        match "vendgate=debug".parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        }
    } else {
        filter
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn open_ledger(db_path: Option<PathBuf>) -> Result<TransactionLedgerBox> {
    use vendgate::infrastructure::rocksdb::RocksDbLedger;

    match db_path {
        Some(path) => {
            info!(path = %path.display(), "Using RocksDB ledger");
            Ok(Box::new(RocksDbLedger::open(path).into_diagnostic()?))
        }
        None => Ok(Box::new(InMemoryLedger::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_ledger(db_path: Option<PathBuf>) -> Result<TransactionLedgerBox> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory ledger."
        );
    }
    Ok(Box::new(InMemoryLedger::new()))
}

/// Validates configuration and picks the transport once, before any request.
fn build_orchestrator(cli: &HubArgs, ledger: TransactionLedgerBox) -> Result<VendOrchestrator> {
    let credentials = Credentials::new(
        cli.username.as_deref().unwrap_or_default(),
        cli.password.as_deref().unwrap_or_default(),
        cli.secret_key.as_deref().unwrap_or_default(),
    )
    .into_diagnostic()?;

    let retry = RetryConfig {
        max_attempts: cli.max_attempts,
        base_delay: Duration::from_millis(cli.backoff_base_ms),
        ..RetryConfig::default()
    };

    let transport: HubTransportBox = if cli.mock {
        info!("Using mock hub transport");
        Box::new(MockHubTransport::new())
    } else {
        let config = HubConfig::new(cli.endpoint.clone().unwrap_or_default(), credentials.clone())
            .with_timeout(Duration::from_secs(cli.timeout_secs))
            .with_retry(retry);
        config.validate().into_diagnostic()?;
        Box::new(HttpTransport::from_config(&config).into_diagnostic()?)
    };

    Ok(VendOrchestrator::new(Signer::new(credentials), transport, ledger)
        .with_retry(RetryPolicy::from_config(&retry)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

fn print_outcome(outcome: &Outcome) -> Result<()> {
    print_json(outcome)?;
    if !outcome.success {
        std::process::exit(2);
    }
    Ok(())
}

async fn run_batch(
    orchestrator: Arc<VendOrchestrator>,
    input: PathBuf,
    two_step: bool,
    concurrency: usize,
) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::new();

    for (index, row) in VendReader::new(file).rows().enumerate() {
        let orchestrator = Arc::clone(&orchestrator);
        let permits = Arc::clone(&permits);
        tasks.push(tokio::spawn(async move {
            let row = match row {
                Ok(row) => row,
                Err(e) => return Receipt::from_error(index + 1, "", &e),
            };
            let meter = row.meter.to_string();
            let request = if two_step {
                VendRequest::check(row.meter, row.amount)
            } else {
                VendRequest::purchase(row.meter, row.amount)
            };
            let _permit = permits.acquire_owned().await;
            match orchestrator.execute(request).await {
                Ok(outcome) => Receipt::from_outcome(row.line, &meter, &outcome),
                Err(e) => Receipt::from_error(row.line, &meter, &e),
            }
        }));
    }

    let mut receipts = Vec::with_capacity(tasks.len());
    for task in tasks {
        receipts.push(task.await.into_diagnostic()?);
    }
    let succeeded = receipts.iter().filter(|r| r.success).count();
    info!(total = receipts.len(), succeeded, "Batch finished");

    let stdout = io::stdout();
    let mut writer = ReceiptWriter::new(stdout.lock());
    writer.write_receipts(receipts).into_diagnostic()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ledger = open_ledger(cli.db_path)?;

    match cli.command {
        Command::Purchase {
            meter,
            amount,
            two_step,
            calc_mode,
            verify_data,
        } => {
            let orchestrator = build_orchestrator(&cli.hub, ledger)?;
            let meter = MeterNumber::parse(&meter).into_diagnostic()?;
            let amount = Amount::new(amount).into_diagnostic()?;
            let mut request = if two_step {
                VendRequest::check(meter, amount)
            } else {
                VendRequest::purchase(meter, amount)
            }
            .with_calc_mode(calc_mode);
            if let Some(verify_data) = verify_data {
                request = request.with_verify_data(verify_data);
            }
            let outcome = orchestrator.execute(request).await.into_diagnostic()?;
            print_outcome(&outcome)
        }
        Command::Balance => {
            let orchestrator = build_orchestrator(&cli.hub, ledger)?;
            let outcome = orchestrator.execute_balance().await.into_diagnostic()?;
            print_outcome(&outcome)
        }
        Command::LastTransactions { meter } => {
            let orchestrator = build_orchestrator(&cli.hub, ledger)?;
            let meter = MeterNumber::parse(&meter).into_diagnostic()?;
            let outcome = orchestrator
                .execute_last_transactions(meter)
                .await
                .into_diagnostic()?;
            print_outcome(&outcome)
        }
        Command::Lookup { id, meter } => {
            let key = SearchKey::from_parts(id.as_deref(), meter.as_deref()).into_diagnostic()?;
            let record = Inquiry::new(ledger).search(&key).await.into_diagnostic()?;
            print_json(&record)
        }
        Command::Batch {
            input,
            two_step,
            concurrency,
        } => {
            let orchestrator = build_orchestrator(&cli.hub, ledger)?;
            run_batch(Arc::new(orchestrator), input, two_step, concurrency).await
        }
    }
}
