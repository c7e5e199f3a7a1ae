use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use ussdpay::application::classifier::RegexSmsClassifier;
use ussdpay::application::correlator::PaymentCorrelator;
use ussdpay::application::dial;
use ussdpay::application::orchestrator::PaymentOrchestrator;
use ussdpay::config::Settings;
use ussdpay::domain::payment::PaymentRequest;
use ussdpay::domain::ports::{PaymentHistoryStoreBox, SmsClassifier};
use ussdpay::infrastructure::in_memory::InMemoryHistoryStore;
#[cfg(feature = "storage-rocksdb")]
use ussdpay::infrastructure::rocksdb::RocksDbHistoryStore;
use ussdpay::infrastructure::simulated::{LoggingSecureDisplay, SimulatedTelephony};
use ussdpay::interfaces::csv::history_writer::HistoryWriter;
use ussdpay::interfaces::csv::sms_reader::{SmsFeedReader, replay};
use ussdpay::interfaces::qr::QrPayload;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the USSD dial string for a payment
    Encode { vpa: String, amount: Decimal },
    /// Classify an SMS body (argument, or stdin when omitted) and print it as JSON
    Classify { text: Option<String> },
    /// Parse a decoded QR payload and print it as JSON
    Qr { payload: String },
    /// Run one payment against simulated telephony, replaying a recorded SMS feed
    Pay(PayArgs),
}

#[derive(Args)]
struct PayArgs {
    /// Recipient VPA
    #[arg(long)]
    vpa: String,

    #[arg(long)]
    amount: Decimal,

    #[arg(long)]
    description: Option<String>,

    /// CSV of `delay_ms,sender,body` rows; delays count from when the payment
    /// starts waiting for its confirmation
    #[arg(long)]
    sms_feed: Option<PathBuf>,

    /// Overrides `timeout_secs` from the settings file
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    sim_slot: Option<u8>,

    /// Make the simulated dial fail with this reason
    #[arg(long)]
    fail_dial: Option<String>,

    /// Path to persistent history (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let settings = Settings::load(cli.config.as_deref()).into_diagnostic()?;

    match cli.command {
        Command::Encode { vpa, amount } => {
            println!("{}", dial::encode(&vpa, amount).into_diagnostic()?);
        }
        Command::Classify { text } => {
            let text = match text {
                Some(text) => text,
                None => io::read_to_string(io::stdin()).into_diagnostic()?,
            };
            let classifier = RegexSmsClassifier::from_rules(&settings.classifier).into_diagnostic()?;
            let parsed = classifier.classify(&text);
            println!("{}", serde_json::to_string_pretty(&parsed).into_diagnostic()?);
        }
        Command::Qr { payload } => {
            let qr = QrPayload::parse(&payload).into_diagnostic()?;
            println!("{}", serde_json::to_string_pretty(&qr).into_diagnostic()?);
        }
        Command::Pay(args) => pay(args, settings).await?,
    }

    Ok(())
}

async fn pay(args: PayArgs, settings: Settings) -> Result<()> {
    let request =
        PaymentRequest::from_input(&args.vpa, args.amount, args.description).into_diagnostic()?;

    let classifier = RegexSmsClassifier::from_rules(&settings.classifier).into_diagnostic()?;
    let correlator = PaymentCorrelator::new(Arc::new(classifier));
    let telephony = match args.fail_dial {
        Some(reason) => SimulatedTelephony::failing(reason),
        None => SimulatedTelephony::new(),
    };
    let history = open_history(args.db_path.as_deref(), settings.history_limit)?;

    let orchestrator = PaymentOrchestrator::new(
        Box::new(telephony),
        Box::new(LoggingSecureDisplay::new()),
        history,
        correlator.clone(),
    )
    .with_timeout(
        args.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| settings.timeout()),
    )
    .with_sim_slot(args.sim_slot.or(settings.sim_slot));

    let mut messages = Vec::new();
    if let Some(path) = args.sms_feed {
        let file = File::open(path).into_diagnostic()?;
        for sms in SmsFeedReader::new(file).messages() {
            match sms {
                Ok(sms) => messages.push(sms),
                Err(e) => warn!(error = %e, "skipping unreadable sms feed row"),
            }
        }
    }
    let feed = tokio::spawn(async move { replay(&correlator, messages).await });

    let result = orchestrator.pay(request).await.into_diagnostic()?;
    feed.abort();

    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);

    let payments = orchestrator.history().recent().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = HistoryWriter::new(stdout.lock());
    writer.write_payments(&payments).into_diagnostic()?;

    Ok(())
}

fn open_history(db_path: Option<&Path>, limit: usize) -> Result<PaymentHistoryStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => Ok(Box::new(
            RocksDbHistoryStore::open_with_limit(path, limit).into_diagnostic()?,
        )),
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "persistent history requested via --db-path, but the 'storage-rocksdb' feature \
                 is not enabled; falling back to in-memory history"
            );
            Ok(Box::new(InMemoryHistoryStore::with_limit(limit)))
        }
        None => Ok(Box::new(InMemoryHistoryStore::with_limit(limit))),
    }
}

fn init_logging(level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}
