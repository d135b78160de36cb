use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stockpick_core::config::Settings;
use stockpick_core::export::csv::{write_csv, CSV_FILE_NAME};
use stockpick_core::ingest::{Period, YahooChartProvider};
use stockpick_core::report::{self, ReportOptions};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod display;

#[derive(Debug, Parser)]
#[command(name = "stockpick_worker")]
struct Args {
    /// Total cash to split evenly across the tickers.
    #[arg(long, allow_negative_numbers = true)]
    cash: f64,

    /// CSV export path.
    #[arg(long, default_value = CSV_FILE_NAME)]
    output: PathBuf,

    /// Comma-separated tickers. Defaults to REPORT_TICKERS, then the built-in NSE list.
    #[arg(long)]
    tickers: Option<String>,

    /// History window: 1d, 5d, 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd or max.
    #[arg(long)]
    period: Option<Period>,

    /// Tickers fetched at once.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Print the report without writing the CSV file.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if !report::is_valid_cash(args.cash) {
        tracing::warn!(cash = args.cash, "cash must be positive; no report generated");
        println!("{}", report::INVALID_CASH_PROMPT);
        return Ok(());
    }

    let options = resolve_options(&args, ReportOptions::from_env());
    let provider = YahooChartProvider::from_settings(&settings)?;

    let table = match report::build_report(&provider, &options, args.cash).await {
        Ok(table) => table,
        Err(err) => {
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "report run failed");
            return Err(err);
        }
    };

    for (ticker, reason) in table.failures() {
        println!("Error processing {ticker}: {reason}");
    }
    println!("{}", display::render_table(&table, settings.currency()));

    if args.dry_run {
        tracing::info!(dry_run = true, rows = table.len(), "skipping CSV export");
        return Ok(());
    }

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    write_csv(&table, std::io::BufWriter::new(file))
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    tracing::info!(path = %args.output.display(), rows = table.len(), "wrote CSV export");
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

/// CLI flags win over environment settings.
fn resolve_options(args: &Args, mut options: ReportOptions) -> ReportOptions {
    if let Some(s) = args.tickers.as_deref() {
        let tickers = report::parse_tickers(s);
        if !tickers.is_empty() {
            options.tickers = tickers;
        }
    }
    if let Some(period) = args.period {
        options.period = period;
    }
    if let Some(n) = args.concurrency {
        options.concurrency = n.max(1);
    }
    options
}
