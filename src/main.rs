use analytics::{format_duration, offset_from_minutes, AnalyticsEngine, JournalStats, TickerStats};
use anyhow::Context;
use broker_sync::{BrokerSync, CredentialVault, TradovateFactory};
use chrono::FixedOffset;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use configuration::Settings;
use core_types::{Account, Trade};
use database::{DbError, DbRepository};
use importer::{detect_mapping, export_trades, parse_trades, preview, ColumnMapping};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// The main entry point for the Tradebook journal.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load DATABASE_URL and ENCRYPTION_KEY from .env when present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut settings = configuration::load_config()?;
    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
    }
    let _guard = configuration::init_tracing(&settings.logging)?;

    match cli.command {
        Commands::Serve(args) => handle_serve(args, settings).await,
        Commands::CreateAccount { username } => {
            handle_create_account(&open_repository().await?, &username).await
        }
        Commands::Import(args) => handle_import(&open_repository().await?, &settings, args).await,
        Commands::Export(args) => handle_export(&open_repository().await?, args).await,
        Commands::Sync { account } => handle_sync(open_repository().await?, &settings, &account).await,
        Commands::Stats(args) => handle_stats(&open_repository().await?, args).await,
    }
}

/// Connects and migrates; every command except `serve` starts here.
async fn open_repository() -> anyhow::Result<DbRepository> {
    let db_pool = database::connect().await?;
    database::run_migrations(&db_pool).await?;
    Ok(DbRepository::new(db_pool))
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A trading journal: record trades, import them from CSV or Tradovate, and
/// analyse performance.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Overrides `logging.level` (e.g. "debug", "tradebook=trace").
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve(ServeArgs),
    /// Create a journal account.
    CreateAccount {
        /// 1-16 letters, digits, '_', '-' or '.'.
        username: String,
    },
    /// Import trades from a CSV file.
    Import(ImportArgs),
    /// Write all of an account's trades as CSV.
    Export(ExportArgs),
    /// Pull new fills from the account's configured Tradovate login.
    Sync {
        /// Account username or id.
        #[arg(long)]
        account: String,
    },
    /// Print summary statistics for an account.
    Stats(StatsArgs),
}

#[derive(Parser)]
struct ServeArgs {
    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Parser)]
struct ImportArgs {
    /// Account username or id.
    #[arg(long)]
    account: String,

    /// The CSV file to read.
    #[arg(long)]
    file: PathBuf,

    /// A JSON `ColumnMapping` to use instead of header detection.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Minutes east of UTC for timestamps without an offset.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    tz_offset: i32,

    /// Show the detected mapping and sample rows without saving anything.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser)]
struct ExportArgs {
    /// Account username or id.
    #[arg(long)]
    account: String,

    /// Output file. Writes to stdout when omitted.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct StatsArgs {
    /// Account username or id.
    #[arg(long)]
    account: String,

    /// Print the raw statistics as JSON.
    #[arg(long)]
    json: bool,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_serve(args: ServeArgs, mut settings: Settings) -> anyhow::Result<()> {
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    web_server::run_server(settings).await
}

async fn handle_create_account(db_repo: &DbRepository, username: &str) -> anyhow::Result<()> {
    let username = username.trim();
    Account::validate_username(username)?;
    let account = db_repo.create_account(username).await?;
    tracing::info!(account_id = %account.id, "Account created");
    println!("Created account '{}' ({})", account.username, account.id);
    Ok(())
}

fn import_offset(minutes: i32) -> anyhow::Result<FixedOffset> {
    offset_from_minutes(minutes).with_context(|| format!("Invalid --tz-offset {minutes}"))
}

async fn handle_import(db_repo: &DbRepository, settings: &Settings, args: ImportArgs) -> anyhow::Result<()> {
    let account = resolve_account(db_repo, &args.account).await?;
    let offset = import_offset(args.tz_offset)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    spinner.set_message(format!("Reading {}...", args.file.display()));
    let csv = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let preview = preview(&csv)?;
    let mapping = match &args.mapping {
        Some(path) => load_mapping(path)?,
        None => detect_mapping(preview.headers.as_slice()),
    };

    if args.dry_run {
        spinner.finish_and_clear();
        println!("{}", serde_json::to_string_pretty(&mapping)?);
        println!("{} data rows", preview.row_count);
        if !mapping.is_complete() {
            println!("Unmapped required fields: {}", mapping.missing_required().join(", "));
        }
        return Ok(());
    }

    spinner.set_message("Parsing rows...");
    let drafts = parse_trades(&csv, &mapping, offset, settings.import.max_rows)?;

    spinner.set_message(format!("Saving {} trades...", drafts.len()));
    let imported = db_repo.insert_trades(account.id, &drafts).await?;
    tracing::info!(account_id = %account.id, file = %args.file.display(), imported, "CSV import committed");
    spinner.finish_with_message(format!("Imported {imported} trades into '{}'", account.username));
    Ok(())
}

async fn handle_export(db_repo: &DbRepository, args: ExportArgs) -> anyhow::Result<()> {
    let account = resolve_account(db_repo, &args.account).await?;
    let trades = db_repo.list_trades(account.id).await?;
    let csv = export_trades(&trades)?;
    tracing::info!(account_id = %account.id, trades = trades.len(), "Exported trades");

    match args.output {
        Some(path) => {
            std::fs::write(&path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} trades to {}", trades.len(), path.display());
        }
        None => print!("{csv}"),
    }
    Ok(())
}

async fn handle_sync(db_repo: DbRepository, settings: &Settings, account: &str) -> anyhow::Result<()> {
    let account = resolve_account(&db_repo, account).await?;
    let vault = CredentialVault::from_env()?;
    let broker = BrokerSync::new(
        Arc::new(db_repo),
        Arc::new(TradovateFactory::new(settings.broker.clone())),
        vault,
    );

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Syncing Tradovate fills for '{}'...", account.username));
    let outcome = broker.sync(account.id).await;
    spinner.finish_and_clear();

    let outcome = outcome?;
    println!("{}", outcome.message);
    Ok(())
}

async fn handle_stats(db_repo: &DbRepository, args: StatsArgs) -> anyhow::Result<()> {
    let account = resolve_account(db_repo, &args.account).await?;
    let trades: Vec<Trade> = db_repo.list_trades(account.id).await?;
    let engine = AnalyticsEngine::new();
    let stats = engine.summarize(&trades);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", summary_table(&stats));
    let by_ticker = engine.summarize_by_ticker(&trades);
    if !by_ticker.is_empty() {
        println!("{}", ticker_table(&by_ticker));
    }
    Ok(())
}

// ==============================================================================
// Helpers
// ==============================================================================

/// Accepts either an account id or a username.
async fn resolve_account(db_repo: &DbRepository, account: &str) -> anyhow::Result<Account> {
    let lookup = match Uuid::parse_str(account) {
        Ok(id) => db_repo.get_account(id).await,
        Err(_) => db_repo.find_account_by_username(account).await,
    };
    match lookup {
        Ok(account) => Ok(account),
        Err(DbError::NotFound) => anyhow::bail!("No account named '{account}'"),
        Err(e) => Err(e.into()),
    }
}

fn load_mapping(path: &Path) -> anyhow::Result<ColumnMapping> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping {}", path.display()))?;
    let mapping: ColumnMapping = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid mapping in {}", path.display()))?;
    Ok(mapping)
}

fn money(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

fn summary_table(stats: &JournalStats) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);

    let rows: Vec<(&str, String)> = vec![
        ("Total P/L", money(stats.total_pl)),
        ("Trades", stats.total_trades.to_string()),
        ("Wins / Losses", format!("{} / {}", stats.wins, stats.losses)),
        ("Win Rate", format!("{}%", stats.win_rate.round_dp(2))),
        ("Avg Win", money(stats.avg_win)),
        ("Avg Loss", money(stats.avg_loss)),
        ("Best Trade", money(stats.best_trade)),
        ("Worst Trade", money(stats.worst_trade)),
        ("Profit Factor", stats.profit_factor.round_dp(2).to_string()),
        ("Expectancy", money(stats.expectancy)),
        ("Max Drawdown", money(stats.max_drawdown)),
        (
            "Streaks (W / L)",
            format!("{} / {}", stats.longest_win_streak, stats.longest_loss_streak),
        ),
        ("Avg Duration", format_duration(stats.avg_duration_ms)),
    ];
    for (metric, value) in rows {
        table.add_row(vec![Cell::new(metric), Cell::new(value).set_alignment(CellAlignment::Right)]);
    }
    table
}

fn ticker_table(by_ticker: &[TickerStats]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Ticker", "Trades", "Win Rate", "Total P/L"]);
    for entry in by_ticker {
        table.add_row(vec![
            Cell::new(&entry.ticker),
            Cell::new(entry.stats.total_trades).set_alignment(CellAlignment::Right),
            Cell::new(format!("{}%", entry.stats.win_rate.round_dp(2))).set_alignment(CellAlignment::Right),
            Cell::new(money(entry.stats.total_pl)).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
