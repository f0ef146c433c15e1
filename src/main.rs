// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use dish_ledger::config::AppConfig;
use dish_ledger::logging::init_logger;
use dish_ledger::{
    count_transactions, db_status, init_database, insert_transactions, load_csv,
    mysql_to_sqlite, open_database, open_read_only, split_statements,
};

#[derive(Parser)]
#[command(name = "dish-ledger", version, about = "Bookkeeping ledger: import, report, SQL translation")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a CSV file and insert its rows as one batch
    Import {
        /// Header: type,amount,description,date,category,account,supplier
        csv: PathBuf,
    },
    /// Terminal report for one year
    Report {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Print the SQLite translation of a MySQL script
    Translate { sql_file: PathBuf },
    /// Show tables and the transactions table layout
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logger(&config.logging);

    match cli.command {
        Command::Import { csv } => run_import(&config, &csv),
        Command::Report { year } => run_report(&config, year),
        Command::Translate { sql_file } => run_translate(&sql_file),
        Command::Status => run_status(&config),
    }
}

fn open_ledger(config: &AppConfig) -> Result<Connection> {
    let db_path = config.prepare_database_path()?;
    let conn = open_database(&db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    init_database(&conn).context("Failed to initialise schema")?;
    Ok(conn)
}

fn run_import(config: &AppConfig, csv_path: &Path) -> Result<()> {
    println!("🗄️  Import - CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n📂 Loading CSV...");
    let transactions = load_csv(csv_path)
        .with_context(|| format!("Failed to read {}", csv_path.display()))?;
    println!("✓ Loaded {} rows from CSV", transactions.len());

    println!("\n🔧 Opening database...");
    let conn = open_ledger(config)?;
    let before = count_transactions(&conn)?;

    println!("\n💾 Inserting transactions...");
    let inserted = insert_transactions(&conn, transactions)?;

    let total = count_transactions(&conn)?;
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Inserted {} transactions", inserted);
    println!("✓ Database now holds {} transactions (was {})", total, before);

    Ok(())
}

#[cfg(feature = "tui")]
fn run_report(config: &AppConfig, year: Option<i32>) -> Result<()> {
    use chrono::Datelike;
    use dish_ledger::{financial_report, ledger_table, list_transactions, DateRange};

    let year = year.unwrap_or_else(|| chrono::Local::now().year());
    println!("🖥️  Loading {} report...\n", year);

    let conn = open_ledger(config)?;
    let ledger = ledger_table(&conn, year)?;
    let report = financial_report(&conn, year, &config.analysis)?;
    let transactions = list_transactions(&conn, &DateRange::year(year))?;

    println!("✓ Loaded {} transactions\n", transactions.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(year, ledger, report, transactions);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_report(_config: &AppConfig, _year: Option<i32>) -> Result<()> {
    eprintln!("❌ Report mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or query the API: cargo run --bin ledger-server --features server");
    std::process::exit(1);
}

fn run_translate(sql_file: &Path) -> Result<()> {
    let mysql = std::fs::read_to_string(sql_file)
        .with_context(|| format!("Failed to read {}", sql_file.display()))?;

    let translated = mysql_to_sqlite(&mysql);
    for statement in split_statements(&translated) {
        println!("{};\n", statement);
    }
    Ok(())
}

fn run_status(config: &AppConfig) -> Result<()> {
    let db_path = config.database_path();
    let conn = open_read_only(&db_path)
        .with_context(|| format!("No readable database at {}", db_path.display()))?;

    let status = db_status(&conn)?;
    println!("📂 {}", db_path.display());
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}
