// Dish Ledger - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod error;
pub mod config;
pub mod logging;
pub mod dialect;        // MySQL → SQLite translation shim
pub mod db;
pub mod analysis;       // Financial aggregation and warnings
pub mod entities;       // Transactions, memos, tag palette
pub mod auth;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use error::{LedgerError, Result};
pub use config::AppConfig;
pub use dialect::{mysql_to_sqlite, split_statements, translate_statement, StatementKind};
pub use db::{
    DbStatus, ExecOutcome,
    open_database, open_read_only, open_in_memory, init_database, missing_tables, db_status,
    execute, execute_script,
};
pub use analysis::{
    DateRange, Thresholds, Summary, Grouping, GroupedTotal, AnalysisData,
    FinancialReport, LedgerTable, Warnings,
    summary, analysis_data, financial_report, ledger_table,
};
pub use entities::{
    Transaction, TransactionType, NewTransaction,
    Memo, MemoFilter, MemoView, Tag,
    insert_transactions, list_transactions, count_transactions, load_csv,
};
pub use auth::{LoginGrant, SessionStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
