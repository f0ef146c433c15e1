use crate::dialect::{classify, mysql_to_sqlite, split_statements, translate_statement, StatementKind};
use crate::error::{LedgerError, Result};
use rusqlite::{Connection, OpenFlags, Params, Statement};
use serde::Serialize;
use std::path::Path;

/// Tables the application cannot run without
pub const REQUIRED_TABLES: [&str; 6] = [
    "transactions",
    "categories",
    "accounts",
    "suppliers",
    "memos",
    "tags",
];

/// Embedded MySQL schema, translated through the dialect shim at start-up
const SCHEMA_FILES: [(&str, &str); 7] = [
    ("init.sql", include_str!("../sql/init.sql")),
    ("add_categories_table.sql", include_str!("../sql/add_categories_table.sql")),
    ("add_accounts_table.sql", include_str!("../sql/add_accounts_table.sql")),
    ("add_suppliers_table.sql", include_str!("../sql/add_suppliers_table.sql")),
    ("add_memos_table.sql", include_str!("../sql/add_memos_table.sql")),
    ("add_tags_table.sql", include_str!("../sql/add_tags_table.sql")),
    ("add_colors_table.sql", include_str!("../sql/add_colors_table.sql")),
];

/// Columns added after the first release: (table, column, definition)
const LEGACY_COLUMNS: [(&str, &str, &str); 2] = [
    ("transactions", "supplier", "VARCHAR(255) DEFAULT NULL"),
    ("memos", "memo_date", "DATE DEFAULT NULL"),
];

// ============================================================================
// CONNECTION
// ============================================================================

pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    tracing::info!("📂 SQLite database opened: {}", path.display());
    Ok(conn)
}

/// Inspect an existing database without creating or changing it
pub fn open_read_only(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        return Err(LedgerError::not_found(format!("database {}", path.display())));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    tracing::debug!("📂 SQLite database opened read-only: {}", path.display());
    Ok(conn)
}

/// In-memory database (WAL does not apply)
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

// ============================================================================
// SCHEMA BOOTSTRAP
// ============================================================================

/// User tables, sorted by name
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
         ORDER BY name",
    )?;

    let tables = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    Ok(tables)
}

pub fn missing_tables(conn: &Connection) -> Result<Vec<String>> {
    let existing = list_tables(conn)?;
    Ok(REQUIRED_TABLES
        .iter()
        .filter(|table| !existing.iter().any(|e| e == *table))
        .map(|table| table.to_string())
        .collect())
}

/// Create the schema on first start, or fill in tables that went missing.
/// Returns early when every required table is already there.
pub fn init_database(conn: &Connection) -> Result<()> {
    let missing = missing_tables(conn)?;
    if missing.is_empty() {
        tracing::debug!("schema already initialised");
        return Ok(());
    }
    tracing::info!("📝 initialising schema, missing tables: {}", missing.join(", "));

    let mut applied = 0;
    for (file, sql) in SCHEMA_FILES {
        for statement in split_statements(&mysql_to_sqlite(sql)) {
            match conn.execute_batch(&statement) {
                Ok(()) => applied += 1,
                Err(e) if e.to_string().contains("already exists") => {
                    tracing::debug!(file, "skipping existing object");
                }
                Err(e) => {
                    let preview: String = statement.chars().take(100).collect();
                    tracing::warn!(file, error = %e, "schema statement failed: {}", preview);
                }
            }
        }
    }

    for (table, column, definition) in LEGACY_COLUMNS {
        if table_exists(conn, table)? && !has_column(conn, table, column)? {
            conn.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN {column} {definition}"
            ))?;
            tracing::info!("✅ added column {}.{}", table, column);
        }
    }

    let missing = missing_tables(conn)?;
    if !missing.is_empty() {
        tracing::error!("❌ missing tables after init: {}", missing.join(", "));
        return Err(LedgerError::MissingTables { missing });
    }

    tracing::info!("✅ schema ready ({} statements applied)", applied);
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    Ok(table_columns(conn, table)?.iter().any(|c| c.name == column))
}

// ============================================================================
// EXECUTION (through the dialect shim)
// ============================================================================

/// Result of a write statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecOutcome {
    /// Set for INSERT only
    pub insert_id: Option<i64>,
    pub affected_rows: usize,
}

/// Translate and run one write statement
pub fn execute<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<ExecOutcome> {
    let translated = translate_statement(sql);
    tracing::debug!(sql = %translated, "execute");

    let affected_rows = conn.execute(&translated, params)?;
    let insert_id = match classify(&translated) {
        StatementKind::Insert => Some(conn.last_insert_rowid()),
        _ => None,
    };

    Ok(ExecOutcome {
        insert_id,
        affected_rows,
    })
}

/// Translate a whole script and run it statement by statement
pub fn execute_script(conn: &Connection, sql: &str) -> Result<usize> {
    let statements = split_statements(&mysql_to_sqlite(sql));
    for statement in &statements {
        tracing::debug!(sql = %statement, "execute_script");
        conn.execute_batch(statement)?;
    }
    Ok(statements.len())
}

/// Prepared query with MySQL functions rewritten for SQLite
pub fn prepare_translated<'c>(conn: &'c Connection, sql: &str) -> Result<Statement<'c>> {
    let translated = translate_statement(sql);
    tracing::debug!(sql = %translated, "prepare");
    Ok(conn.prepare(&translated)?)
}

// ============================================================================
// STATUS (debug endpoint / `status` command)
// ============================================================================

/// One row of `PRAGMA table_info`
#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub notnull: i64,
    pub dflt_value: Option<String>,
    pub pk: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionsInfo {
    pub columns: Vec<ColumnInfo>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DbStatus {
    pub tables: Vec<String>,
    pub transactions: Option<TransactionsInfo>,
}

pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    // PRAGMA arguments cannot be bound; only internal table names reach here
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;

    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                column_type: row.get(2)?,
                notnull: row.get(3)?,
                dflt_value: row.get(4)?,
                pk: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(columns)
}

pub fn db_status(conn: &Connection) -> Result<DbStatus> {
    let tables = list_tables(conn)?;

    let transactions = if tables.iter().any(|t| t == "transactions") {
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Some(TransactionsInfo {
            columns: table_columns(conn, "transactions")?,
            count,
        })
    } else {
        None
    };

    Ok(DbStatus {
        tables,
        transactions,
    })
}
