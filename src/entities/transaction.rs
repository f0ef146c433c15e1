// 💰 Transaction Entity - income/expense records
//
// Amounts are always positive; `type` carries the direction.
// Category, account, and supplier are stored by name, not by id.

use crate::analysis::DateRange;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Account used when a record names none
pub const DEFAULT_ACCOUNT: &str = "现金";

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(LedgerError::validation(format!(
                "unknown transaction type '{other}' (expected income or expense)"
            ))),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

// ============================================================================
// STORED TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    pub description: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub category: String,
    pub account: String,
    pub supplier: Option<String>,
    pub created_at: Option<String>,
}

// ============================================================================
// NEW TRANSACTION (input: API body or CSV row)
// ============================================================================

/// Unvalidated input. CSV header: `type,amount,description,date,category,account,supplier`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    pub date: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl NewTransaction {
    pub fn new(kind: TransactionType, amount: f64, date: &str) -> Self {
        NewTransaction {
            kind,
            amount,
            description: None,
            date: date.to_string(),
            category: None,
            account: None,
            supplier: None,
        }
    }

    pub fn with_names(mut self, category: &str, account: &str, supplier: &str) -> Self {
        self.category = Some(category.to_string());
        self.account = Some(account.to_string());
        self.supplier = Some(supplier.to_string());
        self
    }

    /// Check required fields and fill defaults: blank account → `DEFAULT_ACCOUNT`,
    /// missing description → empty string
    pub fn validate(self) -> Result<Self> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(LedgerError::validation(format!(
                "amount must be a positive number, got {}",
                self.amount
            )));
        }

        let date = self.date.trim();
        if date.is_empty() {
            return Err(LedgerError::validation("date is required"));
        }
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            LedgerError::validation(format!("date must be YYYY-MM-DD, got '{date}'"))
        })?;

        if is_blank(&self.category) {
            return Err(LedgerError::validation("category is required"));
        }
        if is_blank(&self.supplier) {
            return Err(LedgerError::validation("supplier is required"));
        }

        let account = if is_blank(&self.account) {
            DEFAULT_ACCOUNT.to_string()
        } else {
            self.account.unwrap_or_default().trim().to_string()
        };

        Ok(NewTransaction {
            kind: self.kind,
            amount: self.amount,
            description: Some(self.description.unwrap_or_default()),
            date: date.to_string(),
            category: self.category.map(|c| c.trim().to_string()),
            account: Some(account),
            supplier: self.supplier.map(|s| s.trim().to_string()),
        })
    }
}

// ============================================================================
// STORAGE
// ============================================================================

const INSERT_SQL: &str = "INSERT INTO transactions (type, amount, description, date, category, account, supplier)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

fn insert_valid(conn: &Connection, tx: &NewTransaction) -> Result<i64> {
    conn.execute(
        INSERT_SQL,
        params![
            tx.kind,
            tx.amount,
            tx.description.as_deref().unwrap_or_default(),
            tx.date,
            tx.category,
            tx.account.as_deref().unwrap_or(DEFAULT_ACCOUNT),
            tx.supplier,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Validate and insert one record; returns the new id
pub fn insert_transaction(conn: &Connection, tx: NewTransaction) -> Result<i64> {
    let tx = tx.validate()?;
    insert_valid(conn, &tx)
}

/// All-or-nothing batch insert.
///
/// The whole batch is rejected before writing when any record lacks a
/// category or a supplier; the message carries how many do.
pub fn insert_transactions(conn: &Connection, transactions: Vec<NewTransaction>) -> Result<usize> {
    if transactions.is_empty() {
        return Err(LedgerError::validation("no transactions provided"));
    }

    let missing_category = transactions.iter().filter(|t| is_blank(&t.category)).count();
    if missing_category > 0 {
        return Err(LedgerError::validation(format!(
            "{missing_category} records have no category; fill them in and resubmit"
        )));
    }

    let missing_supplier = transactions.iter().filter(|t| is_blank(&t.supplier)).count();
    if missing_supplier > 0 {
        return Err(LedgerError::validation(format!(
            "{missing_supplier} records have no supplier; fill them in and resubmit"
        )));
    }

    let valid = transactions
        .into_iter()
        .enumerate()
        .map(|(i, tx)| {
            tx.validate().map_err(|e| match e {
                LedgerError::Validation { message } => {
                    LedgerError::validation(format!("record {}: {}", i + 1, message))
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let db_tx = conn.unchecked_transaction()?;
    for tx in &valid {
        insert_valid(&db_tx, tx)?;
    }
    db_tx.commit()?;

    tracing::info!("✓ Inserted: {} transactions", valid.len());
    Ok(valid.len())
}

/// Newest first (date DESC, id DESC)
pub fn list_transactions(conn: &Connection, range: &DateRange) -> Result<Vec<Transaction>> {
    let mut sql = String::from(
        "SELECT id, type, amount, description, date, category, account, supplier, created_at
         FROM transactions",
    );
    let bounds: Vec<&str> = match range.bounds() {
        Some((start, end)) => {
            sql.push_str(" WHERE date BETWEEN ?1 AND ?2");
            vec![start, end]
        }
        None => Vec::new(),
    };
    sql.push_str(" ORDER BY date DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let transactions = stmt
        .query_map(params_from_iter(bounds.iter()), |row| {
            Ok(Transaction {
                id: row.get(0)?,
                kind: row.get(1)?,
                amount: row.get(2)?,
                description: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                date: row.get(4)?,
                category: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                account: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                supplier: row.get(7)?,
                created_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(transactions)
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
    Ok(count)
}

/// Read unvalidated records from a CSV file
pub fn load_csv(csv_path: &Path) -> Result<Vec<NewTransaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let mut transactions = Vec::new();
    for result in rdr.deserialize() {
        let transaction: NewTransaction = result?;
        transactions.push(transaction);
    }

    tracing::debug!("loaded {} rows from {}", transactions.len(), csv_path.display());
    Ok(transactions)
}
