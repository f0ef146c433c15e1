// 📊 Financial Analysis - grouped totals, reports, and threshold warnings
//
// Two layers:
// 1. SQL: `summary` and `grouped_totals` aggregate the transactions table
// 2. Pure folds: `monthly_summaries`, `breakdown`, `FinancialReport::build`,
//    `LedgerTable::build` turn grouped rows into report shapes
//
// The folds never touch the database, so the TUI, the API and tests share them.

use crate::db::prepare_translated;
use crate::entities::TransactionType;
use crate::error::Result;
use rusqlite::{params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// INPUTS
// ============================================================================

/// Inclusive date range (`date BETWEEN start AND end`).
/// Filtering only applies when both bounds are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl DateRange {
    pub fn new(start: Option<String>, end: Option<String>) -> Self {
        DateRange { start, end }
    }

    /// `YYYY-01-01 .. YYYY-12-31`
    pub fn year(year: i32) -> Self {
        DateRange {
            start: Some(format!("{year:04}-01-01")),
            end: Some(format!("{year:04}-12-31")),
        }
    }

    pub fn bounds(&self) -> Option<(&str, &str)> {
        match (self.start.as_deref(), self.end.as_deref()) {
            (Some(start), Some(end)) if !start.is_empty() && !end.is_empty() => Some((start, end)),
            _ => None,
        }
    }
}

/// Warning thresholds for the yearly report
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Expense alert when expense > income × (1 + this)
    pub expense_threshold: f64,
    /// Monthly balance alert below this
    pub balance_threshold: f64,
    /// Yearly balance warning below this
    pub year_balance_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            expense_threshold: 0.3,
            balance_threshold: -100.0,
            year_balance_threshold: -1000.0,
        }
    }
}

// ============================================================================
// SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub income: f64,
    pub expense: f64,
    pub income_count: i64,
    pub expense_count: i64,
    pub balance: f64,
}

pub fn summary(conn: &Connection, range: &DateRange) -> Result<Summary> {
    let mut sql = String::from("SELECT type, SUM(amount) AS total, COUNT(*) AS count FROM transactions");
    let params = range_params(range);
    if !params.is_empty() {
        sql.push_str(" WHERE date BETWEEN ?1 AND ?2");
    }
    sql.push_str(" GROUP BY type");

    let mut stmt = prepare_translated(conn, &sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            Ok((
                row.get::<_, TransactionType>(0)?,
                row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stats = Summary::default();
    for (kind, total, count) in rows {
        match kind {
            TransactionType::Income => {
                stats.income = total;
                stats.income_count = count;
            }
            TransactionType::Expense => {
                stats.expense = total;
                stats.expense_count = count;
            }
        }
    }
    stats.balance = stats.income - stats.expense;

    Ok(stats)
}

fn range_params(range: &DateRange) -> Vec<&str> {
    match range.bounds() {
        Some((start, end)) => vec![start, end],
        None => Vec::new(),
    }
}

// ============================================================================
// GROUPED TOTALS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Category,
    Account,
    Supplier,
    Daily,
    Monthly,
    MonthlyCategory,
    MonthlySupplier,
    DailyDetail,
}

impl Grouping {
    pub const ALL: [Grouping; 8] = [
        Grouping::Category,
        Grouping::Account,
        Grouping::Supplier,
        Grouping::Daily,
        Grouping::Monthly,
        Grouping::MonthlyCategory,
        Grouping::MonthlySupplier,
        Grouping::DailyDetail,
    ];

    /// Output columns besides type/total/count
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Grouping::Category => &["category"],
            Grouping::Account => &["account"],
            Grouping::Supplier => &["supplier"],
            Grouping::Daily => &["date"],
            Grouping::Monthly => &["month"],
            Grouping::MonthlyCategory => &["month", "category"],
            Grouping::MonthlySupplier => &["month", "supplier"],
            Grouping::DailyDetail => &["date", "category", "account", "supplier"],
        }
    }

    fn select_list(&self) -> &'static str {
        match self {
            Grouping::Category => "category",
            Grouping::Account => "account",
            Grouping::Supplier => "supplier",
            Grouping::Daily => "date",
            Grouping::Monthly => "strftime('%Y-%m', date) AS month",
            Grouping::MonthlyCategory => "strftime('%Y-%m', date) AS month, category",
            Grouping::MonthlySupplier => "strftime('%Y-%m', date) AS month, supplier",
            Grouping::DailyDetail => "date, category, account, supplier",
        }
    }

    fn extra_filter(&self) -> Option<&'static str> {
        match self {
            Grouping::Category | Grouping::MonthlyCategory => Some("category != ''"),
            Grouping::Supplier | Grouping::MonthlySupplier => {
                Some("supplier IS NOT NULL AND supplier != ''")
            }
            _ => None,
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Grouping::Category => "category, type",
            Grouping::Account => "account, type",
            Grouping::Supplier => "total DESC",
            Grouping::Daily => "date DESC",
            Grouping::Monthly => "month DESC",
            Grouping::MonthlyCategory => "month, category",
            Grouping::MonthlySupplier => "month, supplier",
            Grouping::DailyDetail => "date DESC, category, account, supplier",
        }
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Grouping::Daily => Some(30),
            Grouping::Monthly => Some(12),
            Grouping::DailyDetail => Some(1000),
            _ => None,
        }
    }

    /// MySQL-flavoured query text; `prepare_translated` makes it SQLite
    pub fn sql(&self, filtered: bool, limit: Option<u32>) -> String {
        let mut conditions = Vec::new();
        if filtered {
            conditions.push("date BETWEEN ?1 AND ?2");
        } else if *self == Grouping::DailyDetail {
            conditions.push("date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)");
        }
        if let Some(filter) = self.extra_filter() {
            conditions.push(filter);
        }

        let mut sql = format!(
            "SELECT {}, type, SUM(amount) AS total, COUNT(*) AS count FROM transactions",
            self.select_list()
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(&format!(
            " GROUP BY {}, type ORDER BY {}",
            self.columns().join(", "),
            self.order_by()
        ));
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}

/// One grouped row; only the grouping's columns are set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedTotal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub total: f64,
    pub count: i64,
}

impl GroupedTotal {
    fn from_row(grouping: Grouping, row: &Row) -> rusqlite::Result<Self> {
        let columns = grouping.columns();
        let text = |name: &str| -> rusqlite::Result<Option<String>> {
            if columns.contains(&name) {
                row.get(name)
            } else {
                Ok(None)
            }
        };

        Ok(GroupedTotal {
            date: text("date")?,
            month: text("month")?,
            category: text("category")?,
            account: text("account")?,
            supplier: text("supplier")?,
            kind: row.get("type")?,
            total: row.get::<_, Option<f64>>("total")?.unwrap_or(0.0),
            count: row.get("count")?,
        })
    }
}

pub fn grouped_totals(
    conn: &Connection,
    grouping: Grouping,
    range: &DateRange,
) -> Result<Vec<GroupedTotal>> {
    grouped_totals_limited(conn, grouping, range, grouping.limit())
}

/// `grouped_totals` with the row limit overridden (`None` = unlimited)
pub fn grouped_totals_limited(
    conn: &Connection,
    grouping: Grouping,
    range: &DateRange,
    limit: Option<u32>,
) -> Result<Vec<GroupedTotal>> {
    let params = range_params(range);
    let sql = grouping.sql(!params.is_empty(), limit);

    let mut stmt = prepare_translated(conn, &sql)?;
    let rows = stmt
        .query_map(params_from_iter(params.iter()), |row| {
            GroupedTotal::from_row(grouping, row)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Everything the analysis screen needs, in one response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    pub category_expense: Vec<GroupedTotal>,
    pub category_stats: Vec<GroupedTotal>,
    pub account_stats: Vec<GroupedTotal>,
    pub supplier_stats: Vec<GroupedTotal>,
    pub daily_stats: Vec<GroupedTotal>,
    pub monthly_stats: Vec<GroupedTotal>,
    pub monthly_category_stats: Vec<GroupedTotal>,
    pub monthly_supplier_stats: Vec<GroupedTotal>,
    pub daily_detail_stats: Vec<GroupedTotal>,
}

pub fn analysis_data(conn: &Connection, range: &DateRange) -> Result<AnalysisData> {
    let category_stats = grouped_totals(conn, Grouping::Category, range)?;
    let category_expense = category_stats
        .iter()
        .filter(|row| row.kind == TransactionType::Expense)
        .cloned()
        .collect();

    Ok(AnalysisData {
        category_expense,
        category_stats,
        account_stats: grouped_totals(conn, Grouping::Account, range)?,
        supplier_stats: grouped_totals(conn, Grouping::Supplier, range)?,
        daily_stats: grouped_totals(conn, Grouping::Daily, range)?,
        monthly_stats: grouped_totals(conn, Grouping::Monthly, range)?,
        monthly_category_stats: grouped_totals(conn, Grouping::MonthlyCategory, range)?,
        monthly_supplier_stats: grouped_totals(conn, Grouping::MonthlySupplier, range)?,
        daily_detail_stats: grouped_totals(conn, Grouping::DailyDetail, range)?,
    })
}

// ============================================================================
// REPORT FOLDS (pure)
// ============================================================================

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// part / whole × 100, one decimal; 0 when whole is 0
pub fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        round1(part / whole * 100.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: String,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
    pub income_percent: f64,
    pub expense_percent: f64,
    pub expense_alert: bool,
    pub balance_alert: bool,
}

/// Fold Monthly rows into one entry per month, oldest first
pub fn monthly_summaries(rows: &[GroupedTotal], thresholds: &Thresholds) -> Vec<MonthlySummary> {
    let mut months: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in rows {
        let Some(month) = row.month.as_deref() else {
            continue;
        };
        let entry = months.entry(month).or_default();
        match row.kind {
            TransactionType::Income => entry.0 += row.total,
            TransactionType::Expense => entry.1 += row.total,
        }
    }

    months
        .into_iter()
        .map(|(month, (income, expense))| {
            let balance = income - expense;
            MonthlySummary {
                month: month.to_string(),
                income,
                expense,
                balance,
                income_percent: percent(income, income + expense),
                expense_percent: percent(expense, income + expense),
                expense_alert: is_expense_alert(income, expense, thresholds),
                balance_alert: balance < thresholds.balance_threshold,
            }
        })
        .collect()
}

fn is_expense_alert(income: f64, expense: f64, thresholds: &Thresholds) -> bool {
    income > 0.0 && expense > income * (1.0 + thresholds.expense_threshold)
}

/// Which name column a breakdown folds on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownKey {
    Category,
    Supplier,
}

impl BreakdownKey {
    fn name<'a>(&self, row: &'a GroupedTotal) -> Option<&'a str> {
        let name = match self {
            BreakdownKey::Category => row.category.as_deref(),
            BreakdownKey::Supplier => row.supplier.as_deref(),
        };
        name.filter(|n| !n.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownEntry {
    pub name: String,
    pub income: f64,
    pub expense: f64,
    pub total: f64,
    pub balance: f64,
    pub income_percent: f64,
    pub expense_percent: f64,
}

/// Fold Category or Supplier rows; largest total first, ties by name
pub fn breakdown(rows: &[GroupedTotal], key: BreakdownKey) -> Vec<BreakdownEntry> {
    let mut names: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in rows {
        let Some(name) = key.name(row) else {
            continue;
        };
        let entry = names.entry(name).or_default();
        match row.kind {
            TransactionType::Income => entry.0 += row.total,
            TransactionType::Expense => entry.1 += row.total,
        }
    }

    let mut entries: Vec<BreakdownEntry> = names
        .into_iter()
        .map(|(name, (income, expense))| {
            let total = income + expense;
            BreakdownEntry {
                name: name.to_string(),
                income,
                expense,
                total,
                balance: income - expense,
                income_percent: percent(income, total),
                expense_percent: percent(expense, total),
            }
        })
        .collect();

    entries.sort_by(|a, b| b.total.total_cmp(&a.total).then_with(|| a.name.cmp(&b.name)));
    entries
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyBreakdownEntry {
    pub month: String,
    pub name: String,
    pub income: f64,
    pub expense: f64,
    pub total: f64,
    pub balance: f64,
}

/// Per (month, name) fold; months ascending, then largest total first
pub fn monthly_breakdown(rows: &[GroupedTotal], key: BreakdownKey) -> Vec<MonthlyBreakdownEntry> {
    let mut cells: BTreeMap<(&str, &str), (f64, f64)> = BTreeMap::new();
    for row in rows {
        let (Some(month), Some(name)) = (row.month.as_deref(), key.name(row)) else {
            continue;
        };
        let entry = cells.entry((month, name)).or_default();
        match row.kind {
            TransactionType::Income => entry.0 += row.total,
            TransactionType::Expense => entry.1 += row.total,
        }
    }

    let mut entries: Vec<MonthlyBreakdownEntry> = cells
        .into_iter()
        .map(|((month, name), (income, expense))| MonthlyBreakdownEntry {
            month: month.to_string(),
            name: name.to_string(),
            income,
            expense,
            total: income + expense,
            balance: income - expense,
        })
        .collect();

    entries.sort_by(|a, b| {
        a.month
            .cmp(&b.month)
            .then_with(|| b.total.total_cmp(&a.total))
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}

// ============================================================================
// WARNINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseAlert {
    pub month: String,
    pub income: f64,
    pub expense: f64,
    /// (expense − income) / income × 100
    pub excess_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceAlert {
    pub month: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearWarning {
    pub balance: f64,
    pub threshold: f64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Warnings {
    pub year: Option<YearWarning>,
    pub expense_alerts: Vec<ExpenseAlert>,
    pub balance_alerts: Vec<BalanceAlert>,
}

impl Warnings {
    pub fn count(&self) -> usize {
        usize::from(self.year.is_some()) + self.expense_alerts.len() + self.balance_alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn collect(months: &[MonthlySummary], year_balance: f64, thresholds: &Thresholds) -> Self {
        let expense_alerts = months
            .iter()
            .filter(|m| m.expense_alert)
            .map(|m| ExpenseAlert {
                month: m.month.clone(),
                income: m.income,
                expense: m.expense,
                excess_percent: round1((m.expense - m.income) / m.income * 100.0),
            })
            .collect();

        let balance_alerts = months
            .iter()
            .filter(|m| m.balance_alert)
            .map(|m| BalanceAlert {
                month: m.month.clone(),
                balance: m.balance,
            })
            .collect();

        let year = (year_balance < thresholds.year_balance_threshold).then(|| YearWarning {
            balance: year_balance,
            threshold: thresholds.year_balance_threshold,
            message: format!(
                "Year balance ¥{:.2} is below the threshold ¥{:.2}",
                year_balance, thresholds.year_balance_threshold
            ),
        });

        Warnings {
            year,
            expense_alerts,
            balance_alerts,
        }
    }
}

// ============================================================================
// FINANCIAL REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    /// Over months that have data
    pub average_monthly_expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialReport {
    pub thresholds: Thresholds,
    pub overview: Overview,
    pub months: Vec<MonthlySummary>,
    pub categories: Vec<BreakdownEntry>,
    pub suppliers: Vec<BreakdownEntry>,
    pub monthly_categories: Vec<MonthlyBreakdownEntry>,
    pub monthly_suppliers: Vec<MonthlyBreakdownEntry>,
    pub warnings: Warnings,
}

impl FinancialReport {
    pub fn build(data: &AnalysisData, thresholds: &Thresholds) -> Self {
        let months = monthly_summaries(&data.monthly_stats, thresholds);

        let total_income: f64 = months.iter().map(|m| m.income).sum();
        let total_expense: f64 = months.iter().map(|m| m.expense).sum();
        let balance = total_income - total_expense;
        let average_monthly_expense = if months.is_empty() {
            0.0
        } else {
            total_expense / months.len() as f64
        };

        let warnings = Warnings::collect(&months, balance, thresholds);

        FinancialReport {
            thresholds: *thresholds,
            overview: Overview {
                total_income,
                total_expense,
                balance,
                average_monthly_expense,
            },
            categories: breakdown(&data.category_stats, BreakdownKey::Category),
            suppliers: breakdown(&data.supplier_stats, BreakdownKey::Supplier),
            monthly_categories: monthly_breakdown(
                &data.monthly_category_stats,
                BreakdownKey::Category,
            ),
            monthly_suppliers: monthly_breakdown(
                &data.monthly_supplier_stats,
                BreakdownKey::Supplier,
            ),
            months,
            warnings,
        }
    }
}

/// Yearly report over `YYYY-01-01 .. YYYY-12-31`
pub fn financial_report(conn: &Connection, year: i32, thresholds: &Thresholds) -> Result<FinancialReport> {
    let range = DateRange::year(year);
    let mut data = analysis_data(conn, &range)?;
    // A full year has up to 24 month/type rows; the screen limit of 12 would drop half
    data.monthly_stats = grouped_totals_limited(conn, Grouping::Monthly, &range, None)?;

    let report = FinancialReport::build(&data, thresholds);
    tracing::debug!(year, warnings = report.warnings.count(), "financial report built");
    Ok(report)
}

// ============================================================================
// LEDGER TABLE (12 months, zero-filled)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMonth {
    /// `YYYY-MM`
    pub month: String,
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTable {
    pub year: i32,
    pub months: Vec<LedgerMonth>,
    pub total_income: f64,
    pub total_expense: f64,
    pub total_balance: f64,
}

impl LedgerTable {
    /// Rows outside `year` are ignored
    pub fn build(year: i32, monthly_rows: &[GroupedTotal]) -> Self {
        let months: Vec<LedgerMonth> = (1..=12)
            .map(|m| {
                let key = format!("{year:04}-{m:02}");
                let (income, expense) = monthly_rows
                    .iter()
                    .filter(|row| row.month.as_deref() == Some(key.as_str()))
                    .fold((0.0, 0.0), |(income, expense), row| match row.kind {
                        TransactionType::Income => (income + row.total, expense),
                        TransactionType::Expense => (income, expense + row.total),
                    });
                LedgerMonth {
                    month: key,
                    income,
                    expense,
                    balance: income - expense,
                }
            })
            .collect();

        let total_income: f64 = months.iter().map(|m| m.income).sum();
        let total_expense: f64 = months.iter().map(|m| m.expense).sum();

        LedgerTable {
            year,
            months,
            total_income,
            total_expense,
            total_balance: total_income - total_expense,
        }
    }
}

pub fn ledger_table(conn: &Connection, year: i32) -> Result<LedgerTable> {
    let rows = grouped_totals_limited(conn, Grouping::Monthly, &DateRange::year(year), None)?;
    Ok(LedgerTable::build(year, &rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, open_in_memory};
    use rusqlite::params;

    fn setup() -> Connection {
        let conn = open_in_memory().unwrap();
        init_database(&conn).unwrap();
        conn
    }

    fn add(conn: &Connection, kind: &str, amount: f64, date: &str, category: &str, account: &str, supplier: Option<&str>) {
        conn.execute(
            "INSERT INTO transactions (type, amount, description, date, category, account, supplier)
             VALUES (?1, ?2, '', ?3, ?4, ?5, ?6)",
            params![kind, amount, date, category, account, supplier],
        )
        .unwrap();
    }

    fn row(month: &str, kind: TransactionType, total: f64) -> GroupedTotal {
        GroupedTotal {
            date: None,
            month: Some(month.to_string()),
            category: None,
            account: None,
            supplier: None,
            kind,
            total,
            count: 1,
        }
    }

    fn named(category: &str, kind: TransactionType, total: f64) -> GroupedTotal {
        GroupedTotal {
            category: Some(category.to_string()),
            month: None,
            ..row("", kind, total)
        }
    }

    fn seed(conn: &Connection) {
        add(conn, "income", 1000.0, "2024-01-05", "Sales", "现金", Some("Market"));
        add(conn, "expense", 300.0, "2024-01-10", "Food", "现金", Some("Fresh Farm"));
        add(conn, "expense", 200.0, "2024-01-20", "Food", "Bank", Some("Fresh Farm"));
        add(conn, "income", 100.0, "2024-02-01", "Sales", "Bank", None);
        add(conn, "expense", 400.0, "2024-02-03", "Rent", "Bank", Some(""));
        add(conn, "expense", 50.0, "2023-12-31", "Food", "现金", Some("Fresh Farm"));
    }

    #[test]
    fn test_summary_with_and_without_range() {
        let conn = setup();
        seed(&conn);

        let all = summary(&conn, &DateRange::default()).unwrap();
        assert_eq!(all.income, 1100.0);
        assert_eq!(all.expense, 950.0);
        assert_eq!(all.income_count, 2);
        assert_eq!(all.expense_count, 4);
        assert_eq!(all.balance, 150.0);

        let year = summary(&conn, &DateRange::year(2024)).unwrap();
        assert_eq!(year.expense, 900.0);
        assert_eq!(year.balance, 200.0);

        // One bound alone does not filter
        let half = DateRange::new(Some("2024-01-01".to_string()), None);
        assert_eq!(summary(&conn, &half).unwrap(), all);

        println!("✅ Summary test PASSED");
    }

    #[test]
    fn test_summary_empty_table() {
        let conn = setup();
        let stats = summary(&conn, &DateRange::year(2024)).unwrap();
        assert_eq!(stats, Summary::default());
    }

    #[test]
    fn test_category_grouping_skips_blank_category() {
        let conn = setup();
        seed(&conn);
        add(&conn, "expense", 9.0, "2024-01-02", "", "现金", None);

        let rows = grouped_totals(&conn, Grouping::Category, &DateRange::year(2024)).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.category.clone().unwrap()).collect();
        assert_eq!(names, vec!["Food", "Rent", "Sales"]);
        assert_eq!(rows[0].total, 500.0);
        assert_eq!(rows[0].count, 2);
        assert!(rows[0].month.is_none());
    }

    #[test]
    fn test_supplier_grouping_orders_by_total() {
        let conn = setup();
        seed(&conn);

        let rows = grouped_totals(&conn, Grouping::Supplier, &DateRange::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].supplier.as_deref(), Some("Market"));
        assert_eq!(rows[0].total, 1000.0);
        assert_eq!(rows[1].supplier.as_deref(), Some("Fresh Farm"));
        assert_eq!(rows[1].total, 550.0);
    }

    #[test]
    fn test_monthly_grouping() {
        let conn = setup();
        seed(&conn);

        let rows = grouped_totals(&conn, Grouping::Monthly, &DateRange::default()).unwrap();
        assert_eq!(rows.first().unwrap().month.as_deref(), Some("2024-02"));
        assert_eq!(rows.last().unwrap().month.as_deref(), Some("2023-12"));
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_daily_detail_defaults_to_last_30_days() {
        let conn = setup();
        conn.execute(
            "INSERT INTO transactions (type, amount, date, category, account)
             VALUES ('expense', 12, date('now'), 'Food', '现金')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transactions (type, amount, date, category, account)
             VALUES ('expense', 99, date('now', '-60 days'), 'Food', '现金')",
            [],
        )
        .unwrap();

        let recent = grouped_totals(&conn, Grouping::DailyDetail, &DateRange::default()).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].total, 12.0);
        assert!(recent[0].supplier.is_none());

        let everything = DateRange::new(Some("2000-01-01".to_string()), Some("2999-12-31".to_string()));
        let all = grouped_totals(&conn, Grouping::DailyDetail, &everything).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_every_grouping_runs() {
        let conn = setup();
        seed(&conn);
        for grouping in Grouping::ALL {
            grouped_totals(&conn, grouping, &DateRange::year(2024)).unwrap();
            grouped_totals(&conn, grouping, &DateRange::default()).unwrap();
        }
    }

    #[test]
    fn test_analysis_data_category_expense() {
        let conn = setup();
        seed(&conn);

        let data = analysis_data(&conn, &DateRange::year(2024)).unwrap();
        assert!(data
            .category_expense
            .iter()
            .all(|r| r.kind == TransactionType::Expense));
        assert_eq!(data.category_expense.len(), 2);
        assert_eq!(data.account_stats.len(), 4);

        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("categoryExpense").is_some());
        assert!(json.get("dailyDetailStats").is_some());
        assert_eq!(json["monthlyStats"][0]["month"], "2024-02");
        assert!(json["monthlyStats"][0].get("category").is_none());
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(1.0, 3.0), 33.3);
        assert_eq!(percent(2.0, 3.0), 66.7);
        assert_eq!(percent(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_monthly_summaries_alerts() {
        let t = Thresholds::default();
        let rows = vec![
            row("2024-02", TransactionType::Income, 100.0),
            row("2024-02", TransactionType::Expense, 400.0),
            row("2024-01", TransactionType::Income, 1000.0),
            row("2024-01", TransactionType::Expense, 500.0),
            row("2024-03", TransactionType::Expense, 50.0),
        ];

        let months = monthly_summaries(&rows, &t);
        let keys: Vec<_> = months.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(keys, vec!["2024-01", "2024-02", "2024-03"]);

        assert!(!months[0].expense_alert);
        assert_eq!(months[0].income_percent, 66.7);
        assert_eq!(months[0].expense_percent, 33.3);

        assert!(months[1].expense_alert);
        assert!(months[1].balance_alert);

        // No income → no expense alert, balance -50 is above -100
        assert!(!months[2].expense_alert);
        assert!(!months[2].balance_alert);
    }

    #[test]
    fn test_expense_alert_boundary() {
        let t = Thresholds::default();
        // Exactly income × 1.3 is not an alert
        assert!(!is_expense_alert(100.0, 130.0, &t));
        assert!(is_expense_alert(100.0, 130.5, &t));
        assert!(!is_expense_alert(0.0, 10.0, &t));
    }

    #[test]
    fn test_breakdown_sorting_and_blank_names() {
        let rows = vec![
            named("Food", TransactionType::Expense, 300.0),
            named("Sales", TransactionType::Income, 300.0),
            named("Rent", TransactionType::Expense, 800.0),
            named("Food", TransactionType::Income, 100.0),
            named("  ", TransactionType::Expense, 999.0),
        ];

        let entries = breakdown(&rows, BreakdownKey::Category);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Rent", "Food", "Sales"]);

        let food = &entries[1];
        assert_eq!(food.total, 400.0);
        assert_eq!(food.balance, -200.0);
        assert_eq!(food.income_percent, 25.0);
        assert_eq!(food.expense_percent, 75.0);

        assert!(breakdown(&rows, BreakdownKey::Supplier).is_empty());
    }

    #[test]
    fn test_monthly_breakdown_order() {
        let mk = |month: &str, category: &str, kind, total| GroupedTotal {
            category: Some(category.to_string()),
            ..row(month, kind, total)
        };
        let rows = vec![
            mk("2024-02", "Food", TransactionType::Expense, 10.0),
            mk("2024-01", "Food", TransactionType::Expense, 10.0),
            mk("2024-01", "Rent", TransactionType::Expense, 50.0),
            mk("2024-01", "Rent", TransactionType::Income, 5.0),
        ];

        let entries = monthly_breakdown(&rows, BreakdownKey::Category);
        let order: Vec<_> = entries
            .iter()
            .map(|e| (e.month.as_str(), e.name.as_str()))
            .collect();
        assert_eq!(order, vec![("2024-01", "Rent"), ("2024-01", "Food"), ("2024-02", "Food")]);
        assert_eq!(entries[0].total, 55.0);
        assert_eq!(entries[0].balance, -45.0);
    }

    #[test]
    fn test_financial_report_build() {
        let t = Thresholds::default();
        let data = AnalysisData {
            monthly_stats: vec![
                row("2024-01", TransactionType::Income, 100.0),
                row("2024-01", TransactionType::Expense, 250.0),
                row("2024-02", TransactionType::Expense, 1000.0),
            ],
            ..AnalysisData::default()
        };

        let report = FinancialReport::build(&data, &t);
        assert_eq!(report.overview.total_income, 100.0);
        assert_eq!(report.overview.total_expense, 1250.0);
        assert_eq!(report.overview.balance, -1150.0);
        assert_eq!(report.overview.average_monthly_expense, 625.0);

        let w = &report.warnings;
        assert_eq!(w.expense_alerts.len(), 1);
        assert_eq!(w.expense_alerts[0].month, "2024-01");
        assert_eq!(w.expense_alerts[0].excess_percent, 150.0);
        assert_eq!(w.balance_alerts.len(), 2);
        assert!(w.year.is_some());
        assert_eq!(w.count(), 4);

        println!("✅ Financial report test PASSED: {} warnings", w.count());
    }

    #[test]
    fn test_financial_report_empty_year() {
        let report = FinancialReport::build(&AnalysisData::default(), &Thresholds::default());
        assert_eq!(report.overview, Overview::default());
        assert!(report.months.is_empty());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_financial_report_from_database() {
        let conn = setup();
        for month in 1..=12 {
            add(&conn, "income", 100.0, &format!("2024-{month:02}-01"), "Sales", "现金", None);
            add(&conn, "expense", 60.0, &format!("2024-{month:02}-02"), "Food", "现金", Some("Fresh Farm"));
        }

        let report = financial_report(&conn, 2024, &Thresholds::default()).unwrap();
        assert_eq!(report.months.len(), 12);
        assert_eq!(report.overview.total_income, 1200.0);
        assert_eq!(report.overview.average_monthly_expense, 60.0);
        assert_eq!(report.suppliers.len(), 1);
        assert_eq!(report.monthly_categories.len(), 24);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_ledger_table_zero_fills() {
        let rows = vec![
            row("2024-03", TransactionType::Income, 500.0),
            row("2024-03", TransactionType::Expense, 200.0),
            row("2024-11", TransactionType::Expense, 100.0),
            row("2023-03", TransactionType::Income, 999.0),
        ];

        let table = LedgerTable::build(2024, &rows);
        assert_eq!(table.months.len(), 12);
        assert_eq!(table.months[0].month, "2024-01");
        assert_eq!(table.months[0].income, 0.0);
        assert_eq!(table.months[2].balance, 300.0);
        assert_eq!(table.months[10].balance, -100.0);
        assert_eq!(table.total_income, 500.0);
        assert_eq!(table.total_expense, 300.0);
        assert_eq!(table.total_balance, 200.0);
    }

    #[test]
    fn test_ledger_table_from_database() {
        let conn = setup();
        seed(&conn);

        let table = ledger_table(&conn, 2024).unwrap();
        assert_eq!(table.months[0].income, 1000.0);
        assert_eq!(table.months[0].expense, 500.0);
        assert_eq!(table.months[1].balance, -300.0);
        assert_eq!(table.total_balance, 200.0);
    }

    #[test]
    fn test_thresholds_default() {
        let t = Thresholds::default();
        assert_eq!(t.expense_threshold, 0.3);
        assert_eq!(t.balance_threshold, -100.0);
        assert_eq!(t.year_balance_threshold, -1000.0);
    }
}
