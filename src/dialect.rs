// 🔀 SQL Dialect Shim - MySQL → SQLite
// The schema files and a few queries are written for MySQL; SQLite runs them.
//
// Rules as data: every rewrite is a (pattern, replacement) pair applied in order.
// There is no SQL parser here. The rules cover the constructs this project uses:
// - DDL: AUTO_INCREMENT, ENUM, TINYINT(1), COMMENT, COLLATE, table options, KEY/INDEX
// - DML: ON DUPLICATE KEY UPDATE, INSERT IGNORE
// - Expressions: CURDATE(), NOW(), DATE_SUB/DATE_ADD, DATE_FORMAT, FIND_IN_SET

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// REWRITE RULE
// ============================================================================

/// One regex rewrite step
pub struct RewriteRule {
    /// Short name, used in debug logs
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl RewriteRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        RewriteRule {
            name,
            pattern: Regex::new(pattern).expect("rewrite pattern must compile"),
            replacement,
        }
    }

    /// Apply this rule to every match in `sql`
    pub fn apply(&self, sql: &str) -> String {
        self.pattern.replace_all(sql, self.replacement).into_owned()
    }
}

/// DDL cleanup, applied in order. Order matters: column-level COLLATE goes
/// before table options, UNIQUE KEY before plain KEY.
static DDL_RULES: Lazy<Vec<RewriteRule>> = Lazy::new(|| {
    vec![
        RewriteRule::new("create_database", r"(?is)CREATE\s+DATABASE[^;]+;", ""),
        RewriteRule::new("use_database", r"(?im)^[ \t]*USE\s+[^;]+;", ""),
        RewriteRule::new("column_collate", r"(?i)\s+COLLATE\s+[^\s,)=]+", ""),
        RewriteRule::new(
            "auto_increment_pk",
            r"(?i)(\w+)\s+INT\s+AUTO_INCREMENT\s+PRIMARY\s+KEY",
            "${1} INTEGER PRIMARY KEY AUTOINCREMENT",
        ),
        RewriteRule::new("int_auto_increment", r"(?i)\bINT\s+AUTO_INCREMENT\b", "INTEGER"),
        RewriteRule::new("auto_increment", r"(?i)\bAUTO_INCREMENT\b", "AUTOINCREMENT"),
        RewriteRule::new(
            "timestamp_default",
            r"(?i)\bTIMESTAMP\s+DEFAULT\s+CURRENT_TIMESTAMP\b",
            "DATETIME DEFAULT CURRENT_TIMESTAMP",
        ),
        RewriteRule::new("on_update", r"(?i)\s+ON\s+UPDATE\s+CURRENT_TIMESTAMP\b", ""),
        RewriteRule::new("engine", r"(?i)\bENGINE\s*=\s*\w+", ""),
        RewriteRule::new("default_charset", r"(?i)\bDEFAULT\s+CHARSET\s*=\s*\w+", ""),
        RewriteRule::new("character_set", r"(?i)\bCHARACTER\s+SET\s+\w+", ""),
        RewriteRule::new(
            "table_options",
            r"(?i)\)[ \t]*(?:(?:DEFAULT\s+)?CHARSET|(?:DEFAULT\s+)?COLLATE|AUTOINCREMENT|COMMENT)\s*=[^;]*",
            ")",
        ),
        RewriteRule::new("enum", r"(?i)\bENUM\s*\([^)]+\)", "TEXT"),
        RewriteRule::new("tinyint_bool", r"(?i)\bTINYINT\(1\)", "INTEGER"),
        RewriteRule::new("column_comment", r#"(?i)\s+COMMENT\s+(?:'[^']*'|"[^"]*")"#, ""),
        RewriteRule::new(
            "unique_key",
            r"(?i)\bUNIQUE\s+(?:KEY|INDEX)\s*(?:\w+\s*)?\(([^)]+)\)",
            "UNIQUE(${1})",
        ),
        RewriteRule::new("inline_index", r"(?i),\s*(?:INDEX|KEY)\s+\w+\s*\([^)]+\)", ""),
        RewriteRule::new("double_comma", r",\s*,", ","),
        RewriteRule::new("comma_before_paren", r",\s*\)", ")"),
        RewriteRule::new("comma_after_paren", r"\(\s*,", "("),
        RewriteRule::new("spaces", r"[ \t]+", " "),
        RewriteRule::new("blank_lines", r"\n\s*\n", "\n"),
    ]
});

/// Function-level rewrites; safe on any statement kind
static EXPRESSION_RULES: Lazy<Vec<RewriteRule>> = Lazy::new(|| {
    vec![
        RewriteRule::new(
            "date_sub_days",
            r"(?i)\bDATE_SUB\(\s*CURDATE\(\)\s*,\s*INTERVAL\s+(\d+)\s+DAY\s*\)",
            "date('now', '-${1} days')",
        ),
        RewriteRule::new(
            "date_add_days",
            r"(?i)\bDATE_ADD\(\s*CURDATE\(\)\s*,\s*INTERVAL\s+(\d+)\s+DAY\s*\)",
            "date('now', '+${1} days')",
        ),
        RewriteRule::new("curdate", r"(?i)\bCURDATE\(\)", "date('now')"),
        RewriteRule::new("now", r"(?i)\bNOW\(\)", "datetime('now')"),
        RewriteRule::new(
            "date_format",
            r"(?i)\bDATE_FORMAT\(\s*([^,()]+?)\s*,\s*('[^']*')\s*\)",
            "strftime(${2}, ${1})",
        ),
        // Arguments swap places: bind with numbered placeholders when both are `?`
        RewriteRule::new(
            "find_in_set",
            r"(?i)\bFIND_IN_SET\(\s*([^,()]+?)\s*,\s*([^,()]+?)\s*\)",
            "instr(',' || ${2} || ',', ',' || ${1} || ',')",
        ),
        RewriteRule::new("insert_ignore", r"(?i)\bINSERT\s+IGNORE\b", "INSERT OR IGNORE"),
    ]
});

static UPSERT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*INSERT\s+(?:INTO\s+)?(\w+)\s*\(([^)]+)\)\s*VALUES\s*(\(.+?\))\s*ON\s+DUPLICATE\s+KEY\s+UPDATE\s+(.+?)\s*;?\s*$",
    )
    .expect("upsert pattern must compile")
});

// ============================================================================
// STATEMENT KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    /// DDL, PRAGMA, and anything else
    Other,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Other => "OTHER",
        }
    }
}

/// Classify a statement by its leading keyword
pub fn classify(sql: &str) -> StatementKind {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    match keyword.as_str() {
        "SELECT" | "WITH" => StatementKind::Select,
        "INSERT" | "REPLACE" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        _ => StatementKind::Other,
    }
}

// ============================================================================
// TRANSLATION
// ============================================================================

/// Translate a whole MySQL script (usually DDL) into SQLite.
///
/// Statements in the result are separated by `;\n`. Running the translation
/// on its own output returns the same text.
pub fn mysql_to_sqlite(sql: &str) -> String {
    // Comment lines go first so their contents never reach the rules
    let mut converted = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    for rule in DDL_RULES.iter() {
        converted = rule.apply(&converted);
    }
    converted = translate_expressions(converted.trim());

    split_statements(&converted)
        .into_iter()
        .map(|statement| rewrite_upsert(&statement))
        .collect::<Vec<_>>()
        .join(";\n")
}

/// Rewrite MySQL-only functions into SQLite equivalents
pub fn translate_expressions(sql: &str) -> String {
    let mut converted = sql.to_string();
    for rule in EXPRESSION_RULES.iter() {
        let next = rule.apply(&converted);
        if next != converted {
            tracing::trace!(rule = rule.name, "expression rewrite applied");
        }
        converted = next;
    }
    converted
}

/// Translate a single statement according to its kind.
///
/// Queries and plain writes keep their text apart from function rewrites.
/// Inserts additionally get the upsert rewrite. Everything else gets the
/// full DDL translation.
pub fn translate_statement(sql: &str) -> String {
    match classify(sql) {
        StatementKind::Select | StatementKind::Update | StatementKind::Delete => {
            translate_expressions(sql)
        }
        StatementKind::Insert => rewrite_upsert(&translate_expressions(sql)),
        StatementKind::Other => mysql_to_sqlite(sql),
    }
}

/// `INSERT ... ON DUPLICATE KEY UPDATE a = VALUES(a)` →
/// `INSERT ... ON CONFLICT(<first column>) DO UPDATE SET a=excluded.a`
///
/// The conflict target is the first listed column; schemas in this project
/// put their unique key first.
pub fn rewrite_upsert(sql: &str) -> String {
    let Some(caps) = UPSERT.captures(sql) else {
        return sql.to_string();
    };

    let table = &caps[1];
    let columns = caps[2].trim();
    let values = &caps[3];
    let conflict_column = columns.split(',').next().unwrap_or_default().trim();

    let set_clause = caps[4]
        .split(',')
        .map(str::trim)
        .filter(|assignment| !assignment.is_empty())
        .filter_map(|assignment| assignment.split('=').next())
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| format!("{field}=excluded.{field}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {table} ({columns}) VALUES {values} ON CONFLICT({conflict_column}) DO UPDATE SET {set_clause}"
    )
}

/// Split a script on `;`, ignoring semicolons inside quoted strings.
/// Empty statements are dropped and each statement is trimmed.
pub fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(_), '\\') => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (Some(q), _) if c == q => {
                quote = None;
                current.push(c);
            }
            (None, '\'' | '"' | '`') => {
                quote = Some(c);
                current.push(c);
            }
            (None, ';') => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    statements.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSACTIONS_DDL: &str = "
-- ledger table
CREATE DATABASE IF NOT EXISTS dish_accounting CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci;
USE dish_accounting;
CREATE TABLE IF NOT EXISTS transactions (
  id INT AUTO_INCREMENT PRIMARY KEY,
  type ENUM('income', 'expense') NOT NULL COMMENT 'income or expense',
  amount DECIMAL(10, 2) NOT NULL,
  description VARCHAR(255) DEFAULT '' COMMENT 'free text',
  created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
  updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP,
  INDEX idx_date (created_at)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci COMMENT='ledger';
";

    #[test]
    fn test_create_table_translation() {
        let sql = mysql_to_sqlite(TRANSACTIONS_DDL);

        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS transactions"));
        assert!(sql.contains("id INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.contains("type TEXT NOT NULL,"));
        assert!(sql.contains("description VARCHAR(255) DEFAULT '',"));
        assert!(sql.contains("created_at DATETIME DEFAULT CURRENT_TIMESTAMP,"));
        assert!(sql.contains("updated_at DATETIME DEFAULT CURRENT_TIMESTAMP\n)"));

        for leftover in ["ENGINE", "CHARSET", "COLLATE", "COMMENT", "INDEX", "USE ", "DATABASE", "--"] {
            assert!(!sql.contains(leftover), "{leftover} survived: {sql}");
        }
    }

    #[test]
    fn test_translated_ddl_runs_on_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for statement in split_statements(&mysql_to_sqlite(TRANSACTIONS_DDL)) {
            conn.execute_batch(&statement).unwrap();
        }

        conn.execute(
            "INSERT INTO transactions (type, amount) VALUES ('income', 10.5)",
            [],
        )
        .unwrap();
        let id: i64 = conn
            .query_row("SELECT id FROM transactions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_translation_is_idempotent() {
        let once = mysql_to_sqlite(TRANSACTIONS_DDL);
        let twice = mysql_to_sqlite(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_use_only_removed_as_statement() {
        let sql = "CREATE TABLE users (default_user INT, cause TEXT);";
        let converted = mysql_to_sqlite(sql);
        assert_eq!(converted, "CREATE TABLE users (default_user INT, cause TEXT)");
    }

    #[test]
    fn test_unique_key_and_plain_key() {
        let sql = "CREATE TABLE tags (
  id INT AUTO_INCREMENT PRIMARY KEY,
  name VARCHAR(50) NOT NULL,
  UNIQUE KEY uk_tag_name (name),
  KEY idx_name (name)
)";
        let converted = mysql_to_sqlite(sql);
        assert!(converted.contains("UNIQUE(name)"));
        assert!(!converted.contains("idx_name"));
        assert!(converted.ends_with("UNIQUE(name)\n)"));
    }

    #[test]
    fn test_tinyint_bool_and_plain_tinyint() {
        let converted = mysql_to_sqlite("CREATE TABLE a (flag TINYINT(1) DEFAULT 0, level TINYINT DEFAULT 0)");
        assert!(converted.contains("flag INTEGER DEFAULT 0"));
        assert!(converted.contains("level TINYINT DEFAULT 0"));
    }

    #[test]
    fn test_upsert_rewrite() {
        let sql = "INSERT INTO colors (name, hex, sort_order) VALUES ('Blue', '#1890FF', 1) \
                   ON DUPLICATE KEY UPDATE hex = VALUES(hex), sort_order = VALUES(sort_order)";
        let converted = translate_statement(sql);
        assert_eq!(
            converted,
            "INSERT INTO colors (name, hex, sort_order) VALUES ('Blue', '#1890FF', 1) \
             ON CONFLICT(name) DO UPDATE SET hex=excluded.hex, sort_order=excluded.sort_order"
        );
    }

    #[test]
    fn test_upsert_per_statement_in_script() {
        let script = "CREATE TABLE colors (name VARCHAR(20) NOT NULL, hex VARCHAR(7), UNIQUE KEY uk (name));
INSERT INTO colors (name, hex) VALUES ('A', '#000000') ON DUPLICATE KEY UPDATE hex = VALUES(hex);
INSERT INTO colors (name, hex) VALUES ('A', '#FFFFFF') ON DUPLICATE KEY UPDATE hex = VALUES(hex);";

        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for statement in split_statements(&mysql_to_sqlite(script)) {
            conn.execute_batch(&statement).unwrap();
        }

        let (count, hex): (i64, String) = conn
            .query_row("SELECT COUNT(*), MAX(hex) FROM colors", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(hex, "#FFFFFF");
    }

    #[test]
    fn test_expression_rewrites() {
        let sql = "SELECT * FROM transactions WHERE date >= DATE_SUB(CURDATE(), INTERVAL 30 DAY)";
        assert_eq!(
            translate_statement(sql),
            "SELECT * FROM transactions WHERE date >= date('now', '-30 days')"
        );

        let sql = "SELECT DATE_FORMAT(date, '%Y-%m') AS month FROM transactions";
        assert_eq!(
            translate_statement(sql),
            "SELECT strftime('%Y-%m', date) AS month FROM transactions"
        );

        let sql = "UPDATE memos SET updated_at = NOW() WHERE id = ?";
        assert_eq!(
            translate_statement(sql),
            "UPDATE memos SET updated_at = datetime('now') WHERE id = ?"
        );

        assert_eq!(
            translate_statement("INSERT IGNORE INTO tags (name) VALUES (?)"),
            "INSERT OR IGNORE INTO tags (name) VALUES (?)"
        );
    }

    #[test]
    fn test_find_in_set_matches_every_position() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let sql = translate_statement("SELECT FIND_IN_SET(?1, ?2) > 0");

        for (tags, expected) in [
            ("work", true),
            ("work,home", true),
            ("home,work", true),
            ("a,work,b", true),
            ("homework", false),
            ("", false),
        ] {
            let found: bool = conn
                .query_row(&sql, rusqlite::params!["work", tags], |row| row.get(0))
                .unwrap();
            assert_eq!(found, expected, "tags = {tags:?}");
        }
    }

    #[test]
    fn test_select_keeps_mysql_ddl_words() {
        // Only expression rules touch queries
        let sql = "SELECT name FROM categories WHERE name = 'INT AUTO_INCREMENT'";
        assert_eq!(translate_statement(sql), sql);
    }

    #[test]
    fn test_split_statements_respects_quotes() {
        let statements = split_statements(
            "INSERT INTO memos (title) VALUES ('a;b');\n\nINSERT INTO memos (title) VALUES (\"c;d\");;  ",
        );
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "INSERT INTO memos (title) VALUES ('a;b')");
        assert_eq!(statements[1], "INSERT INTO memos (title) VALUES (\"c;d\")");

        let escaped = split_statements(r"SELECT 'it\'s; fine'; SELECT 2");
        assert_eq!(escaped.len(), 2);
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify("  select 1"), StatementKind::Select);
        assert_eq!(classify("WITH x AS (SELECT 1) SELECT * FROM x"), StatementKind::Select);
        assert_eq!(classify("insert into t values (1)"), StatementKind::Insert);
        assert_eq!(classify("Update t SET a = 1"), StatementKind::Update);
        assert_eq!(classify("DELETE FROM t"), StatementKind::Delete);
        assert_eq!(classify("CREATE TABLE t (a INT)"), StatementKind::Other);
        assert_eq!(classify(""), StatementKind::Other);
    }
}
