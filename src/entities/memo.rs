// 📝 Memo Entity - notes with comma-separated tags
//
// priority doubles as a verdict: 0 = correct, 1 = wrong.
// Tags are stored as one normalised string ("a,b,c"); the tag filter goes
// through FIND_IN_SET so a tag matches in any list position.

use crate::db::{execute, prepare_translated};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const PRIORITY_CORRECT: i64 = 0;
pub const PRIORITY_WRONG: i64 = 1;

static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern must compile"));

// ============================================================================
// MEMO
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: i64,
    pub title: String,
    pub content: String,
    /// Comma-joined, no spaces around names
    pub tags: String,
    /// Deprecated; always null
    pub color: Option<String>,
    pub priority: i64,
    pub memo_date: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Memo {
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// Tags arrive either as a JSON array or as a comma-separated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagsInput {
    List(Vec<String>),
    Text(String),
}

/// Trim each tag, drop empty ones, join with `,`
pub fn normalize_tags(input: &TagsInput) -> String {
    let parts: Vec<&str> = match input {
        TagsInput::List(tags) => tags.iter().map(|t| t.trim()).collect(),
        TagsInput::Text(text) => text.split(',').map(str::trim).collect(),
    };
    parts
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Coerce a user-supplied date into `YYYY-MM-DD`, falling back to `today`
pub fn normalize_memo_date(raw: Option<&str>, today: NaiveDate) -> String {
    let fallback = || today.format("%Y-%m-%d").to_string();
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return fallback();
    };

    if let Some((date_part, _)) = raw.split_once('T') {
        if ISO_DATE.is_match(date_part) {
            return date_part.to_string();
        }
    }
    if ISO_DATE.is_match(raw) {
        return raw.to_string();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    for layout in ["%Y/%m/%d", "%Y.%m.%d", "%Y-%m-%-d", "%Y/%-m/%-d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
            return date.format("%Y-%m-%d").to_string();
        }
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return dt.date().format("%Y-%m-%d").to_string();
        }
    }

    tracing::debug!("unparseable memo date '{}', using today", raw);
    fallback()
}

// ============================================================================
// FILTER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoFilter {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub priority: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

const SORT_FIELDS: [&str; 5] = ["memo_date", "created_at", "updated_at", "priority", "title"];

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl MemoFilter {
    /// Unknown sort fields fall back to priority; direction is DESC unless `asc`
    pub fn order_clause(&self) -> String {
        let field = self
            .sort_by
            .as_deref()
            .filter(|f| SORT_FIELDS.contains(f))
            .unwrap_or("priority");
        let direction = if self.sort_order.as_deref() == Some("asc") {
            "ASC"
        } else {
            "DESC"
        };

        if field == "priority" {
            format!("ORDER BY priority {direction}, created_at DESC")
        } else {
            format!("ORDER BY {field} {direction}")
        }
    }

    /// MySQL-flavoured query plus its parameters; placeholders are numbered
    /// because the FIND_IN_SET rewrite reorders arguments
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        let mut sql = String::from(
            "SELECT id, title, content, tags, color, priority, memo_date, created_at, updated_at
             FROM memos WHERE 1=1",
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(search) = non_blank(&self.search) {
            values.push(Value::Text(format!("%{}%", escape_like(search))));
            let n = values.len();
            sql.push_str(&format!(
                " AND (title LIKE ?{n} ESCAPE '\\' OR content LIKE ?{n} ESCAPE '\\')"
            ));
        }
        if let Some(tag) = non_blank(&self.tag) {
            values.push(Value::Text(tag.to_string()));
            sql.push_str(&format!(" AND FIND_IN_SET(?{}, tags) > 0", values.len()));
        }
        if let Some(priority) = self.priority {
            values.push(Value::Integer(priority));
            sql.push_str(&format!(" AND priority = ?{}", values.len()));
        }
        if let Some(start) = non_blank(&self.start_date) {
            values.push(Value::Text(start.to_string()));
            sql.push_str(&format!(" AND memo_date >= ?{}", values.len()));
        }
        if let Some(end) = non_blank(&self.end_date) {
            values.push(Value::Text(end.to_string()));
            sql.push_str(&format!(" AND memo_date <= ?{}", values.len()));
        }

        sql.push(' ');
        sql.push_str(&self.order_clause());
        (sql, values)
    }
}

// ============================================================================
// STORAGE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewMemo {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Option<TagsInput>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub memo_date: Option<String>,
}

/// Validate, normalise, insert; returns the new id
pub fn insert_memo(conn: &Connection, memo: NewMemo, today: NaiveDate) -> Result<i64> {
    let title = memo.title.trim();
    if title.is_empty() {
        return Err(LedgerError::validation("title must not be empty"));
    }
    let content = memo.content.trim();
    if content.is_empty() {
        return Err(LedgerError::validation("content must not be empty"));
    }

    let tags = memo.tags.as_ref().map(normalize_tags).unwrap_or_default();
    let memo_date = normalize_memo_date(memo.memo_date.as_deref(), today);
    let priority = memo.priority.unwrap_or(PRIORITY_CORRECT);

    let outcome = execute(
        conn,
        "INSERT INTO memos (title, content, tags, color, priority, memo_date)
         VALUES (?1, ?2, ?3, NULL, ?4, ?5)",
        params![title, content, tags, priority, memo_date],
    )?;

    Ok(outcome.insert_id.unwrap_or_else(|| conn.last_insert_rowid()))
}

pub fn list_memos(conn: &Connection, filter: &MemoFilter) -> Result<Vec<Memo>> {
    let (sql, values) = filter.to_sql();
    let mut stmt = prepare_translated(conn, &sql)?;

    let memos = stmt
        .query_map(params_from_iter(values.iter()), |row| {
            Ok(Memo {
                id: row.get(0)?,
                title: row.get(1)?,
                content: row.get(2)?,
                tags: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                color: row.get(4)?,
                priority: row.get::<_, Option<i64>>(5)?.unwrap_or(PRIORITY_CORRECT),
                memo_date: row.get(6)?,
                created_at: row.get(7)?,
                updated_at: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(memos)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoStats {
    pub total: i64,
    pub correct: i64,
    pub wrong: i64,
}

pub fn memo_stats(conn: &Connection) -> Result<MemoStats> {
    let stats = conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN priority = ?1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN priority = ?2 THEN 1 ELSE 0 END), 0)
         FROM memos",
        params![PRIORITY_CORRECT, PRIORITY_WRONG],
        |row| {
            Ok(MemoStats {
                total: row.get(0)?,
                correct: row.get(1)?,
                wrong: row.get(2)?,
            })
        },
    )?;
    Ok(stats)
}

/// Unique tags across memos, in first-seen order
pub fn distinct_tags(memos: &[Memo]) -> Vec<String> {
    let mut seen = HashSet::new();
    memos
        .iter()
        .flat_map(|m| m.tag_list())
        .filter(|tag| seen.insert(*tag))
        .map(str::to_string)
        .collect()
}

// ============================================================================
// PRESENTATION
// ============================================================================

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// HTML-escape `content` and wrap every case-insensitive occurrence of a tag
/// in `<mark class="memo-tag">`. One left-to-right pass, longest tag first,
/// so inserted markup is never matched again.
pub fn highlight_tags<S: AsRef<str>>(content: &str, tags: &[S]) -> String {
    let mut unique: Vec<&str> = Vec::new();
    for tag in tags.iter().map(|t| t.as_ref().trim()) {
        if !tag.is_empty() && !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    if unique.is_empty() {
        return escape_html(content);
    }
    unique.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));

    let alternation = unique
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let Ok(pattern) = Regex::new(&format!("(?i){alternation}")) else {
        return escape_html(content);
    };

    let mut out = String::with_capacity(content.len() + 32);
    let mut last = 0;
    for m in pattern.find_iter(content) {
        out.push_str(&escape_html(&content[last..m.start()]));
        out.push_str("<mark class=\"memo-tag\">");
        out.push_str(&escape_html(m.as_str()));
        out.push_str("</mark>");
        last = m.end();
    }
    out.push_str(&escape_html(&content[last..]));
    out
}

/// Tag chip shown next to a memo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagChip {
    pub name: String,
    pub color: String,
}

/// Memo as rendered by list views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoView {
    #[serde(flatten)]
    pub memo: Memo,
    pub tag_chips: Vec<TagChip>,
    pub highlighted_content: String,
}

impl MemoView {
    pub fn build(memo: Memo, palette: &HashMap<String, String>) -> Self {
        let tags = memo.tag_list();
        let tag_chips = tags
            .iter()
            .map(|name| TagChip {
                name: name.to_string(),
                color: crate::entities::tag::color_for(palette, name).to_string(),
            })
            .collect();
        let highlighted_content = highlight_tags(&memo.content, &tags);

        MemoView {
            memo,
            tag_chips,
            highlighted_content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, open_in_memory};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn setup() -> Connection {
        let conn = open_in_memory().unwrap();
        init_database(&conn).unwrap();
        conn
    }

    fn memo(title: &str, content: &str, tags: &str, priority: i64, date: &str) -> NewMemo {
        NewMemo {
            title: title.to_string(),
            content: content.to_string(),
            tags: Some(TagsInput::Text(tags.to_string())),
            priority: Some(priority),
            memo_date: Some(date.to_string()),
        }
    }

    fn seed(conn: &Connection) {
        insert_memo(conn, memo("Supplier price", "Farm raised prices", "work, price", 1, "2024-06-01"), today()).unwrap();
        insert_memo(conn, memo("Menu", "New 100% organic menu", "home", 0, "2024-06-10"), today()).unwrap();
        insert_memo(conn, memo("Audit", "Check price list", "audit,work", 0, "2024-05-20"), today()).unwrap();
    }

    #[test]
    fn test_normalize_tags() {
        assert_eq!(normalize_tags(&TagsInput::Text(" a , ,b ,, c".into())), "a,b,c");
        assert_eq!(
            normalize_tags(&TagsInput::List(vec![" x ".into(), "".into(), "y".into()])),
            "x,y"
        );
        assert_eq!(normalize_tags(&TagsInput::Text("".into())), "");
    }

    #[test]
    fn test_tags_input_from_json() {
        let list: TagsInput = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(list, TagsInput::List(vec!["a".into(), "b".into()]));
        let text: TagsInput = serde_json::from_str(r#""a,b""#).unwrap();
        assert_eq!(text, TagsInput::Text("a,b".into()));
    }

    #[test]
    fn test_normalize_memo_date() {
        assert_eq!(normalize_memo_date(Some("2024-03-05T10:00:00.000Z"), today()), "2024-03-05");
        assert_eq!(normalize_memo_date(Some("2024-03-05"), today()), "2024-03-05");
        assert_eq!(normalize_memo_date(Some("2024/3/5"), today()), "2024-03-05");
        assert_eq!(normalize_memo_date(Some("2024-03-05 08:30:00"), today()), "2024-03-05");
        assert_eq!(normalize_memo_date(Some("next tuesday"), today()), "2024-06-15");
        // A capital T inside free text is not a timestamp separator
        assert_eq!(normalize_memo_date(Some("Next Tuesday"), today()), "2024-06-15");
        assert_eq!(normalize_memo_date(Some("2024-03-05T10:00"), today()), "2024-03-05");
        assert_eq!(normalize_memo_date(Some("  "), today()), "2024-06-15");
        assert_eq!(normalize_memo_date(None, today()), "2024-06-15");
    }

    #[test]
    fn test_insert_validation() {
        let conn = setup();
        assert!(insert_memo(&conn, memo(" ", "body", "", 0, ""), today()).is_err());
        assert!(insert_memo(&conn, memo("title", "\n", "", 0, ""), today()).is_err());

        let id = insert_memo(&conn, memo(" Title ", " Body ", " a ,b", 0, ""), today()).unwrap();
        let memos = list_memos(&conn, &MemoFilter::default()).unwrap();
        assert_eq!(memos[0].id, id);
        assert_eq!(memos[0].title, "Title");
        assert_eq!(memos[0].tags, "a,b");
        assert_eq!(memos[0].memo_date.as_deref(), Some("2024-06-15"));
        assert!(memos[0].color.is_none());
    }

    #[test]
    fn test_tag_filter_matches_any_position() {
        let conn = setup();
        seed(&conn);

        let filter = MemoFilter {
            tag: Some("work".into()),
            sort_by: Some("title".into()),
            sort_order: Some("asc".into()),
            ..MemoFilter::default()
        };
        let titles: Vec<_> = list_memos(&conn, &filter)
            .unwrap()
            .into_iter()
            .map(|m| m.title)
            .collect();
        // first position in one memo, last position in the other
        assert_eq!(titles, vec!["Audit", "Supplier price"]);

        let filter = MemoFilter {
            tag: Some("wor".into()),
            ..MemoFilter::default()
        };
        assert!(list_memos(&conn, &filter).unwrap().is_empty());
    }

    #[test]
    fn test_search_escapes_like_wildcards() {
        let conn = setup();
        seed(&conn);

        let percent = MemoFilter {
            search: Some("100%".into()),
            ..MemoFilter::default()
        };
        assert_eq!(list_memos(&conn, &percent).unwrap().len(), 1);

        let underscore = MemoFilter {
            search: Some("_".into()),
            ..MemoFilter::default()
        };
        assert!(list_memos(&conn, &underscore).unwrap().is_empty());

        let word = MemoFilter {
            search: Some("price".into()),
            ..MemoFilter::default()
        };
        assert_eq!(list_memos(&conn, &word).unwrap().len(), 2);
    }

    #[test]
    fn test_combined_filters() {
        let conn = setup();
        seed(&conn);

        let filter = MemoFilter {
            search: Some("price".into()),
            tag: Some("work".into()),
            priority: Some(0),
            start_date: Some("2024-05-01".into()),
            end_date: Some("2024-05-31".into()),
            ..MemoFilter::default()
        };
        let memos = list_memos(&conn, &filter).unwrap();
        assert_eq!(memos.len(), 1);
        assert_eq!(memos[0].title, "Audit");
    }

    #[test]
    fn test_default_sort_is_priority_desc() {
        let conn = setup();
        seed(&conn);

        let memos = list_memos(&conn, &MemoFilter::default()).unwrap();
        assert_eq!(memos[0].priority, PRIORITY_WRONG);

        let bogus = MemoFilter {
            sort_by: Some("title; DROP TABLE memos".into()),
            ..MemoFilter::default()
        };
        assert_eq!(bogus.order_clause(), "ORDER BY priority DESC, created_at DESC");

        let by_date = MemoFilter {
            sort_by: Some("memo_date".into()),
            ..MemoFilter::default()
        };
        let memos = list_memos(&conn, &by_date).unwrap();
        assert_eq!(memos[0].title, "Menu");
    }

    #[test]
    fn test_memo_stats() {
        let conn = setup();
        assert_eq!(memo_stats(&conn).unwrap(), MemoStats::default());

        seed(&conn);
        let stats = memo_stats(&conn).unwrap();
        assert_eq!(stats, MemoStats { total: 3, correct: 2, wrong: 1 });
    }

    #[test]
    fn test_distinct_tags() {
        let conn = setup();
        seed(&conn);
        let memos = list_memos(
            &conn,
            &MemoFilter {
                sort_by: Some("memo_date".into()),
                sort_order: Some("asc".into()),
                ..MemoFilter::default()
            },
        )
        .unwrap();
        assert_eq!(distinct_tags(&memos), vec!["audit", "work", "price", "home"]);
    }

    #[test]
    fn test_highlight_escapes_and_single_pass() {
        let html = highlight_tags("<b>Mark</b> & mark it", &["mark"]);
        assert_eq!(
            html,
            "&lt;b&gt;<mark class=\"memo-tag\">Mark</mark>&lt;/b&gt; &amp; <mark class=\"memo-tag\">mark</mark> it"
        );

        // "memo-tag" must not match inside the inserted markup
        let html = highlight_tags("memo tag", &["memo", "tag", "class"]);
        assert_eq!(
            html,
            "<mark class=\"memo-tag\">memo</mark> <mark class=\"memo-tag\">tag</mark>"
        );
    }

    #[test]
    fn test_highlight_prefers_longest_tag() {
        let html = highlight_tags("price list", &["price", "price list"]);
        assert_eq!(html, "<mark class=\"memo-tag\">price list</mark>");

        let untouched = highlight_tags("a.b", &["."]);
        assert_eq!(untouched, "a<mark class=\"memo-tag\">.</mark>b");

        let none: [&str; 0] = [];
        assert_eq!(highlight_tags("1 < 2", &none), "1 &lt; 2");
    }

    #[test]
    fn test_memo_view() {
        let memo = Memo {
            id: 1,
            title: "t".into(),
            content: "call Farm".into(),
            tags: "farm,vip".into(),
            color: None,
            priority: 0,
            memo_date: None,
            created_at: None,
            updated_at: None,
        };
        let mut palette = HashMap::new();
        palette.insert("vip".to_string(), "#ff4d4f".to_string());

        let view = MemoView::build(memo, &palette);
        assert_eq!(view.tag_chips[0].color, "#1890ff");
        assert_eq!(view.tag_chips[1].color, "#ff4d4f");
        assert_eq!(view.highlighted_content, "call <mark class=\"memo-tag\">Farm</mark>");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["title"], "t");
        assert!(json.get("highlightedContent").is_some());
    }
}
