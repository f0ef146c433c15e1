// 🏷️ Tag Palette - colours for memo tag chips
use crate::error::{LedgerError, Result};
use rusqlite::{params, Connection, ErrorCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_TAG_COLOR: &str = "#1890ff";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub sort_order: i64,
}

/// Palette order: sort_order, then id
pub fn list_tags(conn: &Connection) -> Result<Vec<Tag>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, color, sort_order FROM tags ORDER BY sort_order ASC, id ASC",
    )?;

    let tags = stmt
        .query_map([], |row| {
            Ok(Tag {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row
                    .get::<_, Option<String>>(2)?
                    .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
                sort_order: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(tags)
}

pub fn insert_tag(conn: &Connection, name: &str, color: Option<&str>, sort_order: i64) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("tag name must not be empty"));
    }
    let color = color
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_TAG_COLOR);

    match conn.execute(
        "INSERT INTO tags (name, color, sort_order) VALUES (?1, ?2, ?3)",
        params![name, color, sort_order],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
            Err(LedgerError::validation(format!("tag '{name}' already exists")))
        }
        Err(e) => Err(e.into()),
    }
}

/// name → colour for every stored tag
pub fn tag_colors(conn: &Connection) -> Result<HashMap<String, String>> {
    Ok(list_tags(conn)?
        .into_iter()
        .map(|tag| (tag.name, tag.color))
        .collect())
}

/// Colour for a tag name, falling back to the default blue
pub fn color_for<'a>(palette: &'a HashMap<String, String>, name: &str) -> &'a str {
    palette
        .get(name)
        .map(String::as_str)
        .unwrap_or(DEFAULT_TAG_COLOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, open_in_memory};

    #[test]
    fn test_palette() {
        let conn = open_in_memory().unwrap();
        init_database(&conn).unwrap();

        insert_tag(&conn, "urgent", Some("#ff4d4f"), 2).unwrap();
        insert_tag(&conn, " work ", None, 1).unwrap();

        let tags = list_tags(&conn).unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["work", "urgent"]);
        assert_eq!(tags[0].color, DEFAULT_TAG_COLOR);

        let palette = tag_colors(&conn).unwrap();
        assert_eq!(color_for(&palette, "urgent"), "#ff4d4f");
        assert_eq!(color_for(&palette, "unknown"), DEFAULT_TAG_COLOR);
    }

    #[test]
    fn test_insert_rejects_blank_and_duplicate() {
        let conn = open_in_memory().unwrap();
        init_database(&conn).unwrap();

        assert!(matches!(
            insert_tag(&conn, "  ", None, 0),
            Err(LedgerError::Validation { .. })
        ));
        insert_tag(&conn, "work", None, 0).unwrap();
        let err = insert_tag(&conn, "work", None, 0).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
