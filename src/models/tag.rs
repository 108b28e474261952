use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::slugs::{self, SlugTable};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub post_count: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize)]
pub struct TagForm {
    pub name: String,
}

const SELECT: &str = "SELECT t.*, (SELECT COUNT(*) FROM post_tags pt WHERE pt.tag_id = t.id) AS post_count
                      FROM tags t";

impl Tag {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Tag {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            post_count: row.get("post_count")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(&format!("{} WHERE t.id = ?1", SELECT), params![id], Self::from_row)
            .ok()
    }

    pub fn find_by_slug(pool: &DbPool, slug: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("{} WHERE t.slug = ?1", SELECT),
            params![slug],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_by_name(pool: &DbPool, name: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("{} WHERE t.name = ?1", SELECT),
            params![name],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!("{} ORDER BY t.name ASC", SELECT)) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_paginated(pool: &DbPool, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!(
            "{} ORDER BY t.created_at DESC, t.id DESC LIMIT ?1 OFFSET ?2",
            SELECT
        )) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![limit, offset], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .unwrap_or(0)
    }

    /// Names of the tags linked to a post, alphabetical.
    pub fn names_for_post(pool: &DbPool, post_id: i64) -> Vec<String> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT t.name FROM tags t
             JOIN post_tags pt ON pt.tag_id = t.id
             WHERE pt.post_id = ?1
             ORDER BY t.name",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![post_id], |row| row.get(0))
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn create(pool: &DbPool, form: &TagForm) -> Result<i64, String> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err("Tag name is required".to_string());
        }
        if Self::find_by_name(pool, name).is_some() {
            return Err("Tag already exists".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        Self::insert(&conn, name)
    }

    /// Existing tag id for `name`, or a freshly inserted one.
    /// Runs on a caller's connection so post writes can share a transaction.
    pub fn find_or_create(conn: &Connection, name: &str) -> Result<i64, String> {
        let name = name.trim();
        if let Ok(id) = conn.query_row(
            "SELECT id FROM tags WHERE name = ?1",
            params![name],
            |row| row.get::<_, i64>(0),
        ) {
            return Ok(id);
        }
        Self::insert(conn, name)
    }

    fn insert(conn: &Connection, name: &str) -> Result<i64, String> {
        let slug = slugs::unique_slug(conn, SlugTable::Tags, &slugs::slugify(name), None)?;
        conn.execute(
            "INSERT INTO tags (name, slug) VALUES (?1, ?2)",
            params![name, slug],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &TagForm) -> Result<(), String> {
        let existing = Self::find_by_id(pool, id).ok_or("Tag not found")?;
        let name = form.name.trim();
        if name.is_empty() {
            return Err("Tag name is required".to_string());
        }
        if name == existing.name {
            return Ok(());
        }
        if Self::find_by_name(pool, name).is_some() {
            return Err("Tag already exists".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let slug = slugs::unique_slug(&conn, SlugTable::Tags, &slugs::slugify(name), Some(id))?;
        conn.execute(
            "UPDATE tags SET name = ?1, slug = ?2 WHERE id = ?3",
            params![name, slug, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM post_tags WHERE tag_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        let removed = tx
            .execute("DELETE FROM tags WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("Tag not found".to_string());
        }
        tx.commit().map_err(|e| e.to_string())
    }
}
