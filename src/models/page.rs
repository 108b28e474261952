use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::slugs::{self, SlugTable};

pub const STATUSES: &[&str] = &["DRAFT", "PUBLISHED"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: Option<String>,
    pub original_content: Option<String>,
    pub author_id: Option<i64>,
    pub status: String,
    pub view_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PageForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub original_content: Option<String>,
    pub status: Option<String>,
}

impl Page {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Page {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            content: row.get("content")?,
            original_content: row.get("original_content")?,
            author_id: row.get("author_id")?,
            status: row.get("status")?,
            view_count: row.get("view_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM pages WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn find_by_slug(pool: &DbPool, slug: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM pages WHERE slug = ?1",
            params![slug],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool, published_only: bool, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let sql = if published_only {
            "SELECT * FROM pages WHERE status = 'PUBLISHED'
             ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        } else {
            "SELECT * FROM pages ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
        };
        let mut stmt = match conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![limit, offset], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool, published_only: bool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        let sql = if published_only {
            "SELECT COUNT(*) FROM pages WHERE status = 'PUBLISHED'"
        } else {
            "SELECT COUNT(*) FROM pages"
        };
        conn.query_row(sql, [], |row| row.get(0)).unwrap_or(0)
    }

    pub fn create(pool: &DbPool, author_id: i64, form: &PageForm) -> Result<i64, String> {
        let title = form.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        let status = match &form.status {
            Some(s) => super::normalize_enum(s, STATUSES, "status")?,
            None => "DRAFT".to_string(),
        };
        let conn = pool.get().map_err(|e| e.to_string())?;
        let author: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                params![author_id],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        if author == 0 {
            return Err("Author not found".to_string());
        }
        let slug = slugs::unique_slug(&conn, SlugTable::Pages, &slugs::slugify(title), None)?;
        conn.execute(
            "INSERT INTO pages (title, slug, content, original_content, author_id, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![title, slug, form.content, form.original_content, author_id, status],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    /// Partial update; a new title regenerates the slug.
    pub fn update(pool: &DbPool, id: i64, form: &PageForm) -> Result<(), String> {
        let existing = Self::find_by_id(pool, id).ok_or("Page not found")?;
        let status = match &form.status {
            Some(s) => super::normalize_enum(s, STATUSES, "status")?,
            None => existing.status.clone(),
        };
        let conn = pool.get().map_err(|e| e.to_string())?;

        let (title, slug) = match form.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() && t != existing.title => {
                let slug = slugs::unique_slug(&conn, SlugTable::Pages, &slugs::slugify(t), Some(id))?;
                (t.to_string(), slug)
            }
            Some(t) if t.is_empty() => return Err("Title is required".to_string()),
            _ => (existing.title.clone(), existing.slug.clone()),
        };

        conn.execute(
            "UPDATE pages SET title = ?1, slug = ?2,
                content = COALESCE(?3, content),
                original_content = COALESCE(?4, original_content),
                status = ?5,
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?6",
            params![title, slug, form.content, form.original_content, status, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn increment_views(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE pages SET view_count = view_count + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let removed = conn
            .execute("DELETE FROM pages WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("Page not found".to_string());
        }
        Ok(())
    }
}
