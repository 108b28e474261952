use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::slugs::{self, SlugTable};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub post_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CategoryForm {
    pub name: String,
    pub description: Option<String>,
}

const SELECT: &str = "SELECT c.*, (SELECT COUNT(*) FROM posts p WHERE p.category_id = c.id) AS post_count
                      FROM categories c";

impl Category {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Category {
            id: row.get("id")?,
            name: row.get("name")?,
            slug: row.get("slug")?,
            description: row.get("description")?,
            post_count: row.get("post_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("{} WHERE c.id = ?1", SELECT),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_by_slug(pool: &DbPool, slug: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("{} WHERE c.slug = ?1", SELECT),
            params![slug],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!("{} ORDER BY c.name ASC", SELECT)) {
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
            "{} ORDER BY c.created_at DESC, c.id DESC LIMIT ?1 OFFSET ?2",
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
        conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, form: &CategoryForm) -> Result<i64, String> {
        let name = form.name.trim();
        if name.is_empty() {
            return Err("Category name is required".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let slug = slugs::unique_slug(&conn, SlugTable::Categories, &slugs::slugify(name), None)?;
        conn.execute(
            "INSERT INTO categories (name, slug, description) VALUES (?1, ?2, ?3)",
            params![name, slug, form.description],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &CategoryForm) -> Result<(), String> {
        let existing = Self::find_by_id(pool, id).ok_or("Category not found")?;
        let name = form.name.trim();
        if name.is_empty() {
            return Err("Category name is required".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let slug = if existing.name == name {
            existing.slug
        } else {
            slugs::unique_slug(&conn, SlugTable::Categories, &slugs::slugify(name), Some(id))?
        };
        conn.execute(
            "UPDATE categories SET name = ?1, slug = ?2, description = ?3, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?4",
            params![name, slug, form.description, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "UPDATE posts SET category_id = NULL WHERE category_id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        let removed = tx
            .execute("DELETE FROM categories WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("Category not found".to_string());
        }
        tx.commit().map_err(|e| e.to_string())
    }
}
