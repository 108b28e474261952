use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const CATEGORIES: &[&str] = &[
    "TECHNOLOGY",
    "FINANCE",
    "POLITICS",
    "SPORTS",
    "ENTERTAINMENT",
    "HEALTH",
    "SCIENCE",
    "WORLD",
    "DOMESTIC",
    "OTHER",
];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub thumbnail: Option<String>,
    pub category: String,
    pub view_count: i64,
    pub is_hot: bool,
    pub hot_score: i64,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct NewsForm {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub source_url: Option<String>,
    pub thumbnail: Option<String>,
    pub category: Option<String>,
    pub is_hot: Option<bool>,
    pub hot_score: Option<i64>,
}

impl News {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(News {
            id: row.get("id")?,
            title: row.get("title")?,
            summary: row.get("summary")?,
            content: row.get("content")?,
            source: row.get("source")?,
            source_url: row.get("source_url")?,
            thumbnail: row.get("thumbnail")?,
            category: row.get("category")?,
            view_count: row.get("view_count")?,
            is_hot: row.get::<_, i64>("is_hot")? != 0,
            hot_score: row.get("hot_score")?,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn query(pool: &DbPool, tail: &str, args: &[&dyn rusqlite::types::ToSql]) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!("SELECT * FROM news {}", tail)) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(args, Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    fn count_where(pool: &DbPool, clause: &str, args: &[&dyn rusqlite::types::ToSql]) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(&format!("SELECT COUNT(*) FROM news {}", clause), args, |row| {
            row.get(0)
        })
        .unwrap_or(0)
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM news WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn find_by_title_source(pool: &DbPool, title: &str, source: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM news WHERE title = ?1 AND source = ?2 LIMIT 1",
            params![title, source],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_paginated(pool: &DbPool, limit: i64, offset: i64) -> Vec<Self> {
        Self::query(
            pool,
            "ORDER BY published_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            &[&limit, &offset],
        )
    }

    pub fn count(pool: &DbPool) -> i64 {
        Self::count_where(pool, "", &[])
    }

    pub fn hot(pool: &DbPool, limit: i64) -> Vec<Self> {
        Self::query(
            pool,
            "WHERE is_hot = 1 ORDER BY hot_score DESC, published_at DESC LIMIT ?1",
            &[&limit],
        )
    }

    pub fn by_category(
        pool: &DbPool,
        category: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, String> {
        let category = super::normalize_enum(category, CATEGORIES, "category")?;
        Ok(Self::query(
            pool,
            "WHERE category = ?1 ORDER BY published_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            &[&category, &limit, &offset],
        ))
    }

    pub fn count_by_category(pool: &DbPool, category: &str) -> i64 {
        let category = category.to_uppercase();
        Self::count_where(pool, "WHERE category = ?1", &[&category])
    }

    pub fn search(pool: &DbPool, keyword: &str, limit: i64, offset: i64) -> Vec<Self> {
        let pattern = format!("%{}%", keyword.trim());
        Self::query(
            pool,
            "WHERE title LIKE ?1 OR summary LIKE ?1
             ORDER BY published_at DESC, id DESC LIMIT ?2 OFFSET ?3",
            &[&pattern, &limit, &offset],
        )
    }

    pub fn count_search(pool: &DbPool, keyword: &str) -> i64 {
        let pattern = format!("%{}%", keyword.trim());
        Self::count_where(pool, "WHERE title LIKE ?1 OR summary LIKE ?1", &[&pattern])
    }

    pub fn create(pool: &DbPool, form: &NewsForm) -> Result<i64, String> {
        let title = form.title.as_deref().map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        let category = match &form.category {
            Some(c) => super::normalize_enum(c, CATEGORIES, "category")?,
            None => "OTHER".to_string(),
        };
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO news (title, summary, content, source, source_url, thumbnail, category,
                               is_hot, hot_score, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, CURRENT_TIMESTAMP)",
            params![
                title,
                form.summary,
                form.content,
                form.source,
                form.source_url,
                form.thumbnail,
                category,
                form.is_hot.unwrap_or(false) as i64,
                form.hot_score.unwrap_or(0),
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &NewsForm) -> Result<(), String> {
        let category = match &form.category {
            Some(c) => Some(super::normalize_enum(c, CATEGORIES, "category")?),
            None => None,
        };
        if form.title.as_deref().map_or(false, |t| t.trim().is_empty()) {
            return Err("Title is required".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE news SET
                    title = COALESCE(?1, title),
                    summary = COALESCE(?2, summary),
                    content = COALESCE(?3, content),
                    source = COALESCE(?4, source),
                    source_url = COALESCE(?5, source_url),
                    thumbnail = COALESCE(?6, thumbnail),
                    category = COALESCE(?7, category),
                    is_hot = COALESCE(?8, is_hot),
                    hot_score = COALESCE(?9, hot_score),
                    updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?10",
                params![
                    form.title.as_deref().map(str::trim),
                    form.summary,
                    form.content,
                    form.source,
                    form.source_url,
                    form.thumbnail,
                    category,
                    form.is_hot.map(|b| b as i64),
                    form.hot_score,
                    id,
                ],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("News not found".to_string());
        }
        Ok(())
    }

    pub fn set_hot(pool: &DbPool, id: i64, is_hot: bool, hot_score: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE news SET is_hot = ?1, hot_score = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
                params![is_hot as i64, hot_score, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("News not found".to_string());
        }
        Ok(())
    }

    /// Bumps `published_at` to now and replaces the hot score. Used when sample items are re-seeded.
    pub fn refresh(pool: &DbPool, id: i64, hot_score: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE news SET published_at = CURRENT_TIMESTAMP, hot_score = ?1,
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2",
            params![hot_score, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn increment_views(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE news SET view_count = view_count + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let removed = conn
            .execute("DELETE FROM news WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("News not found".to_string());
        }
        Ok(())
    }
}
