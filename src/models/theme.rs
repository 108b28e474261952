use chrono::NaiveDateTime;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const STATUSES: &[&str] = &["ENABLED", "DISABLED", "ERROR"];

/// Registry row for a theme folder under `website/themes`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ThemeRecord {
    pub id: i64,
    pub theme_id: String,
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub description: Option<String>,
    pub screenshot: Option<String>,
    pub config_json: String,
    pub settings_json: Option<String>,
    pub is_active: bool,
    pub status: String,
    pub template_engine: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Manifest-derived metadata written on scan and install.
#[derive(Debug, Clone, Default)]
pub struct ThemeMeta {
    pub theme_id: String,
    pub name: String,
    pub version: Option<String>,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub description: Option<String>,
    pub screenshot: Option<String>,
    pub config_json: String,
}

impl ThemeRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ThemeRecord {
            id: row.get("id")?,
            theme_id: row.get("theme_id")?,
            name: row.get("name")?,
            version: row.get("version")?,
            author: row.get("author")?,
            author_url: row.get("author_url")?,
            description: row.get("description")?,
            screenshot: row.get("screenshot")?,
            config_json: row.get("config_json")?,
            settings_json: row.get("settings_json")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            status: row.get("status")?,
            template_engine: row.get("template_engine")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM themes WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn find_by_theme_id(pool: &DbPool, theme_id: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM themes WHERE theme_id = ?1",
            params![theme_id],
            Self::from_row,
        )
        .ok()
    }

    pub fn find_active(pool: &DbPool) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM themes WHERE is_active = 1 LIMIT 1",
            [],
            Self::from_row,
        )
        .ok()
    }

    /// Active theme first, then by name.
    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt =
            match conn.prepare("SELECT * FROM themes ORDER BY is_active DESC, name ASC") {
                Ok(s) => s,
                Err(_) => return vec![],
            };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn insert(pool: &DbPool, meta: &ThemeMeta, status: &str) -> Result<i64, String> {
        let status = super::normalize_enum(status, STATUSES, "status")?;
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO themes (theme_id, name, version, author, author_url, description, screenshot,
                                 config_json, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                meta.theme_id,
                meta.name,
                meta.version,
                meta.author,
                meta.author_url,
                meta.description,
                meta.screenshot,
                meta.config_json,
                status,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    /// Rewrites manifest metadata for a known theme. Settings and activation are untouched.
    pub fn refresh_meta(pool: &DbPool, meta: &ThemeMeta) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE themes SET name = ?1, version = ?2, author = ?3, author_url = ?4,
                description = ?5, screenshot = ?6, config_json = ?7,
                updated_at = CURRENT_TIMESTAMP
             WHERE theme_id = ?8",
            params![
                meta.name,
                meta.version,
                meta.author,
                meta.author_url,
                meta.description,
                meta.screenshot,
                meta.config_json,
                meta.theme_id,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn set_status(pool: &DbPool, theme_id: &str, status: &str) -> Result<(), String> {
        let status = super::normalize_enum(status, STATUSES, "status")?;
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE themes SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE theme_id = ?2",
                params![status, theme_id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err(format!("Theme not found: {}", theme_id));
        }
        Ok(())
    }

    pub fn set_settings(pool: &DbPool, theme_id: &str, settings_json: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE themes SET settings_json = ?1, updated_at = CURRENT_TIMESTAMP WHERE theme_id = ?2",
                params![settings_json, theme_id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err(format!("Theme not found: {}", theme_id));
        }
        Ok(())
    }

    /// Makes `theme_id` the only active theme. Both writes share one transaction,
    /// so readers see either the old holder or the new one.
    pub fn activate(pool: &DbPool, theme_id: &str) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM themes WHERE theme_id = ?1",
                params![theme_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| e.to_string())?;
        match status.as_deref() {
            None => return Err(format!("Theme not found: {}", theme_id)),
            Some("ENABLED") => {}
            Some(_) => return Err(format!("Theme is not enabled: {}", theme_id)),
        }
        tx.execute(
            "UPDATE themes SET is_active = 0, updated_at = CURRENT_TIMESTAMP
             WHERE is_active = 1 AND theme_id != ?1",
            params![theme_id],
        )
        .map_err(|e| e.to_string())?;
        tx.execute(
            "UPDATE themes SET is_active = 1, updated_at = CURRENT_TIMESTAMP WHERE theme_id = ?1",
            params![theme_id],
        )
        .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())
    }

    pub fn delete(pool: &DbPool, theme_id: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let removed = conn
            .execute("DELETE FROM themes WHERE theme_id = ?1", params![theme_id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err(format!("Theme not found: {}", theme_id));
        }
        Ok(())
    }
}
