use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const TYPES: &[&str] = &["IMAGE", "VIDEO", "AUDIO", "DOCUMENT", "OTHER"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Attachment {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub url: String,
    pub media_type: Option<String>,
    pub suffix: Option<String>,
    pub size: i64,
    pub width: i64,
    pub height: i64,
    pub uploader_id: i64,
    pub r#type: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AttachmentForm {
    pub name: String,
    pub path: String,
    pub url: String,
    pub media_type: Option<String>,
    pub suffix: Option<String>,
    pub size: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub r#type: Option<String>,
}

impl Attachment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Attachment {
            id: row.get("id")?,
            name: row.get("name")?,
            path: row.get("path")?,
            url: row.get("url")?,
            media_type: row.get("media_type")?,
            suffix: row.get("suffix")?,
            size: row.get("size")?,
            width: row.get("width")?,
            height: row.get("height")?,
            uploader_id: row.get("uploader_id")?,
            r#type: row.get("type")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Attachment type for a file extension.
    pub fn type_for_suffix(suffix: &str) -> &'static str {
        match suffix.to_lowercase().as_str() {
            "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "ico" => "IMAGE",
            "mp4" | "webm" | "mov" | "mkv" | "avi" => "VIDEO",
            "mp3" | "wav" | "ogg" | "flac" | "m4a" => "AUDIO",
            "pdf" | "doc" | "docx" | "txt" | "md" | "xls" | "xlsx" | "ppt" | "pptx" => "DOCUMENT",
            _ => "OTHER",
        }
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM attachments WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_all(pool: &DbPool) -> Vec<Self> {
        Self::query(pool, "ORDER BY created_at DESC, id DESC", &[])
    }

    pub fn list_paginated(pool: &DbPool, limit: i64, offset: i64) -> Vec<Self> {
        Self::query(
            pool,
            "ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            &[&limit, &offset],
        )
    }

    pub fn by_uploader(pool: &DbPool, uploader_id: i64) -> Vec<Self> {
        Self::query(
            pool,
            "WHERE uploader_id = ?1 ORDER BY created_at DESC, id DESC",
            &[&uploader_id],
        )
    }

    pub fn by_type(pool: &DbPool, kind: &str) -> Vec<Self> {
        let kind = kind.to_uppercase();
        Self::query(
            pool,
            "WHERE type = ?1 ORDER BY created_at DESC, id DESC",
            &[&kind],
        )
    }

    fn query(pool: &DbPool, tail: &str, args: &[&dyn rusqlite::types::ToSql]) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!("SELECT * FROM attachments {}", tail)) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(args, Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM attachments", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn create(pool: &DbPool, uploader_id: i64, form: &AttachmentForm) -> Result<i64, String> {
        if form.name.trim().is_empty() {
            return Err("Attachment name is required".to_string());
        }
        let kind = match &form.r#type {
            Some(t) => super::normalize_enum(t, TYPES, "type")?,
            None => "OTHER".to_string(),
        };
        let conn = pool.get().map_err(|e| e.to_string())?;
        let uploader: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                params![uploader_id],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        if uploader == 0 {
            return Err("Uploader not found".to_string());
        }
        conn.execute(
            "INSERT INTO attachments (name, path, url, media_type, suffix, size, width, height, uploader_id, type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                form.name.trim(),
                form.path,
                form.url,
                form.media_type,
                form.suffix,
                form.size.unwrap_or(0),
                form.width.unwrap_or(0),
                form.height.unwrap_or(0),
                uploader_id,
                kind,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn rename(pool: &DbPool, id: i64, name: &str) -> Result<(), String> {
        let name = name.trim();
        if name.is_empty() {
            return Err("Attachment name is required".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE attachments SET name = ?1 WHERE id = ?2",
                params![name, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("Attachment not found".to_string());
        }
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let removed = conn
            .execute("DELETE FROM attachments WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("Attachment not found".to_string());
        }
        Ok(())
    }

    /// Drops every record pointing at `url`. Returns how many went.
    pub fn delete_by_url(pool: &DbPool, url: &str) -> Result<usize, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM attachments WHERE url = ?1", params![url])
            .map_err(|e| e.to_string())
    }
}
