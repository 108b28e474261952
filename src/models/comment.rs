use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const STATUSES: &[&str] = &["PENDING", "APPROVED", "SPAM", "DELETED"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub content: String,
    pub parent_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CommentForm {
    pub post_id: i64,
    pub user_id: Option<i64>,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub content: String,
    pub parent_id: Option<i64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    /// Hidden form field. Bots fill it, people don't.
    pub honeypot: Option<String>,
}

impl Comment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Comment {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            user_id: row.get("user_id")?,
            guest_name: row.get("guest_name")?,
            guest_email: row.get("guest_email")?,
            content: row.get("content")?,
            parent_id: row.get("parent_id")?,
            ip_address: row.get("ip_address")?,
            user_agent: row.get("user_agent")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM comments WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    /// Comments on a post, newest first. `approved_only` hides the moderation queue.
    pub fn for_post(
        pool: &DbPool,
        post_id: i64,
        approved_only: bool,
        limit: i64,
        offset: i64,
    ) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let sql = if approved_only {
            "SELECT * FROM comments WHERE post_id = ?1 AND status = 'APPROVED'
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        } else {
            "SELECT * FROM comments WHERE post_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        };
        let mut stmt = match conn.prepare(sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![post_id, limit, offset], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count_for_post(pool: &DbPool, post_id: i64, approved_only: bool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        let sql = if approved_only {
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1 AND status = 'APPROVED'"
        } else {
            "SELECT COUNT(*) FROM comments WHERE post_id = ?1"
        };
        conn.query_row(sql, params![post_id], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn list(pool: &DbPool, status: Option<&str>, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status {
            Some(s) => (
                "SELECT * FROM comments WHERE status = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
                    .to_string(),
                vec![Box::new(s.to_string()), Box::new(limit), Box::new(offset)],
            ),
            None => (
                "SELECT * FROM comments ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2".to_string(),
                vec![Box::new(limit), Box::new(offset)],
            ),
        };

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        stmt.query_map(params_refs.as_slice(), Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool, status: Option<&str>) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        match status {
            Some(s) => conn
                .query_row(
                    "SELECT COUNT(*) FROM comments WHERE status = ?1",
                    params![s],
                    |row| row.get(0),
                )
                .unwrap_or(0),
            None => conn
                .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
                .unwrap_or(0),
        }
    }

    pub fn create(pool: &DbPool, form: &CommentForm) -> Result<i64, String> {
        // Honeypot check: filled means bot
        if form.honeypot.as_ref().map_or(false, |h| !h.is_empty()) {
            return Err("Spam detected".to_string());
        }
        let content = form.content.trim();
        if content.is_empty() {
            return Err("Comment content is required".to_string());
        }
        if form.user_id.is_none()
            && form.guest_name.as_deref().map_or(true, |n| n.trim().is_empty())
        {
            return Err("Guest name is required".to_string());
        }

        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;

        let allow: i64 = tx
            .query_row(
                "SELECT allow_comment FROM posts WHERE id = ?1",
                params![form.post_id],
                |row| row.get(0),
            )
            .map_err(|_| "Post not found".to_string())?;
        if allow == 0 {
            return Err("Comments are disabled for this post".to_string());
        }

        if let Some(uid) = form.user_id {
            let found: i64 = tx
                .query_row("SELECT COUNT(*) FROM users WHERE id = ?1", params![uid], |row| row.get(0))
                .map_err(|e| e.to_string())?;
            if found == 0 {
                return Err("User not found".to_string());
            }
        }

        if let Some(parent) = form.parent_id {
            let parent_post: i64 = tx
                .query_row(
                    "SELECT post_id FROM comments WHERE id = ?1",
                    params![parent],
                    |row| row.get(0),
                )
                .map_err(|_| "Parent comment not found".to_string())?;
            if parent_post != form.post_id {
                return Err("Parent comment belongs to another post".to_string());
            }
        }

        tx.execute(
            "INSERT INTO comments (post_id, user_id, guest_name, guest_email, content, parent_id,
                                   ip_address, user_agent, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'PENDING')",
            params![
                form.post_id,
                form.user_id,
                form.guest_name,
                form.guest_email,
                content,
                form.parent_id,
                form.ip_address,
                form.user_agent,
            ],
        )
        .map_err(|e| e.to_string())?;
        let id = tx.last_insert_rowid();

        tx.execute(
            "UPDATE posts SET comment_count = comment_count + 1 WHERE id = ?1",
            params![form.post_id],
        )
        .map_err(|e| e.to_string())?;

        tx.commit().map_err(|e| e.to_string())?;
        Ok(id)
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let status = super::normalize_enum(status, STATUSES, "status")?;
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE comments SET status = ?1 WHERE id = ?2",
                params![status, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("Comment not found".to_string());
        }
        Ok(())
    }

    /// Removes the comment and decrements the post's counter (never below zero).
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let comment = Self::find_by_id(pool, id).ok_or("Comment not found")?;
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute("UPDATE comments SET parent_id = NULL WHERE parent_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM comments WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute(
            "UPDATE posts SET comment_count = MAX(comment_count - 1, 0) WHERE id = ?1",
            params![comment.post_id],
        )
        .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())
    }
}
