use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const ROLES: &[&str] = &["ADMIN", "AUTHOR", "SUBSCRIBER"];
pub const STATUSES: &[&str] = &["ACTIVE", "INACTIVE", "BANNED"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub description: Option<String>,
    pub role: String,   // ADMIN, AUTHOR, SUBSCRIBER
    pub status: String, // ACTIVE, INACTIVE, BANNED
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insert payload. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: String,
    pub nickname: Option<String>,
    pub description: Option<String>,
    pub role: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProfileForm {
    pub nickname: Option<String>,
    pub description: Option<String>,
    pub avatar: Option<String>,
}

impl User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get("id")?,
            username: row.get("username")?,
            password_hash: row.get("password_hash")?,
            email: row.get("email")?,
            nickname: row.get("nickname")?,
            avatar: row.get("avatar")?,
            description: row.get("description")?,
            role: row.get("role")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    // ── Lookups ──

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn get_by_username(pool: &DbPool, username: &str) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            Self::from_row,
        )
        .ok()
    }

    pub fn get_by_email(pool: &DbPool, email: &str) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM users WHERE email = ?1",
            params![email],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_all(pool: &DbPool) -> Vec<User> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare("SELECT * FROM users ORDER BY id ASC") {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn list_paginated(pool: &DbPool, limit: i64, offset: i64) -> Vec<User> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn
            .prepare("SELECT * FROM users ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2")
        {
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
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap_or(0)
    }

    // ── Create ──

    pub fn create(pool: &DbPool, new: &NewUser) -> Result<i64, String> {
        let role = super::normalize_enum(&new.role, ROLES, "role")?;
        if Self::get_by_username(pool, &new.username).is_some() {
            return Err("Username already exists".to_string());
        }
        if Self::get_by_email(pool, &new.email).is_some() {
            return Err("Email already exists".to_string());
        }

        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO users (username, password_hash, email, nickname, description, role, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'ACTIVE')",
            params![
                new.username,
                new.password_hash,
                new.email,
                new.nickname,
                new.description,
                role
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    // ── Update ──

    /// Only the fields present in the form change.
    pub fn update_profile(pool: &DbPool, id: i64, form: &ProfileForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE users SET
                    nickname = COALESCE(?1, nickname),
                    description = COALESCE(?2, description),
                    avatar = COALESCE(?3, avatar),
                    updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?4",
                params![form.nickname, form.description, form.avatar, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("User not found".to_string());
        }
        Ok(())
    }

    pub fn update_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let status = super::normalize_enum(status, STATUSES, "status")?;
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE users SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![status, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("User not found".to_string());
        }
        if status != "ACTIVE" {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    pub fn update_role(pool: &DbPool, id: i64, role: &str) -> Result<(), String> {
        let role = super::normalize_enum(role, ROLES, "role")?;
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE users SET role = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![role, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("User not found".to_string());
        }
        Ok(())
    }

    // ── Delete ──

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        // Content outlives its author
        tx.execute("UPDATE posts SET author_id = NULL WHERE author_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute("UPDATE pages SET author_id = NULL WHERE author_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute("UPDATE comments SET user_id = NULL WHERE user_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())
    }

    // ── Helpers ──

    pub fn is_admin(&self) -> bool {
        self.role == "ADMIN"
    }

    pub fn is_author_or_above(&self) -> bool {
        self.role == "ADMIN" || self.role == "AUTHOR"
    }

    pub fn is_active(&self) -> bool {
        self.status == "ACTIVE"
    }

    /// Nickname when set, otherwise the username.
    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref() {
            Some(n) if !n.is_empty() => n,
            _ => &self.username,
        }
    }
}
