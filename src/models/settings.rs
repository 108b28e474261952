use std::collections::HashMap;

use rusqlite::{params, Connection};

use crate::db::DbPool;

/// Seeded runtime configuration. Rows that already exist are never
/// overwritten, so admin edits survive restarts.
pub const DEFAULTS: &[(&str, &str)] = &[
    // site_* keys are exposed to themes as `site`
    ("site_name", "Inkpot"),
    ("site_description", "A blog powered by Inkpot"),
    ("site_url", "http://localhost:8000"),
    ("site_logo", ""),
    ("site_favicon", ""),
    ("site_copyright", ""),
    ("site_social_github", ""),
    ("site_social_twitter", ""),
    ("posts_per_page", "10"),
    ("default_locale", "en"),
    ("session_expiry_hours", "24"),
    ("login_rate_limit", "5"),
    ("comments_rate_limit", "10"),
    ("news_fetch_enabled", "true"),
    ("stock_fetch_enabled", "true"),
    // minutes
    ("task_news_fetch_interval", "30"),
    ("task_stock_fetch_interval", "5"),
    ("task_session_cleanup_interval", "60"),
    ("stock_api_token", ""),
];

/// Key/value access to the `settings` table.
pub struct SiteSettings;

impl SiteSettings {
    pub fn seed(conn: &Connection) -> rusqlite::Result<usize> {
        let mut stmt = conn.prepare("INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)")?;
        let mut inserted = 0;
        for (key, value) in DEFAULTS {
            inserted += stmt.execute(params![key, value])?;
        }
        Ok(inserted)
    }

    /// The seeded value for a key, if it has one.
    pub fn default_for(key: &str) -> Option<&'static str> {
        DEFAULTS.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    pub fn value(pool: &DbPool, key: &str) -> Option<String> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| row.get(0))
            .ok()
    }

    pub fn store(pool: &DbPool, key: &str, value: &str) -> Result<(), String> {
        if key.trim().is_empty() {
            return Err("Setting key is required".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Settings whose key starts with `prefix`. Matches on a literal
    /// prefix, so `_` in `site_` is not treated as a wildcard.
    pub fn with_prefix(pool: &DbPool, prefix: &str) -> HashMap<String, String> {
        let Ok(conn) = pool.get() else {
            return HashMap::new();
        };
        let Ok(mut stmt) = conn.prepare(
            "SELECT key, value FROM settings WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        ) else {
            return HashMap::new();
        };
        stmt.query_map(params![prefix], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}
