use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const CATEGORIES: &[&str] = &[
    "PRODUCTIVITY",
    "SEARCH",
    "SOCIAL",
    "DEVELOPMENT",
    "ENTERTAINMENT",
    "FINANCE",
    "NEWS",
    "OTHER",
];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExternalTool {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub icon: Option<String>,
    pub icon_bg_color: Option<String>,
    pub category: String,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Create and partial-update payload. On create `name` and `url` are required.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ToolForm {
    pub name: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub icon_bg_color: Option<String>,
    pub category: Option<String>,
    pub display_order: Option<i64>,
    pub is_active: Option<bool>,
}

impl ExternalTool {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(ExternalTool {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            url: row.get("url")?,
            icon: row.get("icon")?,
            icon_bg_color: row.get("icon_bg_color")?,
            category: row.get("category")?,
            display_order: row.get("display_order")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn query(pool: &DbPool, tail: &str, args: &[&dyn rusqlite::types::ToSql]) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!("SELECT * FROM external_tools {}", tail)) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(args, Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM external_tools WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_active(pool: &DbPool) -> Vec<Self> {
        Self::query(pool, "WHERE is_active = 1 ORDER BY display_order ASC, id ASC", &[])
    }

    pub fn list_paginated(pool: &DbPool, limit: i64, offset: i64) -> Vec<Self> {
        Self::query(
            pool,
            "ORDER BY display_order ASC, id ASC LIMIT ?1 OFFSET ?2",
            &[&limit, &offset],
        )
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM external_tools", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn by_category(pool: &DbPool, category: &str) -> Result<Vec<Self>, String> {
        let category = super::normalize_enum(category, CATEGORIES, "category")?;
        Ok(Self::query(
            pool,
            "WHERE is_active = 1 AND category = ?1 ORDER BY display_order ASC, id ASC",
            &[&category],
        ))
    }

    pub fn search(pool: &DbPool, keyword: &str) -> Vec<Self> {
        let pattern = format!("%{}%", keyword.trim());
        Self::query(
            pool,
            "WHERE is_active = 1 AND (name LIKE ?1 OR description LIKE ?1)
             ORDER BY display_order ASC, id ASC",
            &[&pattern],
        )
    }

    pub fn create(pool: &DbPool, form: &ToolForm) -> Result<i64, String> {
        let name = form.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err("Tool name is required".to_string());
        }
        let url = form.url.as_deref().map(str::trim).unwrap_or_default();
        if url.is_empty() {
            return Err("Tool url is required".to_string());
        }
        let category = match &form.category {
            Some(c) => super::normalize_enum(c, CATEGORIES, "category")?,
            None => "OTHER".to_string(),
        };
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO external_tools (name, description, url, icon, icon_bg_color, category, display_order, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                name,
                form.description,
                url,
                form.icon,
                form.icon_bg_color,
                category,
                form.display_order.unwrap_or(0),
                form.is_active.unwrap_or(true) as i64,
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &ToolForm) -> Result<(), String> {
        let category = match &form.category {
            Some(c) => Some(super::normalize_enum(c, CATEGORIES, "category")?),
            None => None,
        };
        if form.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
            return Err("Tool name is required".to_string());
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE external_tools SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    url = COALESCE(?3, url),
                    icon = COALESCE(?4, icon),
                    icon_bg_color = COALESCE(?5, icon_bg_color),
                    category = COALESCE(?6, category),
                    display_order = COALESCE(?7, display_order),
                    is_active = COALESCE(?8, is_active),
                    updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?9",
                params![
                    form.name.as_deref().map(str::trim),
                    form.description,
                    form.url.as_deref().map(str::trim),
                    form.icon,
                    form.icon_bg_color,
                    category,
                    form.display_order,
                    form.is_active.map(|b| b as i64),
                    id,
                ],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("Tool not found".to_string());
        }
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let removed = conn
            .execute("DELETE FROM external_tools WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("Tool not found".to_string());
        }
        Ok(())
    }

    /// Seeds the sidebar directory when the table is empty. Returns how many rows were added.
    pub fn seed_defaults(pool: &DbPool) -> Result<usize, String> {
        if Self::count(pool) > 0 {
            return Ok(0);
        }
        let defaults: [(&str, &str, &str, &str, &str, &str); 8] = [
            ("Notion", "一站式工作空间，用于笔记、文档和项目管理", "https://www.notion.so", "notion", "#000000", "PRODUCTIVITY"),
            ("百度", "中国最大的搜索引擎", "https://www.baidu.com", "baidu", "#2932E1", "SEARCH"),
            ("Google", "全球最大的搜索引擎", "https://www.google.com", "google", "#4285F4", "SEARCH"),
            ("GitHub", "全球最大的代码托管平台", "https://github.com", "github", "#24292E", "DEVELOPMENT"),
            ("Stack Overflow", "程序员问答社区", "https://stackoverflow.com", "stackoverflow", "#F48024", "DEVELOPMENT"),
            ("哔哩哔哩", "中国年轻人的视频社区", "https://www.bilibili.com", "bilibili", "#FB7299", "ENTERTAINMENT"),
            ("YouTube", "全球最大的视频分享平台", "https://www.youtube.com", "youtube", "#FF0000", "ENTERTAINMENT"),
            ("X (Twitter)", "全球社交媒体平台", "https://x.com", "twitter", "#1DA1F2", "SOCIAL"),
        ];
        log::info!("Initializing default external tools...");
        for (order, (name, description, url, icon, color, category)) in defaults.iter().enumerate() {
            Self::create(
                pool,
                &ToolForm {
                    name: Some(name.to_string()),
                    description: Some(description.to_string()),
                    url: Some(url.to_string()),
                    icon: Some(icon.to_string()),
                    icon_bg_color: Some(color.to_string()),
                    category: Some(category.to_string()),
                    display_order: Some(order as i64 + 1),
                    is_active: Some(true),
                },
            )?;
        }
        Ok(defaults.len())
    }
}
