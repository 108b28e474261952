use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;
use crate::models::tag::Tag;
use crate::slugs::{self, SlugTable};

pub const STATUSES: &[&str] = &["DRAFT", "PUBLISHED", "PRIVATE", "SCHEDULED"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub original_content: Option<String>,
    pub thumbnail: Option<String>,
    pub status: String,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub top_priority: i64,
    pub allow_comment: bool,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PostForm {
    pub title: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub original_content: Option<String>,
    pub thumbnail: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i64>,
    /// Tag names; created on demand. `None` leaves tags untouched on update.
    pub tags: Option<Vec<String>>,
    pub allow_comment: Option<bool>,
    pub top_priority: Option<i64>,
}

/// Post plus the joined names API clients and themes display.
#[derive(Debug, Serialize, Clone)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub author_name: Option<String>,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
}

const SELECT_VIEW: &str = "SELECT p.*,
        COALESCE(NULLIF(u.nickname, ''), u.username) AS author_name,
        c.name AS category_name
     FROM posts p
     LEFT JOIN users u ON u.id = p.author_id
     LEFT JOIN categories c ON c.id = p.category_id";

impl Post {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let allow: i64 = row.get("allow_comment")?;
        Ok(Post {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            summary: row.get("summary")?,
            content: row.get("content")?,
            original_content: row.get("original_content")?,
            thumbnail: row.get("thumbnail")?,
            status: row.get("status")?,
            author_id: row.get("author_id")?,
            category_id: row.get("category_id")?,
            view_count: row.get("view_count")?,
            like_count: row.get("like_count")?,
            comment_count: row.get("comment_count")?,
            top_priority: row.get("top_priority")?,
            allow_comment: allow != 0,
            published_at: row.get("published_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn view_from_row(row: &Row) -> rusqlite::Result<PostView> {
        Ok(PostView {
            post: Self::from_row(row)?,
            author_name: row.get("author_name")?,
            category_name: row.get("category_name")?,
            tags: Vec::new(),
        })
    }

    /// Runs a view query and fills in tag names.
    fn query_views(pool: &DbPool, where_order: &str, args: &[&dyn rusqlite::types::ToSql]) -> Vec<PostView> {
        let mut views: Vec<PostView> = {
            let conn = match pool.get() {
                Ok(c) => c,
                Err(_) => return vec![],
            };
            let mut stmt = match conn.prepare(&format!("{} {}", SELECT_VIEW, where_order)) {
                Ok(s) => s,
                Err(_) => return vec![],
            };
            stmt.query_map(args, Self::view_from_row)
                .map(|rows| rows.filter_map(|r| r.ok()).collect())
                .unwrap_or_default()
        };
        for v in views.iter_mut() {
            v.tags = Tag::names_for_post(pool, v.post.id);
        }
        views
    }

    fn count_where(pool: &DbPool, where_clause: &str, args: &[&dyn rusqlite::types::ToSql]) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            &format!("SELECT COUNT(*) FROM posts p {}", where_clause),
            args,
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    // ── Lookups ──

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM posts WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn view_by_id(pool: &DbPool, id: i64) -> Option<PostView> {
        Self::query_views(pool, "WHERE p.id = ?1", &[&id]).into_iter().next()
    }

    pub fn view_by_slug(pool: &DbPool, slug: &str) -> Option<PostView> {
        Self::query_views(pool, "WHERE p.slug = ?1", &[&slug]).into_iter().next()
    }

    // ── Listings ──

    pub fn list(pool: &DbPool, limit: i64, offset: i64) -> Vec<PostView> {
        Self::query_views(
            pool,
            "ORDER BY p.created_at DESC, p.id DESC LIMIT ?1 OFFSET ?2",
            &[&limit, &offset],
        )
    }

    pub fn count(pool: &DbPool) -> i64 {
        Self::count_where(pool, "", &[])
    }

    pub fn list_published(pool: &DbPool, limit: i64, offset: i64) -> Vec<PostView> {
        Self::query_views(
            pool,
            "WHERE p.status = 'PUBLISHED'
             ORDER BY p.top_priority DESC, p.published_at DESC, p.id DESC LIMIT ?1 OFFSET ?2",
            &[&limit, &offset],
        )
    }

    pub fn count_published(pool: &DbPool) -> i64 {
        Self::count_where(pool, "WHERE p.status = 'PUBLISHED'", &[])
    }

    pub fn by_category(pool: &DbPool, category_id: i64, limit: i64, offset: i64) -> Vec<PostView> {
        Self::query_views(
            pool,
            "WHERE p.category_id = ?1 AND p.status = 'PUBLISHED'
             ORDER BY p.published_at DESC, p.id DESC LIMIT ?2 OFFSET ?3",
            &[&category_id, &limit, &offset],
        )
    }

    pub fn count_by_category(pool: &DbPool, category_id: i64) -> i64 {
        Self::count_where(
            pool,
            "WHERE p.category_id = ?1 AND p.status = 'PUBLISHED'",
            &[&category_id],
        )
    }

    pub fn by_tag(pool: &DbPool, tag_id: i64, limit: i64, offset: i64) -> Vec<PostView> {
        Self::query_views(
            pool,
            "WHERE p.status = 'PUBLISHED'
               AND p.id IN (SELECT post_id FROM post_tags WHERE tag_id = ?1)
             ORDER BY p.published_at DESC, p.id DESC LIMIT ?2 OFFSET ?3",
            &[&tag_id, &limit, &offset],
        )
    }

    pub fn count_by_tag(pool: &DbPool, tag_id: i64) -> i64 {
        Self::count_where(
            pool,
            "WHERE p.status = 'PUBLISHED'
               AND p.id IN (SELECT post_id FROM post_tags WHERE tag_id = ?1)",
            &[&tag_id],
        )
    }

    pub fn search(pool: &DbPool, keyword: &str, limit: i64, offset: i64) -> Vec<PostView> {
        let pattern = format!("%{}%", keyword);
        Self::query_views(
            pool,
            "WHERE p.title LIKE ?1 ORDER BY p.created_at DESC, p.id DESC LIMIT ?2 OFFSET ?3",
            &[&pattern, &limit, &offset],
        )
    }

    pub fn count_search(pool: &DbPool, keyword: &str) -> i64 {
        let pattern = format!("%{}%", keyword);
        Self::count_where(pool, "WHERE p.title LIKE ?1", &[&pattern])
    }

    pub fn recent_published(pool: &DbPool, limit: i64) -> Vec<PostView> {
        Self::query_views(
            pool,
            "WHERE p.status = 'PUBLISHED' ORDER BY p.published_at DESC, p.id DESC LIMIT ?1",
            &[&limit],
        )
    }

    // ── Writes ──

    pub fn create(pool: &DbPool, author_id: i64, form: &PostForm) -> Result<i64, String> {
        let title = form.title.trim();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        let status = match &form.status {
            Some(s) => super::normalize_enum(s, STATUSES, "status")?,
            None => "DRAFT".to_string(),
        };

        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;

        if !exists(&tx, "users", author_id)? {
            return Err("Author not found".to_string());
        }
        if let Some(cid) = form.category_id {
            if !exists(&tx, "categories", cid)? {
                return Err("Category not found".to_string());
            }
        }

        let slug = slugs::unique_slug(&tx, SlugTable::Posts, &slugs::slugify(title), None)?;
        tx.execute(
            "INSERT INTO posts (title, slug, summary, content, original_content, thumbnail, status,
                                author_id, category_id, allow_comment, top_priority, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     CASE WHEN ?7 = 'PUBLISHED' THEN CURRENT_TIMESTAMP ELSE NULL END)",
            params![
                title,
                slug,
                form.summary,
                form.content,
                form.original_content,
                form.thumbnail,
                status,
                author_id,
                form.category_id,
                form.allow_comment.unwrap_or(true) as i64,
                form.top_priority.unwrap_or(0),
            ],
        )
        .map_err(|e| e.to_string())?;
        let id = tx.last_insert_rowid();

        if let Some(tags) = &form.tags {
            set_tags(&tx, id, tags)?;
        }

        tx.commit().map_err(|e| e.to_string())?;
        Ok(id)
    }

    pub fn update(pool: &DbPool, id: i64, form: &PostForm) -> Result<(), String> {
        let title = form.title.trim();
        if title.is_empty() {
            return Err("Title is required".to_string());
        }
        let status = match &form.status {
            Some(s) => Some(super::normalize_enum(s, STATUSES, "status")?),
            None => None,
        };

        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;

        if !exists(&tx, "posts", id)? {
            return Err("Post not found".to_string());
        }
        if let Some(cid) = form.category_id {
            if !exists(&tx, "categories", cid)? {
                return Err("Category not found".to_string());
            }
        }

        let slug = slugs::unique_slug(&tx, SlugTable::Posts, &slugs::slugify(title), Some(id))?;
        tx.execute(
            "UPDATE posts SET
                title = ?1, slug = ?2, summary = ?3, content = ?4, original_content = ?5,
                thumbnail = ?6,
                status = COALESCE(?7, status),
                category_id = COALESCE(?8, category_id),
                allow_comment = COALESCE(?9, allow_comment),
                top_priority = COALESCE(?10, top_priority),
                published_at = CASE
                    WHEN ?7 = 'PUBLISHED' AND published_at IS NULL THEN CURRENT_TIMESTAMP
                    ELSE published_at END,
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?11",
            params![
                title,
                slug,
                form.summary,
                form.content,
                form.original_content,
                form.thumbnail,
                status,
                form.category_id,
                form.allow_comment.map(|b| b as i64),
                form.top_priority,
                id,
            ],
        )
        .map_err(|e| e.to_string())?;

        if let Some(tags) = &form.tags {
            set_tags(&tx, id, tags)?;
        }

        tx.commit().map_err(|e| e.to_string())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM post_tags WHERE post_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        tx.execute("DELETE FROM comments WHERE post_id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        let removed = tx
            .execute("DELETE FROM posts WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("Post not found".to_string());
        }
        tx.commit().map_err(|e| e.to_string())
    }

    pub fn increment_views(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE posts SET view_count = view_count + 1 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("Post not found".to_string());
        }
        Ok(())
    }

    pub fn increment_likes(pool: &DbPool, id: i64) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE posts SET like_count = like_count + 1 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("Post not found".to_string());
        }
        conn.query_row(
            "SELECT like_count FROM posts WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())
    }
}

fn exists(conn: &Connection, table: &str, id: i64) -> Result<bool, String> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE id = ?1", table),
        params![id],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n > 0)
    .map_err(|e| e.to_string())
}

/// Replaces a post's tag links with the named tags, creating missing ones.
fn set_tags(conn: &Connection, post_id: i64, names: &[String]) -> Result<(), String> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?1", params![post_id])
        .map_err(|e| e.to_string())?;
    for name in names.iter().filter(|n| !n.trim().is_empty()) {
        let tag_id = Tag::find_or_create(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?1, ?2)",
            params![post_id, tag_id],
        )
        .map_err(|e| e.to_string())?;
    }
    Ok(())
}
