use std::collections::HashMap;

use crate::db::DbPool;
use crate::models::attachment::{Attachment, AttachmentForm};
use crate::models::category::{Category, CategoryForm};
use crate::models::comment::{Comment, CommentForm};
use crate::models::external_tool::{ExternalTool, ToolForm};
use crate::models::news::{News, NewsForm};
use crate::models::page::{Page, PageForm};
use crate::models::post::{Post, PostForm, PostView};
use crate::models::session::Session;
use crate::models::settings::SiteSettings;
use crate::models::stock::{MarketOverview, Stock, StockQuote};
use crate::models::tag::{Tag, TagForm};
use crate::models::theme::{ThemeMeta, ThemeRecord};
use crate::models::user::{NewUser, ProfileForm, User};

use super::Store;

/// SQLite-backed implementation of the Store trait.
/// Wraps the r2d2 connection pool and delegates to model methods.
pub struct SqliteStore {
    pub pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn new_at(path: &str) -> Result<Self, String> {
        let pool = crate::db::init_pool_at(path).map_err(|e| e.to_string())?;
        Ok(Self { pool })
    }
}

impl Store for SqliteStore {
    // ── Lifecycle ───────────────────────────────────────────────────

    fn run_migrations(&self) -> Result<(), String> {
        crate::db::run_migrations(&self.pool).map_err(|e| e.to_string())
    }

    fn seed_defaults(&self) -> Result<(), String> {
        crate::db::seed_defaults(&self.pool).map_err(|e| e.to_string())
    }

    fn seed_sample_content(&self) -> Result<(), String> {
        crate::db::seed_sample_content(&self.pool).map_err(|e| e.to_string())
    }

    // ── Settings ────────────────────────────────────────────────────

    fn setting_get(&self, key: &str) -> Option<String> {
        SiteSettings::value(&self.pool, key)
    }

    fn setting_set(&self, key: &str, value: &str) -> Result<(), String> {
        SiteSettings::store(&self.pool, key, value)
    }

    fn setting_get_group(&self, prefix: &str) -> HashMap<String, String> {
        SiteSettings::with_prefix(&self.pool, prefix)
    }

    // ── Users ───────────────────────────────────────────────────────

    fn user_get_by_id(&self, id: i64) -> Option<User> {
        User::get_by_id(&self.pool, id)
    }

    fn user_get_by_username(&self, username: &str) -> Option<User> {
        User::get_by_username(&self.pool, username)
    }

    fn user_get_by_email(&self, email: &str) -> Option<User> {
        User::get_by_email(&self.pool, email)
    }

    fn user_list_all(&self) -> Vec<User> {
        User::list_all(&self.pool)
    }

    fn user_list_paginated(&self, limit: i64, offset: i64) -> Vec<User> {
        User::list_paginated(&self.pool, limit, offset)
    }

    fn user_count(&self) -> i64 {
        User::count(&self.pool)
    }

    fn user_create(&self, new: &NewUser) -> Result<i64, String> {
        User::create(&self.pool, new)
    }

    fn user_update_profile(&self, id: i64, form: &ProfileForm) -> Result<(), String> {
        User::update_profile(&self.pool, id, form)
    }

    fn user_update_status(&self, id: i64, status: &str) -> Result<(), String> {
        User::update_status(&self.pool, id, status)
    }

    fn user_update_role(&self, id: i64, role: &str) -> Result<(), String> {
        User::update_role(&self.pool, id, role)
    }

    fn user_delete(&self, id: i64) -> Result<(), String> {
        User::delete(&self.pool, id)
    }

    // ── Sessions ────────────────────────────────────────────────────

    fn session_create(
        &self,
        user_id: i64,
        session_id: &str,
        expires_at: &str,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), String> {
        Session::create(&self.pool, user_id, session_id, expires_at, ip_hash, user_agent)
    }

    fn session_get_user(&self, session_id: &str) -> Option<User> {
        Session::get_user(&self.pool, session_id)
    }

    fn session_delete(&self, session_id: &str) -> Result<(), String> {
        Session::delete(&self.pool, session_id)
    }

    fn session_cleanup_expired(&self) -> Result<usize, String> {
        Session::cleanup_expired(&self.pool)
    }

    // ── Categories ──────────────────────────────────────────────────

    fn category_find_by_id(&self, id: i64) -> Option<Category> {
        Category::find_by_id(&self.pool, id)
    }

    fn category_find_by_slug(&self, slug: &str) -> Option<Category> {
        Category::find_by_slug(&self.pool, slug)
    }

    fn category_list(&self) -> Vec<Category> {
        Category::list(&self.pool)
    }

    fn category_list_paginated(&self, limit: i64, offset: i64) -> Vec<Category> {
        Category::list_paginated(&self.pool, limit, offset)
    }

    fn category_count(&self) -> i64 {
        Category::count(&self.pool)
    }

    fn category_create(&self, form: &CategoryForm) -> Result<i64, String> {
        Category::create(&self.pool, form)
    }

    fn category_update(&self, id: i64, form: &CategoryForm) -> Result<(), String> {
        Category::update(&self.pool, id, form)
    }

    fn category_delete(&self, id: i64) -> Result<(), String> {
        Category::delete(&self.pool, id)
    }

    // ── Tags ────────────────────────────────────────────────────────

    fn tag_find_by_id(&self, id: i64) -> Option<Tag> {
        Tag::find_by_id(&self.pool, id)
    }

    fn tag_find_by_slug(&self, slug: &str) -> Option<Tag> {
        Tag::find_by_slug(&self.pool, slug)
    }

    fn tag_find_by_name(&self, name: &str) -> Option<Tag> {
        Tag::find_by_name(&self.pool, name)
    }

    fn tag_find_or_create(&self, name: &str) -> Result<Tag, String> {
        if name.trim().is_empty() {
            return Err("Tag name is required".to_string());
        }
        let id = {
            let conn = self.pool.get().map_err(|e| e.to_string())?;
            Tag::find_or_create(&conn, name)?
        };
        Tag::find_by_id(&self.pool, id).ok_or_else(|| "Tag not found".to_string())
    }

    fn tag_list(&self) -> Vec<Tag> {
        Tag::list(&self.pool)
    }

    fn tag_list_paginated(&self, limit: i64, offset: i64) -> Vec<Tag> {
        Tag::list_paginated(&self.pool, limit, offset)
    }

    fn tag_count(&self) -> i64 {
        Tag::count(&self.pool)
    }

    fn tag_create(&self, form: &TagForm) -> Result<i64, String> {
        Tag::create(&self.pool, form)
    }

    fn tag_update(&self, id: i64, form: &TagForm) -> Result<(), String> {
        Tag::update(&self.pool, id, form)
    }

    fn tag_delete(&self, id: i64) -> Result<(), String> {
        Tag::delete(&self.pool, id)
    }

    // ── Posts ───────────────────────────────────────────────────────

    fn post_find_by_id(&self, id: i64) -> Option<Post> {
        Post::find_by_id(&self.pool, id)
    }

    fn post_view_by_id(&self, id: i64) -> Option<PostView> {
        Post::view_by_id(&self.pool, id)
    }

    fn post_view_by_slug(&self, slug: &str) -> Option<PostView> {
        Post::view_by_slug(&self.pool, slug)
    }

    fn post_list(&self, limit: i64, offset: i64) -> Vec<PostView> {
        Post::list(&self.pool, limit, offset)
    }

    fn post_count(&self) -> i64 {
        Post::count(&self.pool)
    }

    fn post_list_published(&self, limit: i64, offset: i64) -> Vec<PostView> {
        Post::list_published(&self.pool, limit, offset)
    }

    fn post_count_published(&self) -> i64 {
        Post::count_published(&self.pool)
    }

    fn post_by_category(&self, category_id: i64, limit: i64, offset: i64) -> Vec<PostView> {
        Post::by_category(&self.pool, category_id, limit, offset)
    }

    fn post_count_by_category(&self, category_id: i64) -> i64 {
        Post::count_by_category(&self.pool, category_id)
    }

    fn post_by_tag(&self, tag_id: i64, limit: i64, offset: i64) -> Vec<PostView> {
        Post::by_tag(&self.pool, tag_id, limit, offset)
    }

    fn post_count_by_tag(&self, tag_id: i64) -> i64 {
        Post::count_by_tag(&self.pool, tag_id)
    }

    fn post_search(&self, keyword: &str, limit: i64, offset: i64) -> Vec<PostView> {
        Post::search(&self.pool, keyword, limit, offset)
    }

    fn post_count_search(&self, keyword: &str) -> i64 {
        Post::count_search(&self.pool, keyword)
    }

    fn post_recent_published(&self, limit: i64) -> Vec<PostView> {
        Post::recent_published(&self.pool, limit)
    }

    fn post_create(&self, author_id: i64, form: &PostForm) -> Result<i64, String> {
        Post::create(&self.pool, author_id, form)
    }

    fn post_update(&self, id: i64, form: &PostForm) -> Result<(), String> {
        Post::update(&self.pool, id, form)
    }

    fn post_delete(&self, id: i64) -> Result<(), String> {
        Post::delete(&self.pool, id)
    }

    fn post_increment_views(&self, id: i64) -> Result<(), String> {
        Post::increment_views(&self.pool, id)
    }

    fn post_increment_likes(&self, id: i64) -> Result<i64, String> {
        Post::increment_likes(&self.pool, id)
    }

    // ── Comments ────────────────────────────────────────────────────

    fn comment_find_by_id(&self, id: i64) -> Option<Comment> {
        Comment::find_by_id(&self.pool, id)
    }

    fn comment_for_post(
        &self,
        post_id: i64,
        approved_only: bool,
        limit: i64,
        offset: i64,
    ) -> Vec<Comment> {
        Comment::for_post(&self.pool, post_id, approved_only, limit, offset)
    }

    fn comment_count_for_post(&self, post_id: i64, approved_only: bool) -> i64 {
        Comment::count_for_post(&self.pool, post_id, approved_only)
    }

    fn comment_list(&self, status: Option<&str>, limit: i64, offset: i64) -> Vec<Comment> {
        Comment::list(&self.pool, status, limit, offset)
    }

    fn comment_count(&self, status: Option<&str>) -> i64 {
        Comment::count(&self.pool, status)
    }

    fn comment_create(&self, form: &CommentForm) -> Result<i64, String> {
        Comment::create(&self.pool, form)
    }

    fn comment_update_status(&self, id: i64, status: &str) -> Result<(), String> {
        Comment::update_status(&self.pool, id, status)
    }

    fn comment_delete(&self, id: i64) -> Result<(), String> {
        Comment::delete(&self.pool, id)
    }

    // ── Pages ───────────────────────────────────────────────────────

    fn page_find_by_id(&self, id: i64) -> Option<Page> {
        Page::find_by_id(&self.pool, id)
    }

    fn page_find_by_slug(&self, slug: &str) -> Option<Page> {
        Page::find_by_slug(&self.pool, slug)
    }

    fn page_list(&self, published_only: bool, limit: i64, offset: i64) -> Vec<Page> {
        Page::list(&self.pool, published_only, limit, offset)
    }

    fn page_count(&self, published_only: bool) -> i64 {
        Page::count(&self.pool, published_only)
    }

    fn page_create(&self, author_id: i64, form: &PageForm) -> Result<i64, String> {
        Page::create(&self.pool, author_id, form)
    }

    fn page_update(&self, id: i64, form: &PageForm) -> Result<(), String> {
        Page::update(&self.pool, id, form)
    }

    fn page_increment_views(&self, id: i64) -> Result<(), String> {
        Page::increment_views(&self.pool, id)
    }

    fn page_delete(&self, id: i64) -> Result<(), String> {
        Page::delete(&self.pool, id)
    }

    // ── Attachments ─────────────────────────────────────────────────

    fn attachment_find_by_id(&self, id: i64) -> Option<Attachment> {
        Attachment::find_by_id(&self.pool, id)
    }

    fn attachment_list_all(&self) -> Vec<Attachment> {
        Attachment::list_all(&self.pool)
    }

    fn attachment_list_paginated(&self, limit: i64, offset: i64) -> Vec<Attachment> {
        Attachment::list_paginated(&self.pool, limit, offset)
    }

    fn attachment_count(&self) -> i64 {
        Attachment::count(&self.pool)
    }

    fn attachment_by_uploader(&self, uploader_id: i64) -> Vec<Attachment> {
        Attachment::by_uploader(&self.pool, uploader_id)
    }

    fn attachment_by_type(&self, kind: &str) -> Vec<Attachment> {
        Attachment::by_type(&self.pool, kind)
    }

    fn attachment_create(&self, uploader_id: i64, form: &AttachmentForm) -> Result<i64, String> {
        Attachment::create(&self.pool, uploader_id, form)
    }

    fn attachment_rename(&self, id: i64, name: &str) -> Result<(), String> {
        Attachment::rename(&self.pool, id, name)
    }

    fn attachment_delete(&self, id: i64) -> Result<(), String> {
        Attachment::delete(&self.pool, id)
    }

    fn attachment_delete_by_url(&self, url: &str) -> Result<usize, String> {
        Attachment::delete_by_url(&self.pool, url)
    }

    // ── External tools ──────────────────────────────────────────────

    fn tool_find_by_id(&self, id: i64) -> Option<ExternalTool> {
        ExternalTool::find_by_id(&self.pool, id)
    }

    fn tool_list_active(&self) -> Vec<ExternalTool> {
        ExternalTool::list_active(&self.pool)
    }

    fn tool_list_paginated(&self, limit: i64, offset: i64) -> Vec<ExternalTool> {
        ExternalTool::list_paginated(&self.pool, limit, offset)
    }

    fn tool_count(&self) -> i64 {
        ExternalTool::count(&self.pool)
    }

    fn tool_by_category(&self, category: &str) -> Result<Vec<ExternalTool>, String> {
        ExternalTool::by_category(&self.pool, category)
    }

    fn tool_search(&self, keyword: &str) -> Vec<ExternalTool> {
        ExternalTool::search(&self.pool, keyword)
    }

    fn tool_create(&self, form: &ToolForm) -> Result<i64, String> {
        ExternalTool::create(&self.pool, form)
    }

    fn tool_update(&self, id: i64, form: &ToolForm) -> Result<(), String> {
        ExternalTool::update(&self.pool, id, form)
    }

    fn tool_delete(&self, id: i64) -> Result<(), String> {
        ExternalTool::delete(&self.pool, id)
    }

    fn tool_seed_defaults(&self) -> Result<usize, String> {
        ExternalTool::seed_defaults(&self.pool)
    }

    // ── News ────────────────────────────────────────────────────────

    fn news_find_by_id(&self, id: i64) -> Option<News> {
        News::find_by_id(&self.pool, id)
    }

    fn news_find_by_title_source(&self, title: &str, source: &str) -> Option<News> {
        News::find_by_title_source(&self.pool, title, source)
    }

    fn news_list_paginated(&self, limit: i64, offset: i64) -> Vec<News> {
        News::list_paginated(&self.pool, limit, offset)
    }

    fn news_count(&self) -> i64 {
        News::count(&self.pool)
    }

    fn news_hot(&self, limit: i64) -> Vec<News> {
        News::hot(&self.pool, limit)
    }

    fn news_by_category(
        &self,
        category: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<News>, String> {
        News::by_category(&self.pool, category, limit, offset)
    }

    fn news_count_by_category(&self, category: &str) -> i64 {
        News::count_by_category(&self.pool, category)
    }

    fn news_search(&self, keyword: &str, limit: i64, offset: i64) -> Vec<News> {
        News::search(&self.pool, keyword, limit, offset)
    }

    fn news_count_search(&self, keyword: &str) -> i64 {
        News::count_search(&self.pool, keyword)
    }

    fn news_create(&self, form: &NewsForm) -> Result<i64, String> {
        News::create(&self.pool, form)
    }

    fn news_update(&self, id: i64, form: &NewsForm) -> Result<(), String> {
        News::update(&self.pool, id, form)
    }

    fn news_set_hot(&self, id: i64, is_hot: bool, hot_score: i64) -> Result<(), String> {
        News::set_hot(&self.pool, id, is_hot, hot_score)
    }

    fn news_refresh(&self, id: i64, hot_score: i64) -> Result<(), String> {
        News::refresh(&self.pool, id, hot_score)
    }

    fn news_increment_views(&self, id: i64) -> Result<(), String> {
        News::increment_views(&self.pool, id)
    }

    fn news_delete(&self, id: i64) -> Result<(), String> {
        News::delete(&self.pool, id)
    }

    // ── Stocks ──────────────────────────────────────────────────────

    fn stock_find_by_id(&self, id: i64) -> Option<Stock> {
        Stock::find_by_id(&self.pool, id)
    }

    fn stock_find_by_symbol(&self, symbol: &str) -> Option<Stock> {
        Stock::find_by_symbol(&self.pool, symbol)
    }

    fn stock_list_paginated(&self, limit: i64, offset: i64) -> Vec<Stock> {
        Stock::list_paginated(&self.pool, limit, offset)
    }

    fn stock_count(&self) -> i64 {
        Stock::count(&self.pool)
    }

    fn stock_hot(&self, limit: i64) -> Vec<Stock> {
        Stock::hot(&self.pool, limit)
    }

    fn stock_gainers(&self, limit: i64) -> Vec<Stock> {
        Stock::gainers(&self.pool, limit)
    }

    fn stock_losers(&self, limit: i64) -> Vec<Stock> {
        Stock::losers(&self.pool, limit)
    }

    fn stock_by_market(&self, market: &str) -> Result<Vec<Stock>, String> {
        Stock::by_market(&self.pool, market)
    }

    fn stock_search(&self, keyword: &str) -> Vec<Stock> {
        Stock::search(&self.pool, keyword)
    }

    fn stock_upsert(&self, quote: &StockQuote) -> Result<i64, String> {
        Stock::upsert(&self.pool, quote)
    }

    fn stock_update_price(&self, symbol: &str, price: f64) -> Result<(), String> {
        Stock::update_price(&self.pool, symbol, price)
    }

    fn stock_set_hot(&self, id: i64, is_hot: bool, hot_rank: i64) -> Result<(), String> {
        Stock::set_hot(&self.pool, id, is_hot, hot_rank)
    }

    fn stock_delete(&self, id: i64) -> Result<(), String> {
        Stock::delete(&self.pool, id)
    }

    fn stock_market_overview(&self) -> Vec<MarketOverview> {
        Stock::market_overview(&self.pool)
    }

    // ── Themes ──────────────────────────────────────────────────────

    fn theme_find_by_id(&self, id: i64) -> Option<ThemeRecord> {
        ThemeRecord::find_by_id(&self.pool, id)
    }

    fn theme_find_by_theme_id(&self, theme_id: &str) -> Option<ThemeRecord> {
        ThemeRecord::find_by_theme_id(&self.pool, theme_id)
    }

    fn theme_find_active(&self) -> Option<ThemeRecord> {
        ThemeRecord::find_active(&self.pool)
    }

    fn theme_list(&self) -> Vec<ThemeRecord> {
        ThemeRecord::list(&self.pool)
    }

    fn theme_insert(&self, meta: &ThemeMeta, status: &str) -> Result<i64, String> {
        ThemeRecord::insert(&self.pool, meta, status)
    }

    fn theme_refresh_meta(&self, meta: &ThemeMeta) -> Result<(), String> {
        ThemeRecord::refresh_meta(&self.pool, meta)
    }

    fn theme_set_status(&self, theme_id: &str, status: &str) -> Result<(), String> {
        ThemeRecord::set_status(&self.pool, theme_id, status)
    }

    fn theme_set_settings(&self, theme_id: &str, settings_json: &str) -> Result<(), String> {
        ThemeRecord::set_settings(&self.pool, theme_id, settings_json)
    }

    fn theme_activate(&self, theme_id: &str) -> Result<(), String> {
        ThemeRecord::activate(&self.pool, theme_id)
    }

    fn theme_delete(&self, theme_id: &str) -> Result<(), String> {
        ThemeRecord::delete(&self.pool, theme_id)
    }
}
