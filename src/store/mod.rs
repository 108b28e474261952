use std::collections::HashMap;

use crate::models::attachment::{Attachment, AttachmentForm};
use crate::models::category::{Category, CategoryForm};
use crate::models::comment::{Comment, CommentForm};
use crate::models::external_tool::{ExternalTool, ToolForm};
use crate::models::news::{News, NewsForm};
use crate::models::page::{Page, PageForm};
use crate::models::post::{Post, PostForm, PostView};
use crate::models::settings::SiteSettings;
use crate::models::stock::{MarketOverview, Stock, StockQuote};
use crate::models::tag::{Tag, TagForm};
use crate::models::theme::{ThemeMeta, ThemeRecord};
use crate::models::user::{NewUser, ProfileForm, User};

pub mod sqlite;

/// Unified data-access trait. Every database operation goes through here.
/// Routes, guards, fetchers and the theme engine only ever see `Arc<dyn Store>`.
pub trait Store: Send + Sync {
    // ── Lifecycle ───────────────────────────────────────────────────
    fn run_migrations(&self) -> Result<(), String>;
    fn seed_defaults(&self) -> Result<(), String>;
    fn seed_sample_content(&self) -> Result<(), String>;

    // ── Settings ────────────────────────────────────────────────────
    fn setting_get(&self, key: &str) -> Option<String>;
    fn setting_get_or(&self, key: &str, default: &str) -> String {
        self.setting_get(key).unwrap_or_else(|| default.to_string())
    }
    fn setting_get_bool(&self, key: &str) -> bool {
        self.setting_get(key)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }
    /// Unparseable values fall back to the seeded default, then 0.
    fn setting_get_i64(&self, key: &str) -> i64 {
        self.setting_get(key)
            .and_then(|v| v.trim().parse().ok())
            .or_else(|| SiteSettings::default_for(key).and_then(|v| v.parse().ok()))
            .unwrap_or(0)
    }
    fn setting_set(&self, key: &str, value: &str) -> Result<(), String>;
    fn setting_get_group(&self, prefix: &str) -> HashMap<String, String>;

    // ── Users ───────────────────────────────────────────────────────
    fn user_get_by_id(&self, id: i64) -> Option<User>;
    fn user_get_by_username(&self, username: &str) -> Option<User>;
    fn user_get_by_email(&self, email: &str) -> Option<User>;
    fn user_list_all(&self) -> Vec<User>;
    fn user_list_paginated(&self, limit: i64, offset: i64) -> Vec<User>;
    fn user_count(&self) -> i64;
    fn user_create(&self, new: &NewUser) -> Result<i64, String>;
    fn user_update_profile(&self, id: i64, form: &ProfileForm) -> Result<(), String>;
    fn user_update_status(&self, id: i64, status: &str) -> Result<(), String>;
    fn user_update_role(&self, id: i64, role: &str) -> Result<(), String>;
    fn user_delete(&self, id: i64) -> Result<(), String>;

    // ── Sessions ────────────────────────────────────────────────────
    fn session_create(
        &self,
        user_id: i64,
        session_id: &str,
        expires_at: &str,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), String>;
    fn session_get_user(&self, session_id: &str) -> Option<User>;
    fn session_delete(&self, session_id: &str) -> Result<(), String>;
    fn session_cleanup_expired(&self) -> Result<usize, String>;

    // ── Categories ──────────────────────────────────────────────────
    fn category_find_by_id(&self, id: i64) -> Option<Category>;
    fn category_find_by_slug(&self, slug: &str) -> Option<Category>;
    fn category_list(&self) -> Vec<Category>;
    fn category_list_paginated(&self, limit: i64, offset: i64) -> Vec<Category>;
    fn category_count(&self) -> i64;
    fn category_create(&self, form: &CategoryForm) -> Result<i64, String>;
    fn category_update(&self, id: i64, form: &CategoryForm) -> Result<(), String>;
    fn category_delete(&self, id: i64) -> Result<(), String>;

    // ── Tags ────────────────────────────────────────────────────────
    fn tag_find_by_id(&self, id: i64) -> Option<Tag>;
    fn tag_find_by_slug(&self, slug: &str) -> Option<Tag>;
    fn tag_find_by_name(&self, name: &str) -> Option<Tag>;
    fn tag_find_or_create(&self, name: &str) -> Result<Tag, String>;
    fn tag_list(&self) -> Vec<Tag>;
    fn tag_list_paginated(&self, limit: i64, offset: i64) -> Vec<Tag>;
    fn tag_count(&self) -> i64;
    fn tag_create(&self, form: &TagForm) -> Result<i64, String>;
    fn tag_update(&self, id: i64, form: &TagForm) -> Result<(), String>;
    fn tag_delete(&self, id: i64) -> Result<(), String>;

    // ── Posts ───────────────────────────────────────────────────────
    fn post_find_by_id(&self, id: i64) -> Option<Post>;
    fn post_view_by_id(&self, id: i64) -> Option<PostView>;
    fn post_view_by_slug(&self, slug: &str) -> Option<PostView>;
    fn post_list(&self, limit: i64, offset: i64) -> Vec<PostView>;
    fn post_count(&self) -> i64;
    fn post_list_published(&self, limit: i64, offset: i64) -> Vec<PostView>;
    fn post_count_published(&self) -> i64;
    fn post_by_category(&self, category_id: i64, limit: i64, offset: i64) -> Vec<PostView>;
    fn post_count_by_category(&self, category_id: i64) -> i64;
    fn post_by_tag(&self, tag_id: i64, limit: i64, offset: i64) -> Vec<PostView>;
    fn post_count_by_tag(&self, tag_id: i64) -> i64;
    fn post_search(&self, keyword: &str, limit: i64, offset: i64) -> Vec<PostView>;
    fn post_count_search(&self, keyword: &str) -> i64;
    fn post_recent_published(&self, limit: i64) -> Vec<PostView>;
    fn post_create(&self, author_id: i64, form: &PostForm) -> Result<i64, String>;
    fn post_update(&self, id: i64, form: &PostForm) -> Result<(), String>;
    fn post_delete(&self, id: i64) -> Result<(), String>;
    fn post_increment_views(&self, id: i64) -> Result<(), String>;
    fn post_increment_likes(&self, id: i64) -> Result<i64, String>;

    // ── Comments ────────────────────────────────────────────────────
    fn comment_find_by_id(&self, id: i64) -> Option<Comment>;
    fn comment_for_post(
        &self,
        post_id: i64,
        approved_only: bool,
        limit: i64,
        offset: i64,
    ) -> Vec<Comment>;
    fn comment_count_for_post(&self, post_id: i64, approved_only: bool) -> i64;
    fn comment_list(&self, status: Option<&str>, limit: i64, offset: i64) -> Vec<Comment>;
    fn comment_count(&self, status: Option<&str>) -> i64;
    fn comment_create(&self, form: &CommentForm) -> Result<i64, String>;
    fn comment_update_status(&self, id: i64, status: &str) -> Result<(), String>;
    fn comment_delete(&self, id: i64) -> Result<(), String>;

    // ── Pages ───────────────────────────────────────────────────────
    fn page_find_by_id(&self, id: i64) -> Option<Page>;
    fn page_find_by_slug(&self, slug: &str) -> Option<Page>;
    fn page_list(&self, published_only: bool, limit: i64, offset: i64) -> Vec<Page>;
    fn page_count(&self, published_only: bool) -> i64;
    fn page_create(&self, author_id: i64, form: &PageForm) -> Result<i64, String>;
    fn page_update(&self, id: i64, form: &PageForm) -> Result<(), String>;
    fn page_increment_views(&self, id: i64) -> Result<(), String>;
    fn page_delete(&self, id: i64) -> Result<(), String>;

    // ── Attachments ─────────────────────────────────────────────────
    fn attachment_find_by_id(&self, id: i64) -> Option<Attachment>;
    fn attachment_list_all(&self) -> Vec<Attachment>;
    fn attachment_list_paginated(&self, limit: i64, offset: i64) -> Vec<Attachment>;
    fn attachment_count(&self) -> i64;
    fn attachment_by_uploader(&self, uploader_id: i64) -> Vec<Attachment>;
    fn attachment_by_type(&self, kind: &str) -> Vec<Attachment>;
    fn attachment_create(&self, uploader_id: i64, form: &AttachmentForm) -> Result<i64, String>;
    fn attachment_rename(&self, id: i64, name: &str) -> Result<(), String>;
    fn attachment_delete(&self, id: i64) -> Result<(), String>;
    fn attachment_delete_by_url(&self, url: &str) -> Result<usize, String>;

    // ── External tools ──────────────────────────────────────────────
    fn tool_find_by_id(&self, id: i64) -> Option<ExternalTool>;
    fn tool_list_active(&self) -> Vec<ExternalTool>;
    fn tool_list_paginated(&self, limit: i64, offset: i64) -> Vec<ExternalTool>;
    fn tool_count(&self) -> i64;
    fn tool_by_category(&self, category: &str) -> Result<Vec<ExternalTool>, String>;
    fn tool_search(&self, keyword: &str) -> Vec<ExternalTool>;
    fn tool_create(&self, form: &ToolForm) -> Result<i64, String>;
    fn tool_update(&self, id: i64, form: &ToolForm) -> Result<(), String>;
    fn tool_delete(&self, id: i64) -> Result<(), String>;
    fn tool_seed_defaults(&self) -> Result<usize, String>;

    // ── News ────────────────────────────────────────────────────────
    fn news_find_by_id(&self, id: i64) -> Option<News>;
    fn news_find_by_title_source(&self, title: &str, source: &str) -> Option<News>;
    fn news_list_paginated(&self, limit: i64, offset: i64) -> Vec<News>;
    fn news_count(&self) -> i64;
    fn news_hot(&self, limit: i64) -> Vec<News>;
    fn news_by_category(&self, category: &str, limit: i64, offset: i64)
        -> Result<Vec<News>, String>;
    fn news_count_by_category(&self, category: &str) -> i64;
    fn news_search(&self, keyword: &str, limit: i64, offset: i64) -> Vec<News>;
    fn news_count_search(&self, keyword: &str) -> i64;
    fn news_create(&self, form: &NewsForm) -> Result<i64, String>;
    fn news_update(&self, id: i64, form: &NewsForm) -> Result<(), String>;
    fn news_set_hot(&self, id: i64, is_hot: bool, hot_score: i64) -> Result<(), String>;
    fn news_refresh(&self, id: i64, hot_score: i64) -> Result<(), String>;
    fn news_increment_views(&self, id: i64) -> Result<(), String>;
    fn news_delete(&self, id: i64) -> Result<(), String>;

    // ── Stocks ──────────────────────────────────────────────────────
    fn stock_find_by_id(&self, id: i64) -> Option<Stock>;
    fn stock_find_by_symbol(&self, symbol: &str) -> Option<Stock>;
    fn stock_list_paginated(&self, limit: i64, offset: i64) -> Vec<Stock>;
    fn stock_count(&self) -> i64;
    fn stock_hot(&self, limit: i64) -> Vec<Stock>;
    fn stock_gainers(&self, limit: i64) -> Vec<Stock>;
    fn stock_losers(&self, limit: i64) -> Vec<Stock>;
    fn stock_by_market(&self, market: &str) -> Result<Vec<Stock>, String>;
    fn stock_search(&self, keyword: &str) -> Vec<Stock>;
    fn stock_upsert(&self, quote: &StockQuote) -> Result<i64, String>;
    fn stock_update_price(&self, symbol: &str, price: f64) -> Result<(), String>;
    fn stock_set_hot(&self, id: i64, is_hot: bool, hot_rank: i64) -> Result<(), String>;
    fn stock_delete(&self, id: i64) -> Result<(), String>;
    fn stock_market_overview(&self) -> Vec<MarketOverview>;

    // ── Themes ──────────────────────────────────────────────────────
    fn theme_find_by_id(&self, id: i64) -> Option<ThemeRecord>;
    fn theme_find_by_theme_id(&self, theme_id: &str) -> Option<ThemeRecord>;
    fn theme_find_active(&self) -> Option<ThemeRecord>;
    fn theme_list(&self) -> Vec<ThemeRecord>;
    fn theme_insert(&self, meta: &ThemeMeta, status: &str) -> Result<i64, String>;
    fn theme_refresh_meta(&self, meta: &ThemeMeta) -> Result<(), String>;
    fn theme_set_status(&self, theme_id: &str, status: &str) -> Result<(), String>;
    fn theme_set_settings(&self, theme_id: &str, settings_json: &str) -> Result<(), String>;
    fn theme_activate(&self, theme_id: &str) -> Result<(), String>;
    fn theme_delete(&self, theme_id: &str) -> Result<(), String>;
}
