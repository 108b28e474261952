#![cfg(test)]

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::fetchers::news::{self as news_fetch, HnStory, HN_SOURCE};
use crate::fetchers::stock::{self as stock_fetch, POPULAR_STOCKS};
use crate::models::category::CategoryForm;
use crate::models::comment::CommentForm;
use crate::models::news::NewsForm;
use crate::models::page::PageForm;
use crate::models::post::PostForm;
use crate::models::stock::StockQuote;
use crate::models::tag::TagForm;
use crate::models::user::{NewUser, ProfileForm};
use crate::paging::{PageRequest, Paged};
use crate::rate_limit::{Bucket, RateLimiter};
use crate::routes::api::uploads;
use crate::security::auth;
use crate::slugs;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;
use crate::themes::context::{nest_messages, Pagination};
use crate::themes::i18n::{parse_properties, Translations};
use crate::themes::install::install_archive;
use crate::themes::manifest::ThemeManifest;
use crate::themes::registry::TemplateRegistry;
use crate::themes::{RenderOptions, ThemeEngine};

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Fresh in-memory SQLite pool with migrations and default settings applied.
/// Named shared-cache so every pooled connection sees the same data.
fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri);
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .expect("Failed to create test pool");
    {
        let conn = pool.get().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    }
    run_migrations(&pool).expect("Failed to run migrations");
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

fn test_store() -> Arc<dyn Store> {
    Arc::new(SqliteStore::new(test_pool()))
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

fn make_user(store: &dyn Store, username: &str, role: &str) -> i64 {
    store
        .user_create(&NewUser {
            username: username.to_string(),
            password_hash: fast_hash("secret"),
            email: format!("{}@example.com", username),
            nickname: None,
            description: None,
            role: role.to_string(),
        })
        .unwrap()
}

fn post_form(title: &str, status: &str) -> PostForm {
    PostForm {
        title: title.to_string(),
        content: Some(format!("<p>{}</p>", title)),
        status: Some(status.to_string()),
        ..Default::default()
    }
}

fn guest_comment(post_id: i64, content: &str) -> CommentForm {
    CommentForm {
        post_id,
        guest_name: Some("Guest".to_string()),
        guest_email: Some("guest@example.com".to_string()),
        content: content.to_string(),
        ..Default::default()
    }
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let store = test_store();
    store.setting_set("test_key", "hello").unwrap();
    assert_eq!(store.setting_get("test_key"), Some("hello".to_string()));
    store.setting_set("test_key", "again").unwrap();
    assert_eq!(store.setting_get_or("test_key", "x"), "again");
}

#[test]
fn settings_seeded_defaults() {
    let store = test_store();
    assert_eq!(store.setting_get_i64("posts_per_page"), 10);
    assert_eq!(store.setting_get_i64("session_expiry_hours"), 24);
    assert!(store.setting_get_bool("news_fetch_enabled"));
    assert_eq!(store.setting_get_or("missing_key", "fallback"), "fallback");
    assert_eq!(store.setting_get_i64("missing_key"), 0);
}

#[test]
fn settings_group_by_prefix() {
    let store = test_store();
    let site = store.setting_get_group("site_");
    assert_eq!(site.get("site_name").map(String::as_str), Some("Inkpot"));
    assert!(site.keys().all(|k| k.starts_with("site_")));

    // `_` is matched literally, not as a LIKE wildcard
    store.setting_set("siteXname", "nope").unwrap();
    assert!(!store.setting_get_group("site_").contains_key("siteXname"));
}

#[test]
fn settings_bad_number_falls_back_to_default() {
    let store = test_store();
    store.setting_set("posts_per_page", "lots").unwrap();
    assert_eq!(store.setting_get_i64("posts_per_page"), 10);
    assert!(store.setting_set("  ", "x").is_err());
}

// ═══════════════════════════════════════════════════════════
// Paging
// ═══════════════════════════════════════════════════════════

#[test]
fn page_request_clamps_values() {
    let req = PageRequest::new(Some(-3), Some(1000));
    assert_eq!(req.page, 0);
    assert_eq!(req.size, 100);
    let req = PageRequest::new(Some(2), Some(0));
    assert_eq!(req.size, 1);
    assert_eq!(req.offset(), 2);
    assert_eq!(PageRequest::default().size, 10);
    assert_eq!(PageRequest::with_default(None, None, 20).limit(), 20);
}

#[test]
fn page_request_offset_saturates_on_huge_page() {
    let req = PageRequest::new(Some(i64::MAX / 2), Some(10));
    assert_eq!(req.offset(), i64::MAX);

    let store = test_store();
    let author = make_user(&*store, "far", "AUTHOR");
    store.post_create(author, &post_form("Only Post", "PUBLISHED")).unwrap();
    assert!(store.post_list_published(req.limit(), req.offset()).is_empty());
}

#[test]
fn paged_counts_pages_and_neighbours() {
    let paged = Paged::new(vec![1, 2, 3], 25, PageRequest::new(Some(0), Some(10)));
    assert_eq!(paged.pages, 3);
    assert!(!paged.has_previous());
    assert!(paged.has_next());

    let last = Paged::new(vec![1], 25, PageRequest::new(Some(2), Some(10)));
    assert!(last.has_previous());
    assert!(!last.has_next());

    let empty: Paged<i32> = Paged::new(vec![], 0, PageRequest::default());
    assert_eq!(empty.pages, 0);
    assert!(!empty.has_next());
    assert!(!empty.has_previous());
}

#[test]
fn pagination_builds_links() {
    let paged = Paged::new(vec![(); 5], 15, PageRequest::new(Some(1), Some(5)));
    let p = Pagination::from_paged(&paged, "/themes/default", Some("zh-CN"));
    assert_eq!(p.prev_url.as_deref(), Some("/themes/default?page=0&size=5&lang=zh-CN"));
    assert_eq!(p.next_url.as_deref(), Some("/themes/default?page=2&size=5&lang=zh-CN"));

    let first = Paged::new(vec![(); 5], 5, PageRequest::new(Some(0), Some(5)));
    let p = Pagination::from_paged(&first, "/", None);
    assert!(p.prev_url.is_none());
    assert!(p.next_url.is_none());
}

// ═══════════════════════════════════════════════════════════
// Slugs
// ═══════════════════════════════════════════════════════════

#[test]
fn slugify_basic() {
    assert_eq!(slugs::slugify("Hello World!"), "hello-world");
    assert_eq!(slugs::slugify("   "), "untitled");
}

#[test]
fn post_slugs_stay_unique() {
    let store = test_store();
    let author = make_user(&*store, "writer", "AUTHOR");
    let a = store.post_create(author, &post_form("Hello World", "DRAFT")).unwrap();
    let b = store.post_create(author, &post_form("Hello World", "DRAFT")).unwrap();
    let c = store.post_create(author, &post_form("Hello World", "DRAFT")).unwrap();
    assert_eq!(store.post_find_by_id(a).unwrap().slug, "hello-world");
    assert_eq!(store.post_find_by_id(b).unwrap().slug, "hello-world-1");
    assert_eq!(store.post_find_by_id(c).unwrap().slug, "hello-world-2");

    // Saving a post under its own title keeps its slug
    store.post_update(a, &post_form("Hello World", "DRAFT")).unwrap();
    assert_eq!(store.post_find_by_id(a).unwrap().slug, "hello-world");
}

// ═══════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════

#[test]
fn user_create_rejects_duplicates() {
    let store = test_store();
    make_user(&*store, "alice", "AUTHOR");
    let dup = store.user_create(&NewUser {
        username: "alice".into(),
        password_hash: fast_hash("x"),
        email: "other@example.com".into(),
        nickname: None,
        description: None,
        role: "AUTHOR".into(),
    });
    assert_eq!(dup.unwrap_err(), "Username already exists");

    let dup_email = store.user_create(&NewUser {
        username: "alice2".into(),
        password_hash: fast_hash("x"),
        email: "alice@example.com".into(),
        nickname: None,
        description: None,
        role: "AUTHOR".into(),
    });
    assert_eq!(dup_email.unwrap_err(), "Email already exists");
}

#[test]
fn user_role_and_status_are_validated() {
    let store = test_store();
    let id = make_user(&*store, "bob", "subscriber");
    let user = store.user_get_by_id(id).unwrap();
    assert_eq!(user.role, "SUBSCRIBER");
    assert!(!user.is_author_or_above());

    assert!(store.user_update_role(id, "overlord").unwrap_err().contains("Invalid role"));
    store.user_update_role(id, "author").unwrap();
    assert!(store.user_get_by_id(id).unwrap().is_author_or_above());

    assert!(store.user_update_status(id, "sleeping").is_err());
    assert!(store.user_update_status(9999, "ACTIVE").unwrap_err().contains("not found"));
}

#[test]
fn user_profile_partial_update() {
    let store = test_store();
    let id = make_user(&*store, "carol", "AUTHOR");
    store
        .user_update_profile(id, &ProfileForm { nickname: Some("Caz".into()), ..Default::default() })
        .unwrap();
    store
        .user_update_profile(id, &ProfileForm { description: Some("Writes".into()), ..Default::default() })
        .unwrap();
    let user = store.user_get_by_id(id).unwrap();
    assert_eq!(user.display_name(), "Caz");
    assert_eq!(user.description.as_deref(), Some("Writes"));
}

#[test]
fn user_delete_keeps_content() {
    let store = test_store();
    let id = make_user(&*store, "dave", "AUTHOR");
    let post = store.post_create(id, &post_form("Orphan", "PUBLISHED")).unwrap();
    store.user_delete(id).unwrap();
    assert!(store.user_get_by_id(id).is_none());
    let post = store.post_find_by_id(post).unwrap();
    assert_eq!(post.author_id, None);
}

// ═══════════════════════════════════════════════════════════
// Auth & sessions
// ═══════════════════════════════════════════════════════════

#[test]
fn login_opens_a_session() {
    let store = test_store();
    make_user(&*store, "erin", "AUTHOR");
    let (token, user) = auth::login(&*store, "erin", "secret", Some("10.0.0.1"), Some("test")).unwrap();
    assert_eq!(user.username, "erin");
    let current = auth::current_user(&*store, &token).unwrap();
    assert_eq!(current.id, user.id);

    auth::destroy_session(&*store, &token).unwrap();
    assert!(auth::current_user(&*store, &token).is_none());
}

#[test]
fn login_rejects_bad_credentials() {
    let store = test_store();
    make_user(&*store, "frank", "AUTHOR");
    assert_eq!(
        auth::login(&*store, "frank", "wrong", None, None).unwrap_err(),
        "Invalid username or password"
    );
    assert_eq!(
        auth::login(&*store, "nobody", "secret", None, None).unwrap_err(),
        "Invalid username or password"
    );
}

#[test]
fn inactive_users_lose_access() {
    let store = test_store();
    let id = make_user(&*store, "gina", "AUTHOR");
    let (token, _) = auth::login(&*store, "gina", "secret", None, None).unwrap();
    store.user_update_status(id, "BANNED").unwrap();
    assert!(auth::current_user(&*store, &token).is_none());
    assert_eq!(
        auth::login(&*store, "gina", "secret", None, None).unwrap_err(),
        "User account is not active"
    );
}

#[test]
fn register_validates_before_hashing() {
    let store = test_store();
    assert_eq!(
        auth::register(&*store, " ", "pw", "a@b.c", None, None, None).unwrap_err(),
        "Username is required"
    );
    assert_eq!(
        auth::register(&*store, "henry", "", "a@b.c", None, None, None).unwrap_err(),
        "Password is required"
    );
    assert_eq!(
        auth::register(&*store, "henry", "pw", "", None, None, None).unwrap_err(),
        "Email is required"
    );
}

#[test]
fn expired_sessions_are_cleaned_up() {
    let store = test_store();
    let id = make_user(&*store, "ivy", "AUTHOR");
    store
        .session_create(id, "stale-token", "2000-01-01 00:00:00", None, None)
        .unwrap();
    assert!(store.session_get_user("stale-token").is_none());
    assert_eq!(auth::cleanup_expired_sessions(&*store), 1);
    assert_eq!(auth::cleanup_expired_sessions(&*store), 0);
}

#[test]
fn ip_hash_is_stable_hex() {
    let a = auth::hash_ip("127.0.0.1");
    assert_eq!(a.len(), 64);
    assert_eq!(a, auth::hash_ip("127.0.0.1"));
    assert_ne!(a, auth::hash_ip("127.0.0.2"));
}

// ═══════════════════════════════════════════════════════════
// Posts
// ═══════════════════════════════════════════════════════════

#[test]
fn post_create_validates_input() {
    let store = test_store();
    let author = make_user(&*store, "jack", "AUTHOR");
    assert_eq!(store.post_create(author, &post_form("  ", "DRAFT")).unwrap_err(), "Title is required");
    assert!(store
        .post_create(author, &post_form("Bad", "LIVE"))
        .unwrap_err()
        .contains("Invalid status"));
    let mut form = post_form("No Category", "DRAFT");
    form.category_id = Some(424242);
    assert_eq!(store.post_create(author, &form).unwrap_err(), "Category not found");
}

#[test]
fn post_tags_and_publication() {
    let store = test_store();
    let author = make_user(&*store, "kate", "AUTHOR");
    let mut form = post_form("Tagged", "PUBLISHED");
    form.tags = Some(vec!["Rust".into(), "Web".into(), " ".into()]);
    let id = store.post_create(author, &form).unwrap();

    let view = store.post_view_by_id(id).unwrap();
    let mut tags = view.tags.clone();
    tags.sort();
    assert_eq!(tags, vec!["Rust", "Web"]);
    assert!(view.post.published_at.is_some());
    assert_eq!(view.author_name.as_deref(), Some("kate"));

    let rust = store.tag_find_by_name("Rust").unwrap();
    assert_eq!(store.post_count_by_tag(rust.id), 1);

    // Omitting tags on update leaves them alone
    let mut update = post_form("Tagged", "PUBLISHED");
    update.tags = None;
    store.post_update(id, &update).unwrap();
    assert_eq!(store.post_view_by_id(id).unwrap().tags.len(), 2);
}

#[test]
fn published_listing_skips_drafts() {
    let store = test_store();
    let author = make_user(&*store, "liam", "AUTHOR");
    store.post_create(author, &post_form("Live One", "PUBLISHED")).unwrap();
    store.post_create(author, &post_form("Live Two", "PUBLISHED")).unwrap();
    store.post_create(author, &post_form("Hidden", "DRAFT")).unwrap();

    assert_eq!(store.post_count(), 3);
    assert_eq!(store.post_count_published(), 2);
    let listed = store.post_list_published(10, 0);
    assert!(listed.iter().all(|p| p.post.status == "PUBLISHED"));
    assert_eq!(store.post_recent_published(1).len(), 1);
}

#[test]
fn post_search_and_counters() {
    let store = test_store();
    let author = make_user(&*store, "mia", "AUTHOR");
    let id = store.post_create(author, &post_form("Searchable Rocket", "PUBLISHED")).unwrap();
    store.post_create(author, &post_form("Unrelated", "PUBLISHED")).unwrap();

    assert_eq!(store.post_count_search("Rocket"), 1);
    assert_eq!(store.post_search("rocket", 10, 0)[0].post.id, id);

    store.post_increment_views(id).unwrap();
    store.post_increment_views(id).unwrap();
    assert_eq!(store.post_increment_likes(id).unwrap(), 1);
    let post = store.post_find_by_id(id).unwrap();
    assert_eq!(post.view_count, 2);
    assert_eq!(post.like_count, 1);
}

#[test]
fn post_counters_on_missing_post_are_not_found() {
    let store = test_store();
    let err = store.post_increment_likes(9999).unwrap_err();
    assert_eq!(err, "Post not found");
    assert_eq!(crate::routes::reject(err).0, rocket::http::Status::NotFound);
    assert_eq!(store.post_increment_views(9999).unwrap_err(), "Post not found");
}

#[test]
fn post_delete_removes_comments() {
    let store = test_store();
    let author = make_user(&*store, "noah", "AUTHOR");
    let id = store.post_create(author, &post_form("Doomed", "PUBLISHED")).unwrap();
    let cid = store.comment_create(&guest_comment(id, "first")).unwrap();
    store.post_delete(id).unwrap();
    assert!(store.post_find_by_id(id).is_none());
    assert!(store.comment_find_by_id(cid).is_none());
    assert_eq!(store.post_delete(id).unwrap_err(), "Post not found");
}

// ═══════════════════════════════════════════════════════════
// Categories & tags
// ═══════════════════════════════════════════════════════════

#[test]
fn category_counts_and_delete() {
    let store = test_store();
    let author = make_user(&*store, "olga", "AUTHOR");
    let cat = store
        .category_create(&CategoryForm { name: "Tech News".into(), description: None })
        .unwrap();
    let mut form = post_form("In Tech", "PUBLISHED");
    form.category_id = Some(cat);
    let post = store.post_create(author, &form).unwrap();

    let category = store.category_find_by_slug("tech-news").unwrap();
    assert_eq!(category.post_count, 1);
    assert_eq!(store.post_count_by_category(cat), 1);

    store.category_delete(cat).unwrap();
    assert!(store.category_find_by_id(cat).is_none());
    assert_eq!(store.post_find_by_id(post).unwrap().category_id, None);
}

#[test]
fn category_requires_name() {
    let store = test_store();
    assert_eq!(
        store
            .category_create(&CategoryForm { name: " ".into(), description: None })
            .unwrap_err(),
        "Category name is required"
    );
}

#[test]
fn tag_find_or_create_is_idempotent() {
    let store = test_store();
    let first = store.tag_find_or_create("Databases").unwrap();
    let second = store.tag_find_or_create("Databases").unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.slug, "databases");
    assert_eq!(store.tag_count(), 1);

    let other = store.tag_create(&TagForm { name: "Other".into() }).unwrap();
    store.tag_update(other, &TagForm { name: "Renamed Tag".into() }).unwrap();
    assert_eq!(store.tag_find_by_id(other).unwrap().slug, "renamed-tag");
}

// ═══════════════════════════════════════════════════════════
// Comments
// ═══════════════════════════════════════════════════════════

#[test]
fn comment_honeypot_and_required_fields() {
    let store = test_store();
    let author = make_user(&*store, "pete", "AUTHOR");
    let post = store.post_create(author, &post_form("Discussed", "PUBLISHED")).unwrap();

    let mut bot = guest_comment(post, "buy now");
    bot.honeypot = Some("http://spam".into());
    assert_eq!(store.comment_create(&bot).unwrap_err(), "Spam detected");

    let mut nameless = guest_comment(post, "hello");
    nameless.guest_name = None;
    assert_eq!(store.comment_create(&nameless).unwrap_err(), "Guest name is required");

    assert_eq!(
        store.comment_create(&guest_comment(post, "   ")).unwrap_err(),
        "Comment content is required"
    );
    assert_eq!(
        store.comment_create(&guest_comment(9999, "hi")).unwrap_err(),
        "Post not found"
    );
}

#[test]
fn comment_moderation_flow() {
    let store = test_store();
    let author = make_user(&*store, "quinn", "AUTHOR");
    let post = store.post_create(author, &post_form("Moderated", "PUBLISHED")).unwrap();
    let c1 = store.comment_create(&guest_comment(post, "one")).unwrap();
    store.comment_create(&guest_comment(post, "two")).unwrap();

    assert_eq!(store.comment_find_by_id(c1).unwrap().status, "PENDING");
    assert_eq!(store.comment_count_for_post(post, true), 0);
    assert_eq!(store.comment_count_for_post(post, false), 2);
    assert_eq!(store.post_find_by_id(post).unwrap().comment_count, 2);

    store.comment_update_status(c1, "approved").unwrap();
    let visible = store.comment_for_post(post, true, 10, 0);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, c1);
    assert_eq!(store.comment_count(Some("PENDING")), 1);

    store.comment_delete(c1).unwrap();
    assert_eq!(store.post_find_by_id(post).unwrap().comment_count, 1);
}

#[test]
fn comment_rules_per_post() {
    let store = test_store();
    let author = make_user(&*store, "rosa", "AUTHOR");
    let a = store.post_create(author, &post_form("Post A", "PUBLISHED")).unwrap();
    let mut closed = post_form("Post B", "PUBLISHED");
    closed.allow_comment = Some(false);
    let b = store.post_create(author, &closed).unwrap();

    assert_eq!(
        store.comment_create(&guest_comment(b, "hi")).unwrap_err(),
        "Comments are disabled for this post"
    );

    let parent = store.comment_create(&guest_comment(a, "parent")).unwrap();
    let mut reply = guest_comment(a, "reply");
    reply.parent_id = Some(parent);
    assert!(store.comment_create(&reply).is_ok());

    let c = store.post_create(author, &post_form("Post C", "PUBLISHED")).unwrap();
    let mut stray = guest_comment(c, "stray");
    stray.parent_id = Some(parent);
    assert_eq!(
        store.comment_create(&stray).unwrap_err(),
        "Parent comment belongs to another post"
    );
}

// ═══════════════════════════════════════════════════════════
// Pages & attachments
// ═══════════════════════════════════════════════════════════

#[test]
fn page_lifecycle() {
    let store = test_store();
    let author = make_user(&*store, "sam", "AUTHOR");
    let id = store
        .page_create(author, &PageForm { title: Some("About Me".into()), ..Default::default() })
        .unwrap();
    assert_eq!(store.page_find_by_slug("about-me").unwrap().status, "DRAFT");
    assert_eq!(store.page_count(true), 0);

    store
        .page_update(id, &PageForm { status: Some("PUBLISHED".into()), ..Default::default() })
        .unwrap();
    assert_eq!(store.page_count(true), 1);
    store.page_increment_views(id).unwrap();
    assert_eq!(store.page_find_by_id(id).unwrap().view_count, 1);
    store.page_delete(id).unwrap();
    assert!(store.page_find_by_id(id).is_none());
}

#[test]
fn attachment_records() {
    use crate::models::attachment::{Attachment, AttachmentForm};
    let store = test_store();
    let uploader = make_user(&*store, "tina", "AUTHOR");
    let form = AttachmentForm {
        name: "photo.png".into(),
        path: "website/uploads/image/x.png".into(),
        url: "/api/uploads/image/x.png".into(),
        suffix: Some("png".into()),
        size: Some(1024),
        r#type: Some(Attachment::type_for_suffix("png").to_string()),
        ..Default::default()
    };
    let id = store.attachment_create(uploader, &form).unwrap();
    assert_eq!(store.attachment_by_type("IMAGE").len(), 1);
    assert_eq!(store.attachment_by_uploader(uploader).len(), 1);
    store.attachment_rename(id, "cover.png").unwrap();
    assert_eq!(store.attachment_find_by_id(id).unwrap().name, "cover.png");

    assert_eq!(store.attachment_create(9999, &form).unwrap_err(), "Uploader not found");
    assert_eq!(Attachment::type_for_suffix("PDF"), "DOCUMENT");
}

// ═══════════════════════════════════════════════════════════
// Upload helpers
// ═══════════════════════════════════════════════════════════

#[test]
fn upload_names_and_sizes() {
    assert!(uploads::validate_type("image").is_ok());
    assert!(uploads::validate_type("../etc").is_err());
    assert_eq!(uploads::allowed_extension("Photo.JPG").unwrap(), "jpg");
    assert_eq!(uploads::allowed_extension("notes").unwrap_err(), "File has no extension");
    assert_eq!(uploads::allowed_extension("run.exe").unwrap_err(), "File type not allowed: exe");
    assert_eq!(uploads::allowed_extension("").unwrap_err(), "File name is required");
    assert_eq!(uploads::check_size(0).unwrap_err(), "File is empty");
    assert!(uploads::check_size(uploads::MAX_UPLOAD_BYTES).is_ok());
    assert!(uploads::check_size(uploads::MAX_UPLOAD_BYTES + 1).is_err());
}

#[test]
fn upload_paths_stay_inside_base() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    assert_eq!(
        uploads::resolve(base, "image", "a.png"),
        Some(base.join("image").join("a.png"))
    );
    assert!(uploads::resolve(base, "image", "../a.png").is_none());
    assert!(uploads::resolve(base, "image", "sub/a.png").is_none());
    assert!(uploads::resolve(base, "..", "a.png").is_none());

    let inside = base.join("image");
    fs::create_dir_all(&inside).unwrap();
    fs::write(inside.join("a.png"), b"png").unwrap();
    let outside = tempfile::NamedTempFile::new().unwrap();

    assert!(!uploads::remove_if_contained(base, &outside.path().to_string_lossy()));
    assert!(outside.path().exists());
    assert!(uploads::remove_if_contained(base, &inside.join("a.png").to_string_lossy()));
    assert!(!inside.join("a.png").exists());
}

#[test]
fn upload_delete_drops_attachment_record() {
    use crate::models::attachment::AttachmentForm;

    let store = test_store();
    let uploader = make_user(&*store, "ulla", "AUTHOR");
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path();
    fs::create_dir_all(base.join("image")).unwrap();
    fs::write(base.join("image/b.png"), b"png").unwrap();

    let form = AttachmentForm {
        name: "b.png".into(),
        path: base.join("image/b.png").to_string_lossy().to_string(),
        url: "/api/uploads/image/b.png".into(),
        ..Default::default()
    };
    let id = store.attachment_create(uploader, &form).unwrap();

    assert_eq!(uploads::remove_upload(&*store, base, "image", "b.png").unwrap(), 1);
    assert!(store.attachment_find_by_id(id).is_none());
    assert!(!base.join("image/b.png").exists());
    assert_eq!(
        uploads::remove_upload(&*store, base, "image", "b.png").unwrap_err(),
        "File not found"
    );
}

// ═══════════════════════════════════════════════════════════
// Rate limiter
// ═══════════════════════════════════════════════════════════

#[test]
fn rate_limiter_blocks_after_max() {
    let limiter = RateLimiter::new();
    for _ in 0..3 {
        assert!(limiter.attempt(Bucket::Login, "abc", 3).is_ok());
    }
    let wait = limiter.attempt(Bucket::Login, "abc", 3).unwrap_err();
    assert!(wait > Duration::ZERO && wait <= Bucket::Login.window());
    assert_eq!(limiter.remaining(Bucket::Login, "abc", 3), 0);
    assert!(limiter.attempt(Bucket::Login, "other", 3).is_ok());
    // buckets are tracked separately for the same client
    assert!(limiter.attempt(Bucket::Register, "abc", 3).is_ok());
}

#[test]
fn rate_limiter_reads_limit_from_settings() {
    let store = test_store();
    store.setting_set("comments_rate_limit", "2").unwrap();
    let limiter = RateLimiter::new();
    assert!(limiter.check(&*store, Bucket::Comment, "ip").is_ok());
    assert!(limiter.check(&*store, Bucket::Comment, "ip").is_ok());
    assert!(limiter.check(&*store, Bucket::Comment, "ip").is_err());
}

#[test]
fn rate_limiter_cleanup_keeps_live_clients() {
    let limiter = RateLimiter::new();
    assert_eq!(limiter.remaining(Bucket::Comment, "x", 1), 1);
    limiter.attempt(Bucket::Comment, "x", 1).unwrap();
    assert_eq!(limiter.cleanup(), 1);
    assert_eq!(limiter.remaining(Bucket::Comment, "x", 1), 0);
}

// ═══════════════════════════════════════════════════════════
// External tools
// ═══════════════════════════════════════════════════════════

#[test]
fn tools_seeded_once() {
    let store = test_store();
    assert_eq!(store.tool_count(), 8);
    assert_eq!(store.tool_seed_defaults().unwrap(), 0);
    assert_eq!(store.tool_list_active().len(), 8);
    assert_eq!(store.tool_by_category("search").unwrap().len(), 2);
    assert!(store.tool_by_category("weather").unwrap_err().contains("Invalid category"));
    assert!(!store.tool_search("GitHub").is_empty());
}

// ═══════════════════════════════════════════════════════════
// News
// ═══════════════════════════════════════════════════════════

#[test]
fn news_categories_are_normalized() {
    let store = test_store();
    let id = store
        .news_create(&NewsForm { title: Some("Plain".into()), ..Default::default() })
        .unwrap();
    assert_eq!(store.news_find_by_id(id).unwrap().category, "OTHER");

    store
        .news_create(&NewsForm {
            title: Some("Markets up".into()),
            category: Some("finance".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(store.news_by_category("Finance", 10, 0).unwrap().len(), 1);
    assert_eq!(store.news_count_by_category("finance"), 1);
    assert!(store
        .news_create(&NewsForm {
            title: Some("x".into()),
            category: Some("gossip".into()),
            ..Default::default()
        })
        .is_err());
    assert_eq!(
        store.news_create(&NewsForm::default()).unwrap_err(),
        "Title is required"
    );
}

#[test]
fn news_hot_ordering() {
    let store = test_store();
    for (title, score) in [("low", 10), ("high", 90), ("mid", 50)] {
        store
            .news_create(&NewsForm {
                title: Some(title.into()),
                is_hot: Some(true),
                hot_score: Some(score),
                ..Default::default()
            })
            .unwrap();
    }
    store
        .news_create(&NewsForm { title: Some("cold".into()), ..Default::default() })
        .unwrap();
    let hot: Vec<String> = store.news_hot(10).into_iter().map(|n| n.title).collect();
    assert_eq!(hot, vec!["high", "mid", "low"]);
}

#[test]
fn hacker_news_story_mapping() {
    let story = HnStory { title: Some("Show HN: Thing".into()), url: Some("https://x.dev".into()), score: 150 };
    let form = news_fetch::story_form(&story).unwrap();
    assert_eq!(form.category.as_deref(), Some("TECHNOLOGY"));
    assert_eq!(form.is_hot, Some(true));
    assert_eq!(form.summary.as_deref(), Some("From Hacker News - Score: 150"));
    assert_eq!(form.content.as_deref(), Some("Read full article at: https://x.dev"));

    let quiet = HnStory { title: Some("Ask HN".into()), url: None, score: 3 };
    let form = news_fetch::story_form(&quiet).unwrap();
    assert_eq!(form.is_hot, Some(false));
    assert_eq!(form.content.as_deref(), Some("Read full article at: N/A"));

    assert!(news_fetch::story_form(&HnStory::default()).is_none());
}

#[test]
fn hacker_news_stories_are_deduplicated() {
    let store = test_store();
    let story = HnStory { title: Some("Same story".into()), url: None, score: 20 };
    assert!(news_fetch::store_story(&*store, &story).is_some());
    assert!(news_fetch::store_story(&*store, &story).is_none());
    assert!(store.news_find_by_title_source("Same story", HN_SOURCE).is_some());
    assert_eq!(store.news_count(), 1);
}

#[test]
fn sample_news_refreshes_instead_of_duplicating() {
    let store = test_store();
    let first = news_fetch::sample_news(&*store);
    assert_eq!(first.len(), 8);
    assert!(first.iter().all(|n| n.is_hot && (50..150).contains(&n.hot_score)));
    let second = news_fetch::sample_news(&*store);
    assert_eq!(second.len(), 8);
    assert_eq!(store.news_count(), 8);
}

// ═══════════════════════════════════════════════════════════
// Stocks
// ═══════════════════════════════════════════════════════════

#[test]
fn market_detection() {
    assert_eq!(stock_fetch::determine_market("00700"), "HK");
    assert_eq!(stock_fetch::determine_market("600519"), "SH");
    assert_eq!(stock_fetch::determine_market("000858"), "SZ");
    assert_eq!(stock_fetch::determine_market("300750"), "SZ");
    assert_eq!(stock_fetch::determine_market("AAPL"), "US");
    assert_eq!(stock_fetch::determine_market("BRK.B"), "OTHER");
}

#[test]
fn base_prices_are_deterministic() {
    for (symbol, _, _, market) in POPULAR_STOCKS {
        let price = stock_fetch::base_price(symbol, market);
        assert_eq!(price, stock_fetch::base_price(symbol, market));
        match *market {
            "SH" | "SZ" => assert!((10.0..2000.0).contains(&price)),
            _ => assert!((50.0..500.0).contains(&price)),
        }
    }
    assert_eq!(stock_fetch::base_price("XYZ", "OTHER"), 100.0);
}

#[test]
fn simulated_quotes_stay_in_band() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let q = stock_fetch::simulated_quote(&mut rng, "AAPL", "苹果", "Apple Inc.", "US");
        let base = q.prev_close.unwrap();
        let price = q.price.unwrap();
        let pct = q.change_percent.unwrap();
        assert!((-5.0..=5.0).contains(&pct));
        assert!((price - base).abs() <= base * 0.05 + 0.01);
        assert!(q.high.unwrap() >= price);
        assert!(q.low.unwrap() <= price);
    }
}

#[test]
fn quote_payload_aliases() {
    let node = json!({ "name": "平安银行", "now": "12.50", "yestClose": 12.0, "vol": 1234.0 });
    let q = stock_fetch::parse_quote("000001", &node);
    assert_eq!(q.symbol, "000001");
    assert_eq!(q.market.as_deref(), Some("SZ"));
    assert_eq!(q.price, Some(12.5));
    assert_eq!(q.change_amount, Some(0.5));
    assert_eq!(q.change_percent, Some(4.17));
    assert_eq!(q.volume, Some(1234));

    let explicit = json!({ "code": "600000", "price": 10.0, "preClose": 9.0, "change": 1.11, "pctChg": 2.22 });
    let q = stock_fetch::parse_quote("ignored", &explicit);
    assert_eq!(q.symbol, "600000");
    assert_eq!(q.change_amount, Some(1.11));
    assert_eq!(q.change_percent, Some(2.22));
}

#[test]
fn stock_upsert_patches_existing_rows() {
    let store = test_store();
    let id = store
        .stock_upsert(&StockQuote {
            symbol: "tsla".into(),
            name: Some("Tesla".into()),
            market: Some("us".into()),
            price: Some(200.123),
            prev_close: Some(190.0),
            ..Default::default()
        })
        .unwrap();
    let again = store
        .stock_upsert(&StockQuote { symbol: "TSLA".into(), price: Some(210.0), ..Default::default() })
        .unwrap();
    assert_eq!(id, again);
    let stock = store.stock_find_by_symbol("tsla").unwrap();
    assert_eq!(stock.name.as_deref(), Some("Tesla"));
    assert_eq!(stock.market, "US");
    assert_eq!(stock.price, Some(210.0));

    store.stock_update_price("TSLA", 200.0).unwrap();
    let stock = store.stock_find_by_id(id).unwrap();
    assert_eq!(stock.change_amount, Some(10.0));
    assert_eq!(stock.change_percent, Some(5.26));

    assert_eq!(store.stock_update_price("NOPE", 1.0).unwrap_err(), "Stock not found");
    assert!(store.stock_by_market("mars").is_err());
}

#[test]
fn popular_refresh_fills_overview() {
    let store = test_store();
    let stored = stock_fetch::refresh_popular(&*store);
    assert_eq!(stored.len(), POPULAR_STOCKS.len());
    assert!(stored.iter().all(|s| s.is_hot && (1..=20).contains(&s.hot_rank)));

    let overview = store.stock_market_overview();
    let markets: Vec<&str> = overview.iter().map(|m| m.market.as_str()).collect();
    assert_eq!(markets, vec!["SH", "SZ", "HK", "US"]);
    assert_eq!(overview.iter().map(|m| m.count).sum::<i64>(), POPULAR_STOCKS.len() as i64);

    let gainers = store.stock_gainers(50);
    assert!(gainers.windows(2).all(|w| w[0].change_percent >= w[1].change_percent));
}

// ═══════════════════════════════════════════════════════════
// Theme manifest
// ═══════════════════════════════════════════════════════════

const SAMPLE_MANIFEST: &str = r##"
id: sample
name: Sample
version: "0.1"
author:
  name: Tester
settings:
  - group: look
    items:
      - name: accent
        type: color
        defaultValue: "#ff0000"
      - name: columns
        type: number
        defaultValue: 2
        min: 1
        max: 3
      - name: layout
        type: select
        options:
          - { label: Wide, value: wide }
          - { label: Narrow, value: narrow }
      - name: compact
        type: switch
"##;

#[test]
fn manifest_parses_typed_defaults() {
    let m = ThemeManifest::parse(SAMPLE_MANIFEST).unwrap();
    assert_eq!(m.id, "sample");
    assert_eq!(m.i18n.default_locale, "en");
    let defaults = m.defaults();
    assert_eq!(defaults["accent"], json!("#ff0000"));
    assert_eq!(defaults["columns"], json!(2));
    assert_eq!(defaults["layout"], json!("wide"));
    assert_eq!(defaults["compact"], json!(false));
    assert_eq!(m.meta().author.as_deref(), Some("Tester"));
}

#[test]
fn manifest_rejects_bad_definitions() {
    assert!(ThemeManifest::parse("name: No Id").unwrap_err().contains("id is required"));
    assert!(ThemeManifest::parse("id: Bad Id").unwrap_err().contains("Invalid theme id"));

    let dup = "id: t\nsettings:\n  - group: g\n    items:\n      - {name: a, type: text}\n      - {name: a, type: text}\n";
    assert!(ThemeManifest::parse(dup).unwrap_err().contains("Duplicate setting"));

    let color = "id: t\nsettings:\n  - group: g\n    items:\n      - {name: c, type: color, defaultValue: red}\n";
    assert!(ThemeManifest::parse(color).unwrap_err().contains("hex color"));

    let select = "id: t\nsettings:\n  - group: g\n    items:\n      - name: s\n        type: select\n        defaultValue: x\n        options: [{label: A, value: a}]\n";
    assert!(ThemeManifest::parse(select).unwrap_err().contains("not one of its options"));

    let range = "id: t\nsettings:\n  - group: g\n    items:\n      - {name: n, type: number, defaultValue: 9, max: 5}\n";
    assert!(ThemeManifest::parse(range).unwrap_err().contains("at most"));

    let kind = "id: t\nsettings:\n  - group: g\n    items:\n      - {name: n, type: slider}\n";
    assert!(ThemeManifest::parse(kind).unwrap_err().contains("Unknown setting type"));
}

#[test]
fn manifest_validates_submitted_settings() {
    let m = ThemeManifest::parse(SAMPLE_MANIFEST).unwrap();
    let mut submitted = Map::new();
    submitted.insert("compact".into(), json!("yes"));
    submitted.insert("columns".into(), json!("3"));
    let out = m.validate_settings(&submitted).unwrap();
    assert_eq!(out["compact"], json!(true));
    assert_eq!(out["columns"], json!(3));

    let mut bad = Map::new();
    bad.insert("columns".into(), json!(4));
    assert!(m.validate_settings(&bad).unwrap_err().contains("at most"));

    let mut unknown = Map::new();
    unknown.insert("mystery".into(), json!(1));
    assert_eq!(m.validate_settings(&unknown).unwrap_err(), "Unknown setting: mystery");

    let mut option = Map::new();
    option.insert("layout".into(), json!("tall"));
    assert!(m.validate_settings(&option).is_err());
}

#[test]
fn manifest_number_settings_must_be_finite() {
    let m = ThemeManifest::parse(SAMPLE_MANIFEST).unwrap();
    for raw in ["NaN", "inf", "-infinity"] {
        let mut submitted = Map::new();
        submitted.insert("columns".into(), json!(raw));
        assert!(m.validate_settings(&submitted).unwrap_err().contains("finite"), "{}", raw);
    }

    let nan_default = "id: t\nsettings:\n  - group: g\n    items:\n      - {name: n, type: number, defaultValue: .nan, min: 0, max: 5}\n";
    assert!(ThemeManifest::parse(nan_default).unwrap_err().contains("finite"));

    let inf_bound = "id: t\nsettings:\n  - group: g\n    items:\n      - {name: n, type: number, defaultValue: 1, max: .inf}\n";
    assert!(ThemeManifest::parse(inf_bound).unwrap_err().contains("non-finite"));
}

// ═══════════════════════════════════════════════════════════
// i18n
// ═══════════════════════════════════════════════════════════

#[test]
fn properties_parsing() {
    let text = "# comment\n! also a comment\nkey1=value1\nkey2 : value2\nkey3 value3\nmulti=first \\\n    second\nesc=tab\\there\\nnew\nuni=\\u4F60\\u597D\n";
    let p = parse_properties(text);
    assert_eq!(p["key1"], "value1");
    assert_eq!(p["key2"], "value2");
    assert_eq!(p["key3"], "value3");
    assert_eq!(p["multi"], "first second");
    assert_eq!(p["esc"], "tab\there\nnew");
    assert_eq!(p["uni"], "你好");
    assert_eq!(p.len(), 6);
}

#[test]
fn properties_decode_surrogate_pairs() {
    let p = parse_properties("smile=\\uD83D\\uDE00!\nlone=a\\uD83Db\nbad=\\uZZZZ\n");
    assert_eq!(p["smile"], "\u{1F600}!");
    assert_eq!(p["lone"], "a\u{FFFD}b");
    assert_eq!(p["bad"], "\\uZZZZ");
}

fn write_messages(root: &Path, theme: &str, file: &str, body: &str) {
    let dir = root.join(theme).join("i18n");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), body).unwrap();
}

#[test]
fn translation_fallback_chain() {
    let dir = tempfile::tempdir().unwrap();
    write_messages(dir.path(), "t1", "messages.properties", "greet=Hello {0}\nonly.default=D\n");
    write_messages(dir.path(), "t1", "messages_zh_CN.properties", "greet=你好 {0}\n");
    write_messages(dir.path(), "t1", "messages_fr.properties", "greet=Bonjour {0}\n");
    let t = Translations::new(dir.path());

    assert_eq!(t.translate("t1", "zh-CN", "greet"), "你好 {0}");
    assert_eq!(t.translate("t1", "zh-CN", "only.default"), "D");
    assert_eq!(t.translate("t1", "fr-CA", "greet"), "Bonjour {0}");
    assert_eq!(t.translate("t1", "de", "missing.key"), "missing.key");
    assert_eq!(t.translate_with("t1", "en", "greet", &["Bob"]), "Hello Bob");
    assert_eq!(t.available_locales("t1"), vec!["en", "fr", "zh-CN"]);

    let merged = t.messages("t1", "zh-CN");
    assert_eq!(merged["greet"], "你好 {0}");
    assert_eq!(merged["only.default"], "D");
}

#[test]
fn translation_cache_reload() {
    let dir = tempfile::tempdir().unwrap();
    write_messages(dir.path(), "t2", "messages.properties", "title=Old\n");
    let t = Translations::new(dir.path());
    assert_eq!(t.translate("t2", "en", "title"), "Old");

    write_messages(dir.path(), "t2", "messages.properties", "title=New\n");
    assert_eq!(t.translate("t2", "en", "title"), "Old");
    t.clear_cache("t2");
    assert_eq!(t.translate("t2", "en", "title"), "New");

    write_messages(dir.path(), "t2", "messages.properties", "title=Newer\n");
    t.reload("t2");
    assert_eq!(t.translate("t2", "en", "title"), "Newer");
}

#[test]
fn messages_nest_by_dots() {
    let mut flat = HashMap::new();
    flat.insert("nav.home".to_string(), "Home".to_string());
    flat.insert("a".to_string(), "leaf".to_string());
    flat.insert("a.b".to_string(), "shadowed".to_string());
    flat.insert("x.y.z".to_string(), "deep".to_string());
    let nested = nest_messages(&flat);
    assert_eq!(nested["nav"]["home"], json!("Home"));
    assert_eq!(nested["a"], json!("leaf"));
    assert_eq!(nested["x"]["y"]["z"], json!("deep"));
}

// ═══════════════════════════════════════════════════════════
// Theme registry & install
// ═══════════════════════════════════════════════════════════

const MINIMAL_MANIFEST: &str = "id: minimal\nname: Minimal\nversion: \"1.0\"\n";
const MINIMAL_INDEX: &str = "<h1>{{ site.title }}</h1>{% for p in posts %}<p>{{ p.title }}</p>{% endfor %}";
const MINIMAL_POST: &str = "<h1>{{ post.title }}</h1>";

fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = zip::write::SimpleFileOptions::default();
    for (name, body) in files {
        w.start_file(*name, opts).unwrap();
        w.write_all(body.as_bytes()).unwrap();
    }
    w.finish().unwrap().into_inner()
}

fn minimal_theme_zip(prefix: &str) -> Vec<u8> {
    let manifest = format!("{}theme.yaml", prefix);
    let index = format!("{}templates/index.html", prefix);
    let post = format!("{}templates/post.html", prefix);
    zip_bytes(&[
        (manifest.as_str(), MINIMAL_MANIFEST),
        (index.as_str(), MINIMAL_INDEX),
        (post.as_str(), MINIMAL_POST),
    ])
}

fn no_staging_left(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .all(|e| !e.file_name().to_string_lossy().starts_with(".staging-"))
        })
        .unwrap_or(true)
}

#[test]
fn registry_requires_index_and_post() {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(templates.join("index.html"), MINIMAL_INDEX).unwrap();
    assert_eq!(
        TemplateRegistry::compile(dir.path()).unwrap_err(),
        "Missing required template: post.html"
    );

    fs::write(templates.join("post.html"), MINIMAL_POST).unwrap();
    let registry = TemplateRegistry::new();
    registry.load("minimal", dir.path()).unwrap();
    assert!(registry.contains("minimal"));
    assert_eq!(registry.template_names("minimal"), vec!["index.html", "post.html"]);
    assert!(registry.render("minimal", "missing", &Default::default()).is_err());
    registry.unload("minimal");
    assert!(!registry.contains("minimal"));
}

#[test]
fn registry_reports_syntax_errors() {
    let dir = tempfile::tempdir().unwrap();
    let templates = dir.path().join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(templates.join("index.html"), "{% for p in posts %}").unwrap();
    fs::write(templates.join("post.html"), MINIMAL_POST).unwrap();
    assert!(TemplateRegistry::compile(dir.path()).is_err());
}

#[test]
fn install_from_nested_folder() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = install_archive(&minimal_theme_zip("minimal-main/"), dir.path(), &|_| false).unwrap();
    assert_eq!(manifest.id, "minimal");
    assert!(dir.path().join("minimal/templates/index.html").is_file());
    assert!(no_staging_left(dir.path()));
}

#[test]
fn install_rejects_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let bytes = zip_bytes(&[
        ("theme.yaml", MINIMAL_MANIFEST),
        ("templates/index.html", MINIMAL_INDEX),
        ("templates/post.html", MINIMAL_POST),
        ("../escape.html", "gotcha"),
    ]);
    let err = install_archive(&bytes, &dir.path().join("themes"), &|_| false).unwrap_err();
    assert!(err.contains("unsafe path"));
    assert!(!dir.path().join("escape.html").exists());
    assert!(!dir.path().join("themes/minimal").exists());
}

#[test]
fn install_rejects_absolute_paths_and_symlinks() {
    let dir = tempfile::tempdir().unwrap();
    let absolute = zip_bytes(&[("theme.yaml", MINIMAL_MANIFEST), ("/tmp/evil.html", "x")]);
    assert!(install_archive(&absolute, dir.path(), &|_| false).unwrap_err().contains("unsafe path"));

    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = zip::write::SimpleFileOptions::default();
    w.start_file("theme.yaml", opts).unwrap();
    w.write_all(MINIMAL_MANIFEST.as_bytes()).unwrap();
    w.add_symlink("templates", "/etc", opts).unwrap();
    let bytes = w.finish().unwrap().into_inner();
    assert!(install_archive(&bytes, dir.path(), &|_| false).unwrap_err().contains("symlink"));
    assert!(no_staging_left(dir.path()));
}

#[test]
fn install_rejects_broken_packages() {
    let dir = tempfile::tempdir().unwrap();
    assert!(install_archive(b"not a zip", dir.path(), &|_| false).unwrap_err().contains("Invalid zip"));

    let no_manifest = zip_bytes(&[("templates/index.html", MINIMAL_INDEX)]);
    assert!(install_archive(&no_manifest, dir.path(), &|_| false)
        .unwrap_err()
        .contains("theme.yaml not found"));

    let no_post = zip_bytes(&[("theme.yaml", MINIMAL_MANIFEST), ("templates/index.html", MINIMAL_INDEX)]);
    assert!(install_archive(&no_post, dir.path(), &|_| false)
        .unwrap_err()
        .contains("Missing required template"));

    assert!(install_archive(&minimal_theme_zip(""), dir.path(), &|id| id == "minimal")
        .unwrap_err()
        .contains("already exists"));
    assert!(no_staging_left(dir.path()));
    assert!(!dir.path().join("minimal").exists());
}

// ═══════════════════════════════════════════════════════════
// Theme engine
// ═══════════════════════════════════════════════════════════

fn test_engine() -> (tempfile::TempDir, Arc<dyn Store>, ThemeEngine) {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store();
    let engine = ThemeEngine::new(Arc::clone(&store), dir.path().join("themes"));
    engine.init().unwrap();
    (dir, store, engine)
}

fn active_count(store: &dyn Store) -> usize {
    store.theme_list().iter().filter(|t| t.is_active).count()
}

#[test]
fn engine_init_registers_default() {
    let (_dir, store, engine) = test_engine();
    assert_eq!(engine.active_theme_id(), "default");
    let record = store.theme_find_active().unwrap();
    assert_eq!(record.theme_id, "default");
    assert_eq!(record.status, "ENABLED");
    assert_eq!(engine.locales("default").unwrap(), vec!["en", "zh-CN"]);

    // A second init is a no-op for the registry
    engine.init().unwrap();
    assert_eq!(store.theme_list().len(), 1);
}

#[test]
fn engine_install_and_activate_keeps_one_active() {
    let (_dir, store, engine) = test_engine();
    let record = engine.install(&minimal_theme_zip("")).unwrap();
    assert_eq!(record.theme_id, "minimal");
    assert!(!record.is_active);

    engine.activate("minimal").unwrap();
    assert_eq!(engine.active_theme_id(), "minimal");
    assert_eq!(active_count(&*store), 1);
    assert_eq!(store.theme_find_active().unwrap().theme_id, "minimal");

    engine.activate("default").unwrap();
    assert_eq!(active_count(&*store), 1);

    let dup = engine.install(&minimal_theme_zip("")).unwrap_err();
    assert!(dup.contains("already exists"));
}

#[test]
fn engine_concurrent_activate_and_disable_keep_active_enabled() {
    let (_dir, store, engine) = test_engine();
    engine.install(&minimal_theme_zip("")).unwrap();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let engine = &engine;
            scope.spawn(move || {
                for _ in 0..10 {
                    let _ = match i % 4 {
                        0 => engine.activate("minimal").map(|_| ()),
                        1 => engine.disable("minimal"),
                        2 => engine.enable("minimal"),
                        _ => engine.activate("default").map(|_| ()),
                    };
                }
            });
        }
    });

    let active = store.theme_find_active().unwrap();
    assert_eq!(active.status, "ENABLED");
    assert_eq!(active.theme_id, engine.active_theme_id());
    assert_eq!(active_count(&*store), 1);
}

#[test]
fn engine_guards_state_changes() {
    let (_dir, store, engine) = test_engine();
    engine.install(&minimal_theme_zip("")).unwrap();

    assert_eq!(engine.disable("default").unwrap_err(), "Cannot disable the active theme");
    assert_eq!(engine.delete("default").unwrap_err(), "Cannot delete the default theme");

    engine.disable("minimal").unwrap();
    assert_eq!(engine.activate("minimal").unwrap_err(), "Theme is not enabled");
    engine.enable("minimal").unwrap();
    engine.activate("minimal").unwrap();
    assert_eq!(engine.delete("minimal").unwrap_err(), "Cannot delete the active theme");

    engine.activate("default").unwrap();
    engine.delete("minimal").unwrap();
    assert!(store.theme_find_by_theme_id("minimal").is_none());
    assert!(!engine.themes_dir().join("minimal").exists());
    assert!(engine.activate("minimal").unwrap_err().contains("not found"));
    assert!(engine.activate("../etc").unwrap_err().contains("not found"));
}

#[test]
fn engine_settings_layering() {
    let (_dir, _store, engine) = test_engine();
    let defaults = engine.default_settings("default").unwrap();
    assert_eq!(defaults["primaryColor"], json!("#6366f1"));

    let mut submitted = Map::new();
    submitted.insert("primaryColor".into(), json!("#fff"));
    submitted.insert("postsPerRow".into(), json!(3));
    let effective = engine.update_settings("default", &submitted).unwrap();
    assert_eq!(effective["primaryColor"], json!("#fff"));
    assert_eq!(effective["postsPerRow"], json!(3));
    assert_eq!(effective["darkMode"], json!(true));

    let mut bad = Map::new();
    bad.insert("postsPerRow".into(), json!(9));
    assert!(engine.update_settings("default", &bad).is_err());
    assert_eq!(engine.effective_settings("default").unwrap()["postsPerRow"], json!(3));

    let schema = engine.settings_schema("default").unwrap();
    assert_eq!(schema.len(), 3);
}

#[test]
fn engine_renders_index_and_post() {
    let (_dir, store, engine) = test_engine();
    let author = make_user(&*store, "uma", "AUTHOR");
    let id = store.post_create(author, &post_form("Rendered Post", "PUBLISHED")).unwrap();
    store.post_create(author, &post_form("Secret Draft", "DRAFT")).unwrap();

    let opts = RenderOptions { base: String::new(), locale: Some("zh-CN".into()), user: None };
    let html = engine.render_index("default", PageRequest::default(), &opts).unwrap();
    assert!(html.contains("Rendered Post"));
    assert!(!html.contains("Secret Draft"));
    assert!(html.contains("最新文章"));
    assert!(html.contains("首页"));
    assert!(html.contains(r#"href="/themes/default/static/css/style.css""#));
    assert!(html.contains(r#"href="/posts/rendered-post""#));
    assert!(!html.contains("&#x2F;"));

    let post = store.post_view_by_id(id).unwrap();
    let opts = RenderOptions { base: "/themes/default".into(), locale: None, user: None };
    let html = engine.render_post("default", &post, &opts).unwrap();
    assert!(html.contains("<h1>Rendered Post</h1>"));
    assert!(html.contains("Latest Posts") || html.contains("Recent Posts"));
    assert!(html.contains(r#"href="/themes/default/posts/rendered-post""#));
    assert!(html.contains(r#"href="/themes/default" class="logo""#));
}

#[test]
fn engine_preview_is_escaped() {
    let (_dir, _store, engine) = test_engine();
    let preview = engine.preview("default", None).unwrap();
    assert!(preview.starts_with("&lt;!DOCTYPE html&gt;"));
    assert!(!preview.contains("<body"));
}

#[test]
fn engine_static_paths_are_contained() {
    let (_dir, _store, engine) = test_engine();
    assert!(engine.static_path("default", Path::new("css/style.css")).is_some());
    assert!(engine.static_path("default", Path::new("../theme.yaml")).is_none());
    assert!(engine.static_path("default", Path::new("css/missing.css")).is_none());
    assert!(engine.static_path("../default", Path::new("css/style.css")).is_none());
}

#[test]
fn engine_scan_marks_broken_themes() {
    let (_dir, store, engine) = test_engine();
    engine.install(&minimal_theme_zip("")).unwrap();
    fs::write(engine.themes_dir().join("minimal/templates/index.html"), "{% if %}").unwrap();
    engine.scan();
    assert_eq!(store.theme_find_by_theme_id("minimal").unwrap().status, "ERROR");

    fs::write(engine.themes_dir().join("minimal/templates/index.html"), MINIMAL_INDEX).unwrap();
    engine.scan();
    assert_eq!(store.theme_find_by_theme_id("minimal").unwrap().status, "ENABLED");

    let mismatched = engine.themes_dir().join("renamed");
    fs::create_dir_all(mismatched.join("templates")).unwrap();
    fs::write(mismatched.join("theme.yaml"), MINIMAL_MANIFEST).unwrap();
    fs::write(mismatched.join("templates/index.html"), MINIMAL_INDEX).unwrap();
    fs::write(mismatched.join("templates/post.html"), MINIMAL_POST).unwrap();
    engine.scan();
    assert!(store.theme_find_by_theme_id("renamed").is_none());
}

#[test]
fn site_context_from_settings() {
    let store = test_store();
    store.setting_set("site_social_github", "https://github.com/inkpot").unwrap();
    let site = crate::themes::context::site(&*store);
    assert_eq!(site["title"], Value::from("Inkpot"));
    assert_eq!(site["social"]["github"], json!("https://github.com/inkpot"));
}

// ═══════════════════════════════════════════════════════════
// Boot
// ═══════════════════════════════════════════════════════════

#[test]
fn boot_check_creates_data_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let report = crate::boot::check(dir.path());
    assert!(!report.is_fatal());
    assert!(dir.path().join(crate::boot::THEMES_DIR).is_dir());
    assert!(dir.path().join(crate::boot::UPLOADS_DIR).is_dir());
    assert!(dir.path().join("website/db").is_dir());
    // no server templates in a fresh directory
    assert_eq!(report.warnings, 2);
    assert!(!dir.path().join("website/db/.write_test").exists());
}

#[test]
fn task_interval_reads_minutes_from_settings() {
    let store = test_store();
    assert_eq!(crate::tasks::interval_minutes(&*store, "task_news_fetch_interval", 99), 30);
    store.setting_set("task_news_fetch_interval", "0").unwrap();
    assert_eq!(crate::tasks::interval_minutes(&*store, "task_news_fetch_interval", 99), 1);
    store.setting_set("task_news_fetch_interval", "soon").unwrap();
    assert_eq!(crate::tasks::interval_minutes(&*store, "task_news_fetch_interval", 99), 99);
}
