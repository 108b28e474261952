use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

pub const DB_PATH: &str = "website/db/inkpot.db";

pub fn init_pool() -> Result<DbPool, Box<dyn std::error::Error>> {
    init_pool_at(DB_PATH)
}

pub fn init_pool_at(path: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    // WAL for concurrent readers while the fetchers write
    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Accounts
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            nickname TEXT,
            avatar TEXT,
            description TEXT,
            role TEXT NOT NULL DEFAULT 'SUBSCRIBER',
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL,
            ip_hash TEXT,
            user_agent TEXT,
            expires_at DATETIME NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

        -- Taxonomy
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY,
            name TEXT UNIQUE NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Blog posts
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            summary TEXT,
            content TEXT,
            original_content TEXT,
            thumbnail TEXT,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            author_id INTEGER,
            category_id INTEGER,
            view_count INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            comment_count INTEGER NOT NULL DEFAULT 0,
            top_priority INTEGER NOT NULL DEFAULT 0,
            allow_comment INTEGER NOT NULL DEFAULT 1,
            published_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status, published_at);

        -- Many-to-many: posts <-> tags
        CREATE TABLE IF NOT EXISTS post_tags (
            post_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            UNIQUE(post_id, tag_id)
        );

        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            post_id INTEGER NOT NULL,
            user_id INTEGER,
            guest_name TEXT,
            guest_email TEXT,
            content TEXT NOT NULL,
            parent_id INTEGER,
            ip_address TEXT,
            user_agent TEXT,
            status TEXT NOT NULL DEFAULT 'PENDING',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);

        -- Static pages
        CREATE TABLE IF NOT EXISTS pages (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT UNIQUE NOT NULL,
            content TEXT,
            original_content TEXT,
            author_id INTEGER,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            view_count INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Uploaded media
        CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            url TEXT NOT NULL,
            media_type TEXT,
            suffix TEXT,
            size INTEGER NOT NULL DEFAULT 0,
            width INTEGER NOT NULL DEFAULT 0,
            height INTEGER NOT NULL DEFAULT 0,
            uploader_id INTEGER NOT NULL,
            type TEXT NOT NULL DEFAULT 'OTHER',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Sidebar link directory
        CREATE TABLE IF NOT EXISTS external_tools (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            url TEXT NOT NULL,
            icon TEXT,
            icon_bg_color TEXT,
            category TEXT NOT NULL DEFAULT 'OTHER',
            display_order INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Hot news widget
        CREATE TABLE IF NOT EXISTS news (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            summary TEXT,
            content TEXT,
            source TEXT,
            source_url TEXT,
            thumbnail TEXT,
            category TEXT NOT NULL DEFAULT 'OTHER',
            view_count INTEGER NOT NULL DEFAULT 0,
            is_hot INTEGER NOT NULL DEFAULT 0,
            hot_score INTEGER NOT NULL DEFAULT 0,
            published_at DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_news_title_source ON news(title, source);

        -- Stock quote widget
        CREATE TABLE IF NOT EXISTS stocks (
            id INTEGER PRIMARY KEY,
            symbol TEXT UNIQUE NOT NULL,
            name TEXT,
            name_cn TEXT,
            market TEXT NOT NULL DEFAULT 'OTHER',
            price REAL,
            change_amount REAL,
            change_percent REAL,
            high REAL,
            low REAL,
            open REAL,
            prev_close REAL,
            volume INTEGER,
            market_cap REAL,
            pe_ratio REAL,
            is_hot INTEGER NOT NULL DEFAULT 0,
            hot_rank INTEGER NOT NULL DEFAULT 0,
            last_updated DATETIME DEFAULT CURRENT_TIMESTAMP,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Installed themes (folders under website/themes)
        CREATE TABLE IF NOT EXISTS themes (
            id INTEGER PRIMARY KEY,
            theme_id TEXT UNIQUE NOT NULL,
            name TEXT NOT NULL,
            version TEXT,
            author TEXT,
            author_url TEXT,
            description TEXT,
            screenshot TEXT,
            config_json TEXT NOT NULL DEFAULT '{}',
            settings_json TEXT,
            is_active INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'ENABLED',
            template_engine TEXT NOT NULL DEFAULT 'tera',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_themes_single_active
            ON themes(is_active) WHERE is_active = 1;

        -- Key-value settings
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let inserted = crate::models::settings::SiteSettings::seed(&conn)?;
    if inserted > 0 {
        log::info!("Seeded {} default settings", inserted);
    }

    drop(conn);
    crate::models::external_tool::ExternalTool::seed_defaults(pool)?;

    Ok(())
}

/// Sample accounts, taxonomy and posts for a fresh install.
/// Skipped as soon as any user exists.
pub fn seed_sample_content(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    use crate::models::category::{Category, CategoryForm};
    use crate::models::post::{Post, PostForm};
    use crate::models::user::{NewUser, User};

    if User::count(pool) > 0 {
        log::info!("Database already initialized, skipping sample content");
        return Ok(());
    }

    log::info!("Seeding sample content...");

    let admin_id = User::create(
        pool,
        &NewUser {
            username: "admin".into(),
            password_hash: bcrypt::hash("admin123", bcrypt::DEFAULT_COST)?,
            email: "admin@blog.com".into(),
            nickname: Some("管理员".into()),
            description: Some("博客管理员".into()),
            role: "ADMIN".into(),
        },
    )?;
    let author_id = User::create(
        pool,
        &NewUser {
            username: "author".into(),
            password_hash: bcrypt::hash("author123", bcrypt::DEFAULT_COST)?,
            email: "author@blog.com".into(),
            nickname: Some("作者".into()),
            description: Some("博客作者".into()),
            role: "AUTHOR".into(),
        },
    )?;

    let tech = Category::create(
        pool,
        &CategoryForm { name: "Tech".into(), description: Some("技术相关文章".into()) },
    )?;
    Category::create(
        pool,
        &CategoryForm { name: "Life".into(), description: Some("生活随笔".into()) },
    )?;
    let travel = Category::create(
        pool,
        &CategoryForm { name: "Travel".into(), description: Some("旅行见闻".into()) },
    )?;

    let samples = [
        (
            admin_id,
            "Welcome to my blog",
            "这是第一篇博客文章，介绍了博客的基本功能和使用方法。",
            "<h2>欢迎!</h2><p>文章管理、分类标签、评论系统。</p>",
            "PUBLISHED",
            Some(tech),
            vec!["Blog", "Rust"],
        ),
        (
            author_id,
            "Building a blog backend",
            "How the pieces of this backend fit together.",
            "<h2>Stack</h2><ul><li>Rocket</li><li>SQLite</li><li>Tera</li></ul>",
            "PUBLISHED",
            Some(tech),
            vec!["Rust"],
        ),
        (
            admin_id,
            "My first trip",
            "分享我第一次独自旅行的经历和感受。",
            "<p>旅行不仅仅是看风景。</p>",
            "PUBLISHED",
            Some(travel),
            vec!["Blog"],
        ),
        (
            author_id,
            "Upcoming article",
            "这篇文章还在编辑中...",
            "<p>内容编辑中...</p>",
            "DRAFT",
            None,
            vec![],
        ),
    ];

    for (author, title, summary, content, status, category_id, tags) in samples {
        Post::create(
            pool,
            author,
            &PostForm {
                title: title.into(),
                summary: Some(summary.into()),
                content: Some(content.into()),
                original_content: None,
                thumbnail: None,
                status: Some(status.into()),
                category_id,
                tags: Some(tags.into_iter().map(String::from).collect()),
                allow_comment: None,
                top_priority: None,
            },
        )?;
    }

    log::info!("Sample content seeded");
    Ok(())
}
