use std::path::PathBuf;
use std::sync::Arc;

use rocket::fs::NamedFile;
use rocket::http::Status;
use rocket::response::content::RawHtml;
use rocket::response::status::Custom;
use rocket::State;
use rocket_dyn_templates::{context, Template};

use crate::models::post::PostView;
use crate::paging::{PageRequest, DEFAULT_PAGE_SIZE};
use crate::security::auth::MaybeUser;
use crate::store::Store;
use crate::themes::{RenderOptions, ThemeEngine};

type Page = Result<RawHtml<String>, Custom<Template>>;

fn error_page(status: Status, message: &str) -> Custom<Template> {
    Custom(
        status,
        Template::render(
            "error",
            context! { status: status.code, reason: status.reason().unwrap_or("Error"), message },
        ),
    )
}

/// Theme errors become 404 when the theme or its template is missing and
/// 500 otherwise.
fn render_error(theme_id: &str, err: String) -> Custom<Template> {
    log::warn!("[theme] render of {} failed: {}", theme_id, err);
    if err.contains("not found") || err.contains("not enabled") {
        error_page(Status::NotFound, &err)
    } else {
        error_page(Status::InternalServerError, "The theme failed to render this page")
    }
}

fn page_request(store: &dyn Store, page: Option<i64>, size: Option<i64>) -> PageRequest {
    let per_page = match store.setting_get_i64("posts_per_page") {
        n if n > 0 => n,
        _ => DEFAULT_PAGE_SIZE,
    };
    PageRequest::with_default(page, size, per_page)
}

fn published_post(store: &dyn Store, slug: &str) -> Result<PostView, Custom<Template>> {
    let view = store
        .post_view_by_slug(slug)
        .filter(|v| v.post.status == "PUBLISHED")
        .ok_or_else(|| error_page(Status::NotFound, "Post not found"))?;
    if let Err(e) = store.post_increment_views(view.post.id) {
        log::warn!("[post] view count for {} not updated: {}", view.post.id, e);
    }
    Ok(store.post_view_by_id(view.post.id).unwrap_or(view))
}

fn index(
    engine: &ThemeEngine,
    theme_id: &str,
    base: String,
    req: PageRequest,
    lang: Option<String>,
    user: &MaybeUser,
) -> Page {
    let opts = RenderOptions { base, locale: lang, user: user.0.as_ref() };
    engine
        .render_index(theme_id, req, &opts)
        .map(RawHtml)
        .map_err(|e| render_error(theme_id, e))
}

fn single(
    engine: &ThemeEngine,
    store: &dyn Store,
    theme_id: &str,
    base: String,
    slug: &str,
    lang: Option<String>,
    user: &MaybeUser,
) -> Page {
    let post = published_post(store, slug)?;
    let opts = RenderOptions { base, locale: lang, user: user.0.as_ref() };
    engine
        .render_post(theme_id, &post, &opts)
        .map(RawHtml)
        .map_err(|e| render_error(theme_id, e))
}

// ── Active theme ──

#[get("/?<page>&<size>&<lang>")]
pub fn home(
    engine: &State<Arc<ThemeEngine>>,
    store: &State<Arc<dyn Store>>,
    user: MaybeUser,
    page: Option<i64>,
    size: Option<i64>,
    lang: Option<String>,
) -> Page {
    let store = &**store.inner();
    let req = page_request(store, page, size);
    index(engine, &engine.active_theme_id(), String::new(), req, lang, &user)
}

#[get("/posts/<slug>?<lang>")]
pub fn post(
    engine: &State<Arc<ThemeEngine>>,
    store: &State<Arc<dyn Store>>,
    user: MaybeUser,
    slug: &str,
    lang: Option<String>,
) -> Page {
    single(engine, &**store.inner(), &engine.active_theme_id(), String::new(), slug, lang, &user)
}

// ── Any installed theme ──

#[get("/themes/<theme_id>?<page>&<size>&<lang>")]
pub fn theme_home(
    engine: &State<Arc<ThemeEngine>>,
    store: &State<Arc<dyn Store>>,
    user: MaybeUser,
    theme_id: &str,
    page: Option<i64>,
    size: Option<i64>,
    lang: Option<String>,
) -> Page {
    let store = &**store.inner();
    let req = page_request(store, page, size);
    index(engine, theme_id, format!("/themes/{}", theme_id), req, lang, &user)
}

#[get("/themes/<theme_id>/posts/<slug>?<lang>")]
pub fn theme_post(
    engine: &State<Arc<ThemeEngine>>,
    store: &State<Arc<dyn Store>>,
    user: MaybeUser,
    theme_id: &str,
    slug: &str,
    lang: Option<String>,
) -> Page {
    let base = format!("/themes/{}", theme_id);
    single(engine, &**store.inner(), theme_id, base, slug, lang, &user)
}

#[get("/themes/<theme_id>/static/<path..>")]
pub async fn theme_static(engine: &State<Arc<ThemeEngine>>, theme_id: &str, path: PathBuf) -> Option<NamedFile> {
    let file = engine.static_path(theme_id, &path)?;
    NamedFile::open(file).await.ok()
}

/// The escaped index render wrapped in the server's preview page.
#[get("/themes/<theme_id>/preview?<lang>")]
pub fn theme_preview(
    engine: &State<Arc<ThemeEngine>>,
    theme_id: &str,
    lang: Option<String>,
) -> Result<Template, Custom<Template>> {
    let html = engine
        .preview(theme_id, lang)
        .map_err(|e| render_error(theme_id, e))?;
    let name = engine
        .get_by_theme_id(theme_id)
        .map(|t| t.name)
        .unwrap_or_else(|| theme_id.to_string());
    Ok(Template::render(
        "preview",
        context! { theme_id, name, html },
    ))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![home, post, theme_home, theme_post, theme_static, theme_preview]
}
