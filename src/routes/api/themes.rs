use std::sync::Arc;

use rocket::data::{Data, ToByteUnit};
use rocket::fs::NamedFile;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Map, Value};

use crate::routes::{done, fail, not_found, ok, reject, ApiResult};
use crate::security::auth::AdminUser;
use crate::themes::ThemeEngine;

const MAX_ARCHIVE_MIB: u64 = 20;

#[get("/themes")]
pub fn list(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>) -> ApiResult {
    ok(engine.list())
}

#[get("/themes/active")]
pub fn active(engine: &State<Arc<ThemeEngine>>) -> ApiResult {
    engine.active().map_or_else(|| Err(not_found("Active theme")), ok)
}

#[get("/themes/<id>")]
pub fn get(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, id: i64) -> ApiResult {
    engine.get(id).map_or_else(|| Err(not_found("Theme")), ok)
}

#[get("/themes/lookup?<theme_id>")]
pub fn lookup(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.get_by_theme_id(theme_id).map_or_else(|| Err(not_found("Theme")), ok)
}

#[post("/themes/<theme_id>/activate")]
pub fn activate(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.activate(theme_id).map_err(reject).and_then(ok)
}

#[post("/themes/<theme_id>/enable")]
pub fn enable(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.enable(theme_id).map_err(reject)?;
    done("Theme enabled")
}

#[post("/themes/<theme_id>/disable")]
pub fn disable(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.disable(theme_id).map_err(reject)?;
    done("Theme disabled")
}

#[get("/themes/<theme_id>/settings")]
pub fn settings(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.effective_settings(theme_id).map_err(reject).and_then(ok)
}

#[put("/themes/<theme_id>/settings", format = "json", data = "<form>")]
pub fn update_settings(
    _admin: AdminUser,
    engine: &State<Arc<ThemeEngine>>,
    theme_id: &str,
    form: Json<Map<String, Value>>,
) -> ApiResult {
    engine
        .update_settings(theme_id, &form)
        .map_err(reject)
        .and_then(ok)
}

#[get("/themes/<theme_id>/schema")]
pub fn schema(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.settings_schema(theme_id).map_err(reject).and_then(ok)
}

#[get("/themes/<theme_id>/defaults")]
pub fn defaults(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.default_settings(theme_id).map_err(reject).and_then(ok)
}

/// Installs a theme from a zip archive sent as the raw request body.
#[post("/themes/install", data = "<data>")]
pub async fn install(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, data: Data<'_>) -> ApiResult {
    let bytes = match data.open(MAX_ARCHIVE_MIB.mebibytes()).into_bytes().await {
        Ok(b) if b.is_complete() => b.into_inner(),
        Ok(_) => return Err(fail(Status::PayloadTooLarge, "Theme archive is too large")),
        Err(e) => return Err(fail(Status::BadRequest, format!("Failed to read upload: {}", e))),
    };
    if bytes.is_empty() {
        return Err(fail(Status::BadRequest, "Theme archive is empty"));
    }
    let engine = Arc::clone(engine.inner());
    let record = rocket::tokio::task::spawn_blocking(move || engine.install(&bytes))
        .await
        .map_err(|e| fail(Status::InternalServerError, format!("Install failed: {}", e)))?
        .map_err(reject)?;
    log::info!("[theme] installed {}", record.theme_id);
    ok(record)
}

#[delete("/themes/<theme_id>")]
pub fn delete(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.delete(theme_id).map_err(reject)?;
    done("Theme deleted")
}

#[get("/themes/<theme_id>/screenshot")]
pub async fn screenshot(engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> Option<NamedFile> {
    let path = engine.screenshot_path(theme_id)?;
    NamedFile::open(path).await.ok()
}

#[get("/themes/<theme_id>/preview?<lang>")]
pub fn preview(
    _admin: AdminUser,
    engine: &State<Arc<ThemeEngine>>,
    theme_id: &str,
    lang: Option<String>,
) -> ApiResult {
    let html = engine.preview(theme_id, lang).map_err(reject)?;
    ok(json!({ "theme_id": theme_id, "html": html }))
}

#[get("/themes/<theme_id>/locales")]
pub fn locales(engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.locales(theme_id).map_err(reject).and_then(ok)
}

#[post("/themes/<theme_id>/reload")]
pub fn reload(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>, theme_id: &str) -> ApiResult {
    engine.reload(theme_id).map_err(reject)?;
    done("Theme reloaded")
}

/// Registers theme folders that appeared on disk since startup.
#[post("/themes/rescan")]
pub fn rescan(_admin: AdminUser, engine: &State<Arc<ThemeEngine>>) -> ApiResult {
    let found = engine.scan();
    ok(json!({ "themes": found }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        active,
        get,
        lookup,
        activate,
        enable,
        disable,
        settings,
        update_settings,
        schema,
        defaults,
        install,
        delete,
        screenshot,
        preview,
        locales,
        reload,
        rescan
    ]
}
