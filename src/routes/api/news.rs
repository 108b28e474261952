use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::tokio;
use rocket::State;
use serde::Deserialize;

use crate::fetchers;
use crate::models::news::NewsForm;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, fail, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::AdminUser;
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct HotForm {
    pub is_hot: bool,
    pub hot_score: Option<i64>,
}

#[get("/news?<page>&<size>")]
pub fn list(store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let items = store.news_list_paginated(req.limit(), req.offset());
    paged(Paged::new(items, store.news_count(), req))
}

#[get("/news/hot?<limit>")]
pub fn hot(store: &State<Arc<dyn Store>>, limit: Option<i64>) -> ApiResult {
    ok(store.news_hot(limit.unwrap_or(10).clamp(1, 100)))
}

#[get("/news/<id>")]
pub fn get(store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    let item = store.news_find_by_id(id).ok_or_else(|| not_found("News"))?;
    let _ = store.news_increment_views(id);
    ok(item)
}

#[get("/news/category/<category>?<page>&<size>")]
pub fn by_category(store: &State<Arc<dyn Store>>, category: &str, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let items = store
        .news_by_category(category, req.limit(), req.offset())
        .map_err(reject)?;
    paged(Paged::new(items, store.news_count_by_category(category), req))
}

#[get("/news/search?<keyword>&<page>&<size>")]
pub fn search(store: &State<Arc<dyn Store>>, keyword: &str, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(fail(Status::BadRequest, "Keyword is required"));
    }
    let req = PageRequest::new(page, size);
    let items = store.news_search(keyword, req.limit(), req.offset());
    paged(Paged::new(items, store.news_count_search(keyword), req))
}

#[post("/news", format = "json", data = "<form>")]
pub fn create(_admin: AdminUser, store: &State<Arc<dyn Store>>, form: Json<NewsForm>) -> ApiResult {
    let id = store.news_create(&form).map_err(reject)?;
    store.news_find_by_id(id).map_or_else(|| Err(not_found("News")), ok)
}

#[put("/news/<id>", format = "json", data = "<form>")]
pub fn update(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<NewsForm>) -> ApiResult {
    store.news_update(id, &form).map_err(reject)?;
    store.news_find_by_id(id).map_or_else(|| Err(not_found("News")), ok)
}

#[put("/news/<id>/hot", format = "json", data = "<form>")]
pub fn set_hot(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<HotForm>) -> ApiResult {
    store
        .news_set_hot(id, form.is_hot, form.hot_score.unwrap_or(0))
        .map_err(reject)?;
    store.news_find_by_id(id).map_or_else(|| Err(not_found("News")), ok)
}

#[delete("/news/<id>")]
pub fn delete(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.news_delete(id).map_err(reject)?;
    done("News deleted")
}

/// Runs the fetcher now and returns what it stored.
#[post("/news/fetch")]
pub async fn fetch_now(_admin: AdminUser, store: &State<Arc<dyn Store>>) -> ApiResult {
    let s = Arc::clone(store.inner());
    let items = tokio::task::spawn_blocking(move || fetchers::news::fetch_manually(&*s))
        .await
        .map_err(|e| fail(Status::InternalServerError, format!("News fetch failed: {}", e)))?;
    ok(items)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, hot, get, by_category, search, create, update, set_hot, delete, fetch_now]
}
