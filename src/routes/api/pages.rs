use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;

use crate::models::page::{Page, PageForm};
use crate::models::user::User;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::{AuthorUser, MaybeUser};
use crate::store::Store;

fn visible_to(page: &Page, viewer: Option<&User>) -> bool {
    page.status == "PUBLISHED" || viewer.map_or(false, |u| u.is_author_or_above())
}

#[get("/pages?<page>&<size>")]
pub fn list_published(store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let pages = store.page_list(true, req.limit(), req.offset());
    paged(Paged::new(pages, store.page_count(true), req))
}

#[get("/pages/all?<page>&<size>")]
pub fn list_all(_author: AuthorUser, store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let pages = store.page_list(false, req.limit(), req.offset());
    paged(Paged::new(pages, store.page_count(false), req))
}

#[get("/pages/<id>")]
pub fn get(store: &State<Arc<dyn Store>>, viewer: MaybeUser, id: i64) -> ApiResult {
    let page = store
        .page_find_by_id(id)
        .filter(|p| visible_to(p, viewer.0.as_ref()))
        .ok_or_else(|| not_found("Page"))?;
    let _ = store.page_increment_views(id);
    ok(page)
}

#[get("/pages/slug/<slug>")]
pub fn get_by_slug(store: &State<Arc<dyn Store>>, viewer: MaybeUser, slug: &str) -> ApiResult {
    let page = store
        .page_find_by_slug(slug)
        .filter(|p| visible_to(p, viewer.0.as_ref()))
        .ok_or_else(|| not_found("Page"))?;
    let _ = store.page_increment_views(page.id);
    ok(page)
}

#[post("/pages", format = "json", data = "<form>")]
pub fn create(author: AuthorUser, store: &State<Arc<dyn Store>>, form: Json<PageForm>) -> ApiResult {
    let id = store.page_create(author.user.id, &form).map_err(reject)?;
    store.page_find_by_id(id).map_or_else(|| Err(not_found("Page")), ok)
}

#[put("/pages/<id>", format = "json", data = "<form>")]
pub fn update(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<PageForm>) -> ApiResult {
    store.page_update(id, &form).map_err(reject)?;
    store.page_find_by_id(id).map_or_else(|| Err(not_found("Page")), ok)
}

#[delete("/pages/<id>")]
pub fn delete(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.page_delete(id).map_err(reject)?;
    done("Page deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list_published, list_all, get, get_by_slug, create, update, delete]
}
