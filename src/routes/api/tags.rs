use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;

use crate::models::tag::TagForm;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::AuthorUser;
use crate::store::Store;

#[get("/tags")]
pub fn list(store: &State<Arc<dyn Store>>) -> ApiResult {
    ok(store.tag_list())
}

#[get("/tags/page?<page>&<size>")]
pub fn list_paged(store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let tags = store.tag_list_paginated(req.limit(), req.offset());
    paged(Paged::new(tags, store.tag_count(), req))
}

#[get("/tags/<id>")]
pub fn get(store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.tag_find_by_id(id).map_or_else(|| Err(not_found("Tag")), ok)
}

#[get("/tags/slug/<slug>")]
pub fn get_by_slug(store: &State<Arc<dyn Store>>, slug: &str) -> ApiResult {
    store.tag_find_by_slug(slug).map_or_else(|| Err(not_found("Tag")), ok)
}

#[get("/tags/name/<name>")]
pub fn get_by_name(store: &State<Arc<dyn Store>>, name: &str) -> ApiResult {
    store.tag_find_by_name(name).map_or_else(|| Err(not_found("Tag")), ok)
}

#[post("/tags", format = "json", data = "<form>")]
pub fn create(_author: AuthorUser, store: &State<Arc<dyn Store>>, form: Json<TagForm>) -> ApiResult {
    let id = store.tag_create(&form).map_err(reject)?;
    store.tag_find_by_id(id).map_or_else(|| Err(not_found("Tag")), ok)
}

/// Returns the existing tag with this name, creating it when missing.
#[post("/tags/find-or-create", format = "json", data = "<form>")]
pub fn find_or_create(_author: AuthorUser, store: &State<Arc<dyn Store>>, form: Json<TagForm>) -> ApiResult {
    store.tag_find_or_create(&form.name).map_err(reject).and_then(ok)
}

#[put("/tags/<id>", format = "json", data = "<form>")]
pub fn update(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<TagForm>) -> ApiResult {
    store.tag_update(id, &form).map_err(reject)?;
    store.tag_find_by_id(id).map_or_else(|| Err(not_found("Tag")), ok)
}

#[delete("/tags/<id>")]
pub fn delete(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.tag_delete(id).map_err(reject)?;
    done("Tag deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, list_paged, get, get_by_slug, get_by_name, create, find_or_create, update, delete]
}
