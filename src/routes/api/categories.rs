use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;

use crate::models::category::CategoryForm;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::{AdminUser, AuthorUser};
use crate::store::Store;

#[get("/categories")]
pub fn list(store: &State<Arc<dyn Store>>) -> ApiResult {
    ok(store.category_list())
}

#[get("/categories/page?<page>&<size>")]
pub fn list_paged(store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let categories = store.category_list_paginated(req.limit(), req.offset());
    paged(Paged::new(categories, store.category_count(), req))
}

#[get("/categories/<id>")]
pub fn get(store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.category_find_by_id(id).map_or_else(|| Err(not_found("Category")), ok)
}

#[get("/categories/slug/<slug>")]
pub fn get_by_slug(store: &State<Arc<dyn Store>>, slug: &str) -> ApiResult {
    store.category_find_by_slug(slug).map_or_else(|| Err(not_found("Category")), ok)
}

#[post("/categories", format = "json", data = "<form>")]
pub fn create(_author: AuthorUser, store: &State<Arc<dyn Store>>, form: Json<CategoryForm>) -> ApiResult {
    let id = store.category_create(&form).map_err(reject)?;
    store.category_find_by_id(id).map_or_else(|| Err(not_found("Category")), ok)
}

#[put("/categories/<id>", format = "json", data = "<form>")]
pub fn update(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<CategoryForm>) -> ApiResult {
    store.category_update(id, &form).map_err(reject)?;
    store.category_find_by_id(id).map_or_else(|| Err(not_found("Category")), ok)
}

#[delete("/categories/<id>")]
pub fn delete(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.category_delete(id).map_err(reject)?;
    done("Category deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, list_paged, get, get_by_slug, create, update, delete]
}
