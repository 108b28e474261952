use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::json;

use crate::models::external_tool::ToolForm;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, fail, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::AdminUser;
use crate::store::Store;

const ADMIN_PAGE_SIZE: i64 = 20;

#[get("/tools")]
pub fn list_active(store: &State<Arc<dyn Store>>) -> ApiResult {
    ok(store.tool_list_active())
}

#[get("/tools/page?<page>&<size>")]
pub fn list_paged(_admin: AdminUser, store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::with_default(page, size, ADMIN_PAGE_SIZE);
    let tools = store.tool_list_paginated(req.limit(), req.offset());
    paged(Paged::new(tools, store.tool_count(), req))
}

#[get("/tools/<id>")]
pub fn get(store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.tool_find_by_id(id).map_or_else(|| Err(not_found("Tool")), ok)
}

#[get("/tools/category/<category>")]
pub fn by_category(store: &State<Arc<dyn Store>>, category: &str) -> ApiResult {
    store.tool_by_category(category).map_err(reject).and_then(ok)
}

#[get("/tools/search?<keyword>")]
pub fn search(store: &State<Arc<dyn Store>>, keyword: &str) -> ApiResult {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(fail(Status::BadRequest, "Keyword is required"));
    }
    ok(store.tool_search(keyword))
}

#[post("/tools", format = "json", data = "<form>")]
pub fn create(_admin: AdminUser, store: &State<Arc<dyn Store>>, form: Json<ToolForm>) -> ApiResult {
    let id = store.tool_create(&form).map_err(reject)?;
    store.tool_find_by_id(id).map_or_else(|| Err(not_found("Tool")), ok)
}

#[put("/tools/<id>", format = "json", data = "<form>")]
pub fn update(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<ToolForm>) -> ApiResult {
    store.tool_update(id, &form).map_err(reject)?;
    store.tool_find_by_id(id).map_or_else(|| Err(not_found("Tool")), ok)
}

#[delete("/tools/<id>")]
pub fn delete(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.tool_delete(id).map_err(reject)?;
    done("Tool deleted")
}

/// Seeds the default tool set when the table is empty.
#[post("/tools/init")]
pub fn init_defaults(_admin: AdminUser, store: &State<Arc<dyn Store>>) -> ApiResult {
    let seeded = store.tool_seed_defaults().map_err(reject)?;
    ok(json!({ "seeded": seeded }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list_active, list_paged, get, by_category, search, create, update, delete, init_defaults]
}
