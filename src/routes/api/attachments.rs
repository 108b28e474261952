use std::path::Path;
use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;

use crate::boot::UPLOADS_DIR;
use crate::models::attachment::AttachmentForm;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::AuthorUser;
use crate::store::Store;

use super::uploads;

#[derive(Debug, Deserialize)]
pub struct RenameForm {
    pub name: String,
}

#[get("/attachments?<page>&<size>")]
pub fn list(_author: AuthorUser, store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let items = store.attachment_list_paginated(req.limit(), req.offset());
    paged(Paged::new(items, store.attachment_count(), req))
}

#[get("/attachments/all")]
pub fn list_all(_author: AuthorUser, store: &State<Arc<dyn Store>>) -> ApiResult {
    ok(store.attachment_list_all())
}

#[get("/attachments/<id>")]
pub fn get(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.attachment_find_by_id(id).map_or_else(|| Err(not_found("Attachment")), ok)
}

#[get("/attachments/uploader/<uploader_id>")]
pub fn by_uploader(_author: AuthorUser, store: &State<Arc<dyn Store>>, uploader_id: i64) -> ApiResult {
    ok(store.attachment_by_uploader(uploader_id))
}

#[get("/attachments/type/<kind>")]
pub fn by_type(_author: AuthorUser, store: &State<Arc<dyn Store>>, kind: &str) -> ApiResult {
    ok(store.attachment_by_type(kind))
}

/// Registers a file that already lives somewhere reachable, e.g. an external URL.
#[post("/attachments", format = "json", data = "<form>")]
pub fn create(author: AuthorUser, store: &State<Arc<dyn Store>>, form: Json<AttachmentForm>) -> ApiResult {
    let id = store.attachment_create(author.user.id, &form).map_err(reject)?;
    store.attachment_find_by_id(id).map_or_else(|| Err(not_found("Attachment")), ok)
}

#[put("/attachments/<id>/name", format = "json", data = "<form>")]
pub fn rename(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<RenameForm>) -> ApiResult {
    store.attachment_rename(id, &form.name).map_err(reject)?;
    store.attachment_find_by_id(id).map_or_else(|| Err(not_found("Attachment")), ok)
}

/// Deletes the record, and the stored file when it lives under the uploads directory.
#[delete("/attachments/<id>")]
pub fn delete(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    let attachment = store.attachment_find_by_id(id).ok_or_else(|| not_found("Attachment"))?;
    store.attachment_delete(id).map_err(reject)?;
    if !uploads::remove_if_contained(Path::new(UPLOADS_DIR), &attachment.path) {
        log::debug!("[upload] left {} on disk", attachment.path);
    }
    done("Attachment deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list, list_all, get, by_uploader, by_type, create, rename, delete]
}
