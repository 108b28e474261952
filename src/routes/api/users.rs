use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;

use crate::models::user::{NewUser, ProfileForm};
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, fail, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::{self, AdminUser, AuthenticatedUser};
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct CreateUserForm {
    pub username: String,
    pub password: String,
    pub email: String,
    pub nickname: Option<String>,
    pub description: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    pub role: String,
}

#[get("/users?<page>&<size>")]
pub fn list(_admin: AdminUser, store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let users = store.user_list_paginated(req.limit(), req.offset());
    paged(Paged::new(users, store.user_count(), req))
}

#[get("/users/all")]
pub fn list_all(_admin: AdminUser, store: &State<Arc<dyn Store>>) -> ApiResult {
    ok(store.user_list_all())
}

#[get("/users/<id>")]
pub fn get(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.user_get_by_id(id).map_or_else(|| Err(not_found("User")), ok)
}

#[get("/users/username/<username>")]
pub fn get_by_username(_admin: AdminUser, store: &State<Arc<dyn Store>>, username: &str) -> ApiResult {
    store
        .user_get_by_username(username)
        .map_or_else(|| Err(not_found("User")), ok)
}

#[post("/users", format = "json", data = "<form>")]
pub fn create(_admin: AdminUser, store: &State<Arc<dyn Store>>, form: Json<CreateUserForm>) -> ApiResult {
    let form = form.into_inner();
    if form.username.trim().is_empty() || form.password.is_empty() || form.email.trim().is_empty() {
        return Err(fail(Status::BadRequest, "Username, password and email are required"));
    }
    let new = NewUser {
        username: form.username.trim().to_string(),
        password_hash: auth::hash_password(&form.password).map_err(reject)?,
        email: form.email.trim().to_string(),
        nickname: form.nickname.or_else(|| Some(form.username.trim().to_string())),
        description: form.description,
        role: form.role.unwrap_or_else(|| "SUBSCRIBER".to_string()),
    };
    let id = store.user_create(&new).map_err(reject)?;
    store.user_get_by_id(id).map_or_else(|| Err(not_found("User")), ok)
}

/// Users edit their own profile; admins edit anyone's.
#[put("/users/<id>/profile", format = "json", data = "<form>")]
pub fn update_profile(
    user: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    id: i64,
    form: Json<ProfileForm>,
) -> ApiResult {
    if user.user.id != id && !user.user.is_admin() {
        return Err(fail(Status::Forbidden, "You can only edit your own profile"));
    }
    store.user_update_profile(id, &form).map_err(reject)?;
    store.user_get_by_id(id).map_or_else(|| Err(not_found("User")), ok)
}

#[put("/users/<id>/status", format = "json", data = "<form>")]
pub fn update_status(admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<StatusForm>) -> ApiResult {
    if admin.user.id == id {
        return Err(fail(Status::Conflict, "Cannot change your own status"));
    }
    store.user_update_status(id, &form.status).map_err(reject)?;
    done("Status updated")
}

#[put("/users/<id>/role", format = "json", data = "<form>")]
pub fn update_role(admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<RoleForm>) -> ApiResult {
    if admin.user.id == id {
        return Err(fail(Status::Conflict, "Cannot change your own role"));
    }
    store.user_update_role(id, &form.role).map_err(reject)?;
    done("Role updated")
}

#[delete("/users/<id>")]
pub fn delete(admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    if admin.user.id == id {
        return Err(fail(Status::Conflict, "Cannot delete yourself"));
    }
    store.user_delete(id).map_err(reject)?;
    log::info!("[auth] user {} deleted by {}", id, admin.user.username);
    done("User deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        list_all,
        get,
        get_by_username,
        create,
        update_profile,
        update_status,
        update_role,
        delete
    ]
}
