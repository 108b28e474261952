use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde_json::json;

use crate::models::post::{PostForm, PostView};
use crate::models::user::User;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, fail, not_found, ok, paged, reject, ApiError, ApiResult};
use crate::security::auth::{AuthorUser, MaybeUser};
use crate::store::Store;

fn visible_to(post: &PostView, viewer: Option<&User>) -> bool {
    post.post.status == "PUBLISHED"
        || viewer.map_or(false, |u| u.is_admin() || post.post.author_id == Some(u.id))
}

/// Authors only touch their own posts; admins touch everything.
fn check_owner(store: &dyn Store, user: &User, id: i64) -> Result<(), ApiError> {
    let post = store.post_find_by_id(id).ok_or_else(|| not_found("Post"))?;
    if user.is_admin() || post.author_id == Some(user.id) {
        Ok(())
    } else {
        Err(fail(Status::Forbidden, "You can only modify your own posts"))
    }
}

/// Published posts, newest first.
#[get("/posts?<page>&<size>")]
pub fn list_published(store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let posts = store.post_list_published(req.limit(), req.offset());
    paged(Paged::new(posts, store.post_count_published(), req))
}

/// Every post regardless of status, for the editor.
#[get("/posts/all?<page>&<size>")]
pub fn list_all(_author: AuthorUser, store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let posts = store.post_list(req.limit(), req.offset());
    paged(Paged::new(posts, store.post_count(), req))
}

#[get("/posts/<id>")]
pub fn get(store: &State<Arc<dyn Store>>, viewer: MaybeUser, id: i64) -> ApiResult {
    let post = store
        .post_view_by_id(id)
        .filter(|p| visible_to(p, viewer.0.as_ref()))
        .ok_or_else(|| not_found("Post"))?;
    if let Err(e) = store.post_increment_views(id) {
        log::warn!("[post] view count for {} not updated: {}", id, e);
    }
    ok(post)
}

#[get("/posts/slug/<slug>")]
pub fn get_by_slug(store: &State<Arc<dyn Store>>, viewer: MaybeUser, slug: &str) -> ApiResult {
    let post = store
        .post_view_by_slug(slug)
        .filter(|p| visible_to(p, viewer.0.as_ref()))
        .ok_or_else(|| not_found("Post"))?;
    if let Err(e) = store.post_increment_views(post.post.id) {
        log::warn!("[post] view count for {} not updated: {}", post.post.id, e);
    }
    ok(post)
}

#[get("/posts/category/<id>?<page>&<size>")]
pub fn by_category(store: &State<Arc<dyn Store>>, id: i64, page: Option<i64>, size: Option<i64>) -> ApiResult {
    if store.category_find_by_id(id).is_none() {
        return Err(not_found("Category"));
    }
    let req = PageRequest::new(page, size);
    let posts = store.post_by_category(id, req.limit(), req.offset());
    paged(Paged::new(posts, store.post_count_by_category(id), req))
}

#[get("/posts/tag/<slug>?<page>&<size>")]
pub fn by_tag(store: &State<Arc<dyn Store>>, slug: &str, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let tag = store.tag_find_by_slug(slug).ok_or_else(|| not_found("Tag"))?;
    let req = PageRequest::new(page, size);
    let posts = store.post_by_tag(tag.id, req.limit(), req.offset());
    paged(Paged::new(posts, store.post_count_by_tag(tag.id), req))
}

#[get("/posts/search?<keyword>&<page>&<size>")]
pub fn search(store: &State<Arc<dyn Store>>, keyword: &str, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(fail(Status::BadRequest, "Keyword is required"));
    }
    let req = PageRequest::new(page, size);
    let posts = store.post_search(keyword, req.limit(), req.offset());
    paged(Paged::new(posts, store.post_count_search(keyword), req))
}

#[get("/posts/recent?<limit>")]
pub fn recent(store: &State<Arc<dyn Store>>, limit: Option<i64>) -> ApiResult {
    ok(store.post_recent_published(limit.unwrap_or(5).clamp(1, 50)))
}

#[post("/posts", format = "json", data = "<form>")]
pub fn create(author: AuthorUser, store: &State<Arc<dyn Store>>, form: Json<PostForm>) -> ApiResult {
    let id = store.post_create(author.user.id, &form).map_err(reject)?;
    log::info!("[post] {} created post {}", author.user.username, id);
    store.post_view_by_id(id).map_or_else(|| Err(not_found("Post")), ok)
}

#[put("/posts/<id>", format = "json", data = "<form>")]
pub fn update(author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<PostForm>) -> ApiResult {
    check_owner(&**store.inner(), &author.user, id)?;
    store.post_update(id, &form).map_err(reject)?;
    store.post_view_by_id(id).map_or_else(|| Err(not_found("Post")), ok)
}

#[delete("/posts/<id>")]
pub fn delete(author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    check_owner(&**store.inner(), &author.user, id)?;
    store.post_delete(id).map_err(reject)?;
    done("Post deleted")
}

#[post("/posts/<id>/like")]
pub fn like(store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    let count = store.post_increment_likes(id).map_err(reject)?;
    ok(json!({ "like_count": count }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list_published,
        list_all,
        get,
        get_by_slug,
        by_category,
        by_tag,
        search,
        recent,
        create,
        update,
        delete,
        like
    ]
}
