use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::json;

use crate::models::comment::CommentForm;
use crate::paging::{PageRequest, Paged};
use crate::rate_limit::{Bucket, RateLimiter};
use crate::routes::{done, fail, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::{self, AuthorUser, ClientIp, MaybeUser, UserAgent};
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct CommentSubmit {
    pub post_id: i64,
    pub content: String,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub parent_id: Option<i64>,
    pub honeypot: Option<String>,
}

/// Approved comments for a post. Authors and admins may ask for every status.
#[get("/comments/post/<post_id>?<page>&<size>&<all>")]
pub fn for_post(
    store: &State<Arc<dyn Store>>,
    viewer: MaybeUser,
    post_id: i64,
    page: Option<i64>,
    size: Option<i64>,
    all: Option<bool>,
) -> ApiResult {
    if store.post_find_by_id(post_id).is_none() {
        return Err(not_found("Post"));
    }
    let staff = viewer.0.as_ref().map_or(false, |u| u.is_author_or_above());
    let approved_only = !(staff && all.unwrap_or(false));
    let req = PageRequest::new(page, size);
    let comments = store.comment_for_post(post_id, approved_only, req.limit(), req.offset());
    paged(Paged::new(comments, store.comment_count_for_post(post_id, approved_only), req))
}

#[post("/comments", format = "json", data = "<form>")]
pub fn submit(
    store: &State<Arc<dyn Store>>,
    limiter: &State<Arc<RateLimiter>>,
    viewer: MaybeUser,
    ip: ClientIp,
    ua: UserAgent,
    form: Json<CommentSubmit>,
) -> ApiResult {
    let form = form.into_inner();

    // Bots get a success response and nothing is stored.
    if form.honeypot.as_deref().map_or(false, |h| !h.is_empty()) {
        log::info!("[comment] honeypot triggered on post {}", form.post_id);
        return ok(json!({ "status": "PENDING" }));
    }

    let ip_hash = auth::hash_ip(&ip.0);
    if limiter.check(&**store.inner(), Bucket::Comment, &ip_hash).is_err() {
        return Err(fail(Status::TooManyRequests, "Too many comments. Please try again later."));
    }

    let user = viewer.0;
    let comment = CommentForm {
        post_id: form.post_id,
        user_id: user.as_ref().map(|u| u.id),
        guest_name: match &user {
            Some(u) => Some(u.display_name().to_string()),
            None => form.guest_name,
        },
        guest_email: match &user {
            Some(u) => Some(u.email.clone()),
            None => form.guest_email,
        },
        content: form.content,
        parent_id: form.parent_id,
        ip_address: Some(ip_hash),
        user_agent: ua.0,
        honeypot: None,
    };
    let id = store.comment_create(&comment).map_err(reject)?;
    store.comment_find_by_id(id).map_or_else(|| Err(not_found("Comment")), ok)
}

#[get("/comments/<id>")]
pub fn get(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.comment_find_by_id(id).map_or_else(|| Err(not_found("Comment")), ok)
}

#[get("/comments?<status>&<page>&<size>")]
pub fn list(
    _author: AuthorUser,
    store: &State<Arc<dyn Store>>,
    status: Option<&str>,
    page: Option<i64>,
    size: Option<i64>,
) -> ApiResult {
    let status = status.map(str::to_uppercase);
    let req = PageRequest::new(page, size);
    let comments = store.comment_list(status.as_deref(), req.limit(), req.offset());
    paged(Paged::new(comments, store.comment_count(status.as_deref()), req))
}

#[put("/comments/<id>/approve")]
pub fn approve(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.comment_update_status(id, "APPROVED").map_err(reject)?;
    done("Comment approved")
}

#[put("/comments/<id>/spam")]
pub fn spam(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.comment_update_status(id, "SPAM").map_err(reject)?;
    done("Comment marked as spam")
}

#[delete("/comments/<id>")]
pub fn delete(_author: AuthorUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.comment_delete(id).map_err(reject)?;
    done("Comment deleted")
}

pub fn routes() -> Vec<rocket::Route> {
    routes![for_post, submit, get, list, approve, spam, delete]
}
