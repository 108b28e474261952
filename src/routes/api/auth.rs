use std::sync::Arc;

use rocket::http::{CookieJar, Status};
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::json;

use crate::rate_limit::{Bucket, RateLimiter};
use crate::routes::{done, fail, ok, reject, ApiError, ApiResult};
use crate::security::auth::{self, AuthenticatedUser, ClientIp, SessionToken, UserAgent};
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub email: String,
    pub nickname: Option<String>,
}

fn throttle(store: &dyn Store, limiter: &RateLimiter, bucket: Bucket, ip: &str) -> Result<(), ApiError> {
    limiter.check(store, bucket, &auth::hash_ip(ip)).map_err(|wait| {
        log::warn!("[auth] {} rate limit hit", bucket.name());
        let minutes = wait.as_secs() / 60 + 1;
        fail(
            Status::TooManyRequests,
            format!("Too many attempts. Please try again in {} minutes.", minutes),
        )
    })
}

#[post("/auth/login", format = "json", data = "<form>")]
pub fn login(
    store: &State<Arc<dyn Store>>,
    limiter: &State<Arc<RateLimiter>>,
    cookies: &CookieJar<'_>,
    ip: ClientIp,
    ua: UserAgent,
    form: Json<LoginForm>,
) -> ApiResult {
    throttle(&**store.inner(), limiter, Bucket::Login, &ip.0)?;
    let (token, user) = auth::login(&**store.inner(), &form.username, &form.password, Some(&ip.0), ua.0.as_deref())
        .map_err(|e| {
            log::info!("[auth] failed login for {}", form.username);
            fail(Status::Unauthorized, e)
        })?;
    auth::set_session_cookie(cookies, &token, &**store.inner());
    ok(json!({"token": token, "user": user}))
}

#[post("/auth/register", format = "json", data = "<form>")]
pub fn register(
    store: &State<Arc<dyn Store>>,
    limiter: &State<Arc<RateLimiter>>,
    cookies: &CookieJar<'_>,
    ip: ClientIp,
    ua: UserAgent,
    form: Json<RegisterForm>,
) -> ApiResult {
    throttle(&**store.inner(), limiter, Bucket::Register, &ip.0)?;
    let (token, user) = auth::register(
        &**store.inner(),
        &form.username,
        &form.password,
        &form.email,
        form.nickname.as_deref(),
        Some(&ip.0),
        ua.0.as_deref(),
    )
    .map_err(reject)?;
    auth::set_session_cookie(cookies, &token, &**store.inner());
    ok(json!({"token": token, "user": user}))
}

#[post("/auth/logout")]
pub fn logout(store: &State<Arc<dyn Store>>, cookies: &CookieJar<'_>, token: SessionToken) -> ApiResult {
    auth::destroy_session(&**store.inner(), &token.0).map_err(reject)?;
    auth::clear_session_cookie(cookies);
    done("Logged out")
}

#[get("/auth/me")]
pub fn me(user: AuthenticatedUser) -> ApiResult {
    ok(user.user)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login, register, logout, me]
}
