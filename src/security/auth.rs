use chrono::{Duration, Utc};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::models::user::{NewUser, User};
use crate::store::Store;

pub const SESSION_COOKIE: &str = "inkpot_session";

// ── Client IP request guard ──

/// Extracts the real client IP from the request.
/// Checks headers in priority order:
///   1. X-Real-IP (nginx proxy_set_header)
///   2. X-Forwarded-For (first IP in the chain = original client)
///   3. Rocket's client_ip() (socket peer address)
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        if let Some(ip) = headers.get_one("X-Real-IP") {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Outcome::Success(ClientIp(ip.to_string()));
            }
        }

        // X-Forwarded-For: client, proxy1, proxy2; take the leftmost
        if let Some(forwarded) = headers.get_one("X-Forwarded-For") {
            if let Some(ip) = forwarded.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Outcome::Success(ClientIp(ip.to_string()));
                }
            }
        }

        let ip = request
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

/// Raw `User-Agent` header, if any.
pub struct UserAgent(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserAgent {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(UserAgent(
            request.headers().get_one("User-Agent").map(str::to_string),
        ))
    }
}

// ── Session token ──

/// The session token carried by a request: `Authorization: Bearer <token>`
/// first, then the private session cookie.
pub struct SessionToken(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_token(request) {
            Some(token) => Outcome::Success(SessionToken(token)),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

fn extract_token(request: &Request<'_>) -> Option<String> {
    if let Some(header) = request.headers().get_one("Authorization") {
        if let Some(token) = header.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

// ── Authenticated user guard (any active user with a valid session) ──

/// Guard: any authenticated user with an active account.
pub struct AuthenticatedUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session_user(request).await {
            Some(user) => Outcome::Success(AuthenticatedUser { user }),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

// ── Role-specific guards ──

/// Guard: requires role = ADMIN
pub struct AdminUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session_user(request).await {
            Some(user) if user.is_admin() => Outcome::Success(AdminUser { user }),
            Some(_) => Outcome::Forward(Status::Forbidden),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

/// Guard: requires role = ADMIN or AUTHOR
pub struct AuthorUser {
    pub user: User,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthorUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session_user(request).await {
            Some(user) if user.is_author_or_above() => Outcome::Success(AuthorUser { user }),
            Some(_) => Outcome::Forward(Status::Forbidden),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

/// Optional viewer for public routes that show more to signed-in users.
pub struct MaybeUser(pub Option<User>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MaybeUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(MaybeUser(resolve_session_user(request).await))
    }
}

// ── Shared session resolution ──

async fn resolve_session_user(request: &Request<'_>) -> Option<User> {
    let store = request
        .guard::<&State<Arc<dyn Store>>>()
        .await
        .succeeded()?;
    let token = extract_token(request)?;

    match store.session_get_user(&token) {
        Some(user) if user.is_active() => Some(user),
        _ => {
            request.cookies().remove_private(Cookie::from(SESSION_COOKIE));
            None
        }
    }
}

// ── Password utilities ──

pub fn hash_password(password: &str) -> Result<String, String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

// ── Session management ──

pub fn create_session(
    store: &dyn Store,
    user_id: i64,
    ip: Option<&str>,
    ua: Option<&str>,
) -> Result<String, String> {
    let expiry_hours = store.setting_get_i64("session_expiry_hours").max(1);
    let session_id = uuid::Uuid::new_v4().to_string();
    let expires = Utc::now().naive_utc() + Duration::hours(expiry_hours);
    let expires_str = expires.format("%Y-%m-%d %H:%M:%S").to_string();
    let ip_hash = ip.map(hash_ip);

    store.session_create(user_id, &session_id, &expires_str, ip_hash.as_deref(), ua)?;

    Ok(session_id)
}

/// Validate a session token and return the associated active user.
pub fn current_user(store: &dyn Store, token: &str) -> Option<User> {
    store.session_get_user(token).filter(|u| u.is_active())
}

pub fn destroy_session(store: &dyn Store, session_id: &str) -> Result<(), String> {
    store.session_delete(session_id)
}

/// Checks credentials and opens a session. Returns the token and the user.
pub fn login(
    store: &dyn Store,
    username: &str,
    password: &str,
    ip: Option<&str>,
    ua: Option<&str>,
) -> Result<(String, User), String> {
    let user = store
        .user_get_by_username(username.trim())
        .filter(|u| verify_password(password, &u.password_hash))
        .ok_or_else(|| "Invalid username or password".to_string())?;
    if !user.is_active() {
        return Err("User account is not active".to_string());
    }
    let token = create_session(store, user.id, ip, ua)?;
    log::info!("[auth] {} signed in", user.username);
    Ok((token, user))
}

/// Creates a SUBSCRIBER account and signs it in.
pub fn register(
    store: &dyn Store,
    username: &str,
    password: &str,
    email: &str,
    nickname: Option<&str>,
    ip: Option<&str>,
    ua: Option<&str>,
) -> Result<(String, User), String> {
    let username = username.trim();
    if username.is_empty() {
        return Err("Username is required".to_string());
    }
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }
    let nickname = nickname
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(username);
    let id = store.user_create(&NewUser {
        username: username.to_string(),
        password_hash: hash_password(password)?,
        email: email.trim().to_string(),
        nickname: Some(nickname.to_string()),
        description: None,
        role: "SUBSCRIBER".to_string(),
    })?;
    let user = store
        .user_get_by_id(id)
        .ok_or_else(|| "User not found".to_string())?;
    let token = create_session(store, user.id, ip, ua)?;
    log::info!("[auth] registered {}", user.username);
    Ok((token, user))
}

/// Set the session cookie. `Secure` follows the scheme of the `site_url` setting.
pub fn set_session_cookie(cookies: &CookieJar<'_>, session_id: &str, store: &dyn Store) {
    let is_secure = store.setting_get_or("site_url", "").starts_with("https://");

    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(rocket::http::SameSite::Lax);
    cookie.set_path("/");
    if is_secure {
        cookie.set_secure(true);
    }
    cookies.add_private(cookie);
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn cleanup_expired_sessions(store: &dyn Store) -> usize {
    match store.session_cleanup_expired() {
        Ok(n) => n,
        Err(e) => {
            log::warn!("[auth] session cleanup failed: {}", e);
            0
        }
    }
}
