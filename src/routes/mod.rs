pub mod api;
pub mod site;

use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;
use serde_json::{json, Value};

use crate::paging::Paged;

pub type ApiError = Custom<Json<Value>>;
pub type ApiResult = Result<Json<Value>, ApiError>;

pub fn fail(status: Status, msg: impl Into<String>) -> ApiError {
    Custom(status, Json(json!({"success": false, "error": msg.into()})))
}

/// Maps a model error message to a status: missing rows are 404, duplicates
/// and forbidden state changes 409, everything else 400.
pub fn reject(msg: String) -> ApiError {
    let lower = msg.to_lowercase();
    let status = if lower.contains("not found") {
        Status::NotFound
    } else if lower.contains("already exists") || lower.starts_with("cannot ") {
        Status::Conflict
    } else {
        Status::BadRequest
    };
    fail(status, msg)
}

pub fn not_found(what: &str) -> ApiError {
    fail(Status::NotFound, format!("{} not found", what))
}

pub fn ok<T: Serialize>(data: T) -> ApiResult {
    Ok(Json(json!({"success": true, "data": data})))
}

pub fn done(message: &str) -> ApiResult {
    Ok(Json(json!({"success": true, "message": message})))
}

pub fn paged<T: Serialize>(page: Paged<T>) -> ApiResult {
    ok(page)
}

// ── Catchers ──

fn error_body(status: Status, msg: &str) -> Json<Value> {
    Json(json!({"success": false, "status": status.code, "error": msg}))
}

#[catch(400)]
fn bad_request() -> Json<Value> {
    error_body(Status::BadRequest, "Bad request")
}

#[catch(401)]
fn unauthorized() -> Json<Value> {
    error_body(Status::Unauthorized, "Authentication required")
}

#[catch(403)]
fn forbidden() -> Json<Value> {
    error_body(Status::Forbidden, "Insufficient permissions")
}

#[catch(404)]
fn not_found_catcher(req: &Request<'_>) -> Json<Value> {
    error_body(Status::NotFound, &format!("No route for {}", req.uri().path()))
}

#[catch(413)]
fn payload_too_large() -> Json<Value> {
    error_body(Status::PayloadTooLarge, "Payload too large")
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    error_body(Status::UnprocessableEntity, "Malformed request body")
}

#[catch(429)]
fn too_many_requests() -> Json<Value> {
    error_body(Status::TooManyRequests, "Too many requests")
}

#[catch(500)]
fn server_error() -> Json<Value> {
    error_body(Status::InternalServerError, "Internal server error")
}

pub fn catchers() -> Vec<rocket::Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found_catcher,
        payload_too_large,
        unprocessable,
        too_many_requests,
        server_error
    ]
}
