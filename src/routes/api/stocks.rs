use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::tokio;
use rocket::State;
use serde::Deserialize;

use crate::fetchers;
use crate::models::stock::StockQuote;
use crate::paging::{PageRequest, Paged};
use crate::routes::{done, fail, not_found, ok, paged, reject, ApiResult};
use crate::security::auth::AdminUser;
use crate::store::Store;

#[derive(Debug, Deserialize)]
pub struct PriceForm {
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct HotForm {
    pub is_hot: bool,
    pub hot_rank: Option<i64>,
}

fn limit_or(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, 100)
}

#[get("/stocks?<page>&<size>")]
pub fn list(store: &State<Arc<dyn Store>>, page: Option<i64>, size: Option<i64>) -> ApiResult {
    let req = PageRequest::new(page, size);
    let items = store.stock_list_paginated(req.limit(), req.offset());
    paged(Paged::new(items, store.stock_count(), req))
}

#[get("/stocks/hot?<limit>")]
pub fn hot(store: &State<Arc<dyn Store>>, limit: Option<i64>) -> ApiResult {
    ok(store.stock_hot(limit_or(limit, 10)))
}

#[get("/stocks/gainers?<limit>")]
pub fn gainers(store: &State<Arc<dyn Store>>, limit: Option<i64>) -> ApiResult {
    ok(store.stock_gainers(limit_or(limit, 10)))
}

#[get("/stocks/losers?<limit>")]
pub fn losers(store: &State<Arc<dyn Store>>, limit: Option<i64>) -> ApiResult {
    ok(store.stock_losers(limit_or(limit, 10)))
}

#[get("/stocks/overview")]
pub fn overview(store: &State<Arc<dyn Store>>) -> ApiResult {
    ok(store.stock_market_overview())
}

#[get("/stocks/<id>")]
pub fn get(store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.stock_find_by_id(id).map_or_else(|| Err(not_found("Stock")), ok)
}

/// Latest stored quote for a symbol.
#[get("/stocks/symbol/<symbol>")]
pub fn quote(store: &State<Arc<dyn Store>>, symbol: &str) -> ApiResult {
    store.stock_find_by_symbol(symbol).map_or_else(|| Err(not_found("Stock")), ok)
}

#[get("/stocks/market/<market>")]
pub fn by_market(store: &State<Arc<dyn Store>>, market: &str) -> ApiResult {
    store.stock_by_market(market).map_err(reject).and_then(ok)
}

#[get("/stocks/search?<keyword>")]
pub fn search(store: &State<Arc<dyn Store>>, keyword: &str) -> ApiResult {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(fail(Status::BadRequest, "Keyword is required"));
    }
    ok(store.stock_search(keyword))
}

/// Inserts or partially updates a stock keyed by symbol.
#[post("/stocks", format = "json", data = "<form>")]
pub fn upsert(_admin: AdminUser, store: &State<Arc<dyn Store>>, form: Json<StockQuote>) -> ApiResult {
    let id = store.stock_upsert(&form).map_err(reject)?;
    store.stock_find_by_id(id).map_or_else(|| Err(not_found("Stock")), ok)
}

#[put("/stocks/symbol/<symbol>/price", format = "json", data = "<form>")]
pub fn update_price(_admin: AdminUser, store: &State<Arc<dyn Store>>, symbol: &str, form: Json<PriceForm>) -> ApiResult {
    store.stock_update_price(symbol, form.price).map_err(reject)?;
    store.stock_find_by_symbol(symbol).map_or_else(|| Err(not_found("Stock")), ok)
}

#[put("/stocks/<id>/hot", format = "json", data = "<form>")]
pub fn set_hot(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64, form: Json<HotForm>) -> ApiResult {
    store
        .stock_set_hot(id, form.is_hot, form.hot_rank.unwrap_or(0))
        .map_err(reject)?;
    store.stock_find_by_id(id).map_or_else(|| Err(not_found("Stock")), ok)
}

#[delete("/stocks/<id>")]
pub fn delete(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> ApiResult {
    store.stock_delete(id).map_err(reject)?;
    done("Stock deleted")
}

/// Runs the quote fetcher now, falling back to simulated prices.
#[post("/stocks/fetch")]
pub async fn fetch_now(_admin: AdminUser, store: &State<Arc<dyn Store>>) -> ApiResult {
    let s = Arc::clone(store.inner());
    let items = tokio::task::spawn_blocking(move || fetchers::stock::fetch_stocks(&*s))
        .await
        .map_err(|e| fail(Status::InternalServerError, format!("Stock fetch failed: {}", e)))?;
    ok(items)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        list,
        hot,
        gainers,
        losers,
        overview,
        get,
        quote,
        by_market,
        search,
        upsert,
        update_price,
        set_hot,
        delete,
        fetch_now
    ]
}
