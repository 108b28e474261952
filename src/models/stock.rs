use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use super::round2;
use crate::db::DbPool;

pub const MARKETS: &[&str] = &["SH", "SZ", "HK", "US", "OTHER"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    pub name: Option<String>,
    pub name_cn: Option<String>,
    pub market: String,
    pub price: Option<f64>,
    pub change_amount: Option<f64>,
    pub change_percent: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub prev_close: Option<f64>,
    pub volume: Option<i64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub is_hot: bool,
    pub hot_rank: i64,
    pub last_updated: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

/// Upsert payload keyed by `symbol`. `None` fields keep the stored value.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StockQuote {
    pub symbol: String,
    pub name: Option<String>,
    pub name_cn: Option<String>,
    pub market: Option<String>,
    pub price: Option<f64>,
    pub change_amount: Option<f64>,
    pub change_percent: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub open: Option<f64>,
    pub prev_close: Option<f64>,
    pub volume: Option<i64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub is_hot: Option<bool>,
    pub hot_rank: Option<i64>,
}

#[derive(Debug, Serialize, Clone)]
pub struct MarketOverview {
    pub market: String,
    pub count: i64,
    pub average_change_percent: f64,
    pub top_gainer: Option<String>,
    pub top_loser: Option<String>,
}

impl Stock {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Stock {
            id: row.get("id")?,
            symbol: row.get("symbol")?,
            name: row.get("name")?,
            name_cn: row.get("name_cn")?,
            market: row.get("market")?,
            price: row.get("price")?,
            change_amount: row.get("change_amount")?,
            change_percent: row.get("change_percent")?,
            high: row.get("high")?,
            low: row.get("low")?,
            open: row.get("open")?,
            prev_close: row.get("prev_close")?,
            volume: row.get("volume")?,
            market_cap: row.get("market_cap")?,
            pe_ratio: row.get("pe_ratio")?,
            is_hot: row.get::<_, i64>("is_hot")? != 0,
            hot_rank: row.get("hot_rank")?,
            last_updated: row.get("last_updated")?,
            created_at: row.get("created_at")?,
        })
    }

    fn query(pool: &DbPool, tail: &str, args: &[&dyn rusqlite::types::ToSql]) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!("SELECT * FROM stocks {}", tail)) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(args, Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn find_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row("SELECT * FROM stocks WHERE id = ?1", params![id], Self::from_row)
            .ok()
    }

    pub fn find_by_symbol(pool: &DbPool, symbol: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM stocks WHERE symbol = ?1",
            params![symbol.trim().to_uppercase()],
            Self::from_row,
        )
        .ok()
    }

    pub fn list_paginated(pool: &DbPool, limit: i64, offset: i64) -> Vec<Self> {
        Self::query(
            pool,
            "ORDER BY last_updated DESC, id DESC LIMIT ?1 OFFSET ?2",
            &[&limit, &offset],
        )
    }

    pub fn count(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row("SELECT COUNT(*) FROM stocks", [], |row| row.get(0))
            .unwrap_or(0)
    }

    pub fn hot(pool: &DbPool, limit: i64) -> Vec<Self> {
        Self::query(
            pool,
            "WHERE is_hot = 1 ORDER BY hot_rank ASC, id ASC LIMIT ?1",
            &[&limit],
        )
    }

    pub fn gainers(pool: &DbPool, limit: i64) -> Vec<Self> {
        Self::query(
            pool,
            "WHERE change_percent > 0 ORDER BY change_percent DESC LIMIT ?1",
            &[&limit],
        )
    }

    pub fn losers(pool: &DbPool, limit: i64) -> Vec<Self> {
        Self::query(
            pool,
            "WHERE change_percent < 0 ORDER BY change_percent ASC LIMIT ?1",
            &[&limit],
        )
    }

    pub fn by_market(pool: &DbPool, market: &str) -> Result<Vec<Self>, String> {
        let market = super::normalize_enum(market, MARKETS, "market")?;
        Ok(Self::query(
            pool,
            "WHERE market = ?1 ORDER BY hot_rank ASC, symbol ASC",
            &[&market],
        ))
    }

    pub fn search(pool: &DbPool, keyword: &str) -> Vec<Self> {
        let pattern = format!("%{}%", keyword.trim());
        Self::query(
            pool,
            "WHERE symbol LIKE ?1 OR name LIKE ?1 OR name_cn LIKE ?1 ORDER BY symbol ASC",
            &[&pattern],
        )
    }

    /// Inserts a new symbol or patches the stored one. Prices are rounded to cents.
    pub fn upsert(pool: &DbPool, quote: &StockQuote) -> Result<i64, String> {
        let symbol = quote.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err("Symbol is required".to_string());
        }
        let market = match &quote.market {
            Some(m) => Some(super::normalize_enum(m, MARKETS, "market")?),
            None => None,
        };
        let r = |v: Option<f64>| v.map(round2);
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO stocks (symbol, name, name_cn, market, price, change_amount, change_percent,
                                 high, low, open, prev_close, volume, market_cap, pe_ratio,
                                 is_hot, hot_rank, last_updated)
             VALUES (?1, ?2, ?3, COALESCE(?4, 'OTHER'), ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     COALESCE(?15, 0), COALESCE(?16, 0), CURRENT_TIMESTAMP)
             ON CONFLICT(symbol) DO UPDATE SET
                name = COALESCE(excluded.name, name),
                name_cn = COALESCE(excluded.name_cn, name_cn),
                market = COALESCE(?4, market),
                price = COALESCE(excluded.price, price),
                change_amount = COALESCE(excluded.change_amount, change_amount),
                change_percent = COALESCE(excluded.change_percent, change_percent),
                high = COALESCE(excluded.high, high),
                low = COALESCE(excluded.low, low),
                open = COALESCE(excluded.open, open),
                prev_close = COALESCE(excluded.prev_close, prev_close),
                volume = COALESCE(excluded.volume, volume),
                market_cap = COALESCE(excluded.market_cap, market_cap),
                pe_ratio = COALESCE(excluded.pe_ratio, pe_ratio),
                is_hot = COALESCE(?15, is_hot),
                hot_rank = COALESCE(?16, hot_rank),
                last_updated = CURRENT_TIMESTAMP",
            params![
                symbol,
                quote.name,
                quote.name_cn,
                market,
                r(quote.price),
                r(quote.change_amount),
                r(quote.change_percent),
                r(quote.high),
                r(quote.low),
                r(quote.open),
                r(quote.prev_close),
                quote.volume,
                r(quote.market_cap),
                r(quote.pe_ratio),
                quote.is_hot.map(|b| b as i64),
                quote.hot_rank,
            ],
        )
        .map_err(|e| e.to_string())?;
        conn.query_row(
            "SELECT id FROM stocks WHERE symbol = ?1",
            params![symbol],
            |row| row.get(0),
        )
        .map_err(|e| e.to_string())
    }

    /// Sets a new price and derives change from the previous close when one is stored.
    pub fn update_price(pool: &DbPool, symbol: &str, price: f64) -> Result<(), String> {
        let existing = Self::find_by_symbol(pool, symbol).ok_or("Stock not found")?;
        let (change, percent) = match existing.prev_close {
            Some(prev) if prev != 0.0 => {
                let change = price - prev;
                (Some(round2(change)), Some(round2(change / prev * 100.0)))
            }
            _ => (existing.change_amount, existing.change_percent),
        };
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE stocks SET price = ?1, change_amount = ?2, change_percent = ?3,
                last_updated = CURRENT_TIMESTAMP
             WHERE id = ?4",
            params![round2(price), change, percent, existing.id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn set_hot(pool: &DbPool, id: i64, is_hot: bool, hot_rank: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let changed = conn
            .execute(
                "UPDATE stocks SET is_hot = ?1, hot_rank = ?2 WHERE id = ?3",
                params![is_hot as i64, hot_rank, id],
            )
            .map_err(|e| e.to_string())?;
        if changed == 0 {
            return Err("Stock not found".to_string());
        }
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let removed = conn
            .execute("DELETE FROM stocks WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        if removed == 0 {
            return Err("Stock not found".to_string());
        }
        Ok(())
    }

    /// One row per market that has stocks, in `MARKETS` order.
    pub fn market_overview(pool: &DbPool) -> Vec<MarketOverview> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut out = Vec::new();
        for market in MARKETS {
            let (count, avg): (i64, Option<f64>) = match conn.query_row(
                "SELECT COUNT(*), AVG(change_percent) FROM stocks WHERE market = ?1",
                params![market],
                |row| Ok((row.get(0)?, row.get(1)?)),
            ) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if count == 0 {
                continue;
            }
            let pick = |sql: &str| -> Option<String> {
                conn.query_row(sql, params![market], |row| row.get(0)).ok()
            };
            out.push(MarketOverview {
                market: market.to_string(),
                count,
                average_change_percent: round2(avg.unwrap_or(0.0)),
                top_gainer: pick(
                    "SELECT symbol FROM stocks WHERE market = ?1 AND change_percent > 0
                     ORDER BY change_percent DESC LIMIT 1",
                ),
                top_loser: pick(
                    "SELECT symbol FROM stocks WHERE market = ?1 AND change_percent < 0
                     ORDER BY change_percent ASC LIMIT 1",
                ),
            });
        }
        out
    }
}
