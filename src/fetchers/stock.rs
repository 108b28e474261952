use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde_json::Value;

use crate::models::round2;
use crate::models::stock::{Stock, StockQuote};
use crate::store::Store;

const ZHITU_REALTIME_URL: &str = "https://api.zhituapi.com/hs/real/time";

/// A-share symbols requested from the quote provider.
pub const A_SHARE_SYMBOLS: &[&str] = &[
    "000001", "600519", "601318", "000858", "300750", "000333", "601012", "002594", "600036",
    "600000", "000002", "601166", "600276", "600030", "601398",
];

/// (symbol, Chinese name, English name, market) refreshed with simulated
/// prices when no real quote was fetched.
pub const POPULAR_STOCKS: &[(&str, &str, &str, &str)] = &[
    ("600519", "贵州茅台", "Kweichow Moutai", "SH"),
    ("601318", "中国平安", "Ping An Insurance", "SH"),
    ("000858", "五粮液", "Wuliangye", "SZ"),
    ("300750", "宁德时代", "CATL", "SZ"),
    ("000333", "美的集团", "Midea Group", "SZ"),
    ("601012", "隆基绿能", "LONGi Green Energy", "SH"),
    ("002594", "比亚迪", "BYD", "SZ"),
    ("600036", "招商银行", "CMB", "SH"),
    ("00700", "腾讯控股", "Tencent", "HK"),
    ("09988", "阿里巴巴", "Alibaba", "HK"),
    ("03690", "美团", "Meituan", "HK"),
    ("09888", "百度集团", "Baidu", "HK"),
    ("AAPL", "苹果", "Apple Inc.", "US"),
    ("GOOGL", "谷歌", "Alphabet Inc.", "US"),
    ("MSFT", "微软", "Microsoft", "US"),
    ("TSLA", "特斯拉", "Tesla Inc.", "US"),
    ("NVDA", "英伟达", "NVIDIA", "US"),
    ("META", "Meta", "Meta Platforms", "US"),
];

static HK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^0\d{4}$").expect("valid HK symbol regex"));
static SH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^6\d{5}$").expect("valid SH symbol regex"));
static SZ_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[03]\d{5}$").expect("valid SZ symbol regex"));
static US_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]+$").expect("valid US symbol regex"));

pub fn determine_market(symbol: &str) -> &'static str {
    if HK_RE.is_match(symbol) {
        "HK"
    } else if SH_RE.is_match(symbol) {
        "SH"
    } else if SZ_RE.is_match(symbol) {
        "SZ"
    } else if US_RE.is_match(symbol) {
        "US"
    } else {
        "OTHER"
    }
}

/// First alias present as a number or a numeric string.
fn pick_f64(node: &Value, aliases: &[&str]) -> Option<f64> {
    aliases.iter().find_map(|key| match node.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn pick_i64(node: &Value, aliases: &[&str]) -> Option<i64> {
    pick_f64(node, aliases).map(|v| v as i64)
}

/// Maps a provider payload onto a quote. Change and change percent missing
/// from the payload are derived from the previous close.
pub fn parse_quote(symbol: &str, node: &Value) -> StockQuote {
    let code = node
        .get("code")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .unwrap_or(symbol)
        .to_string();
    let name = node
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| code.clone());

    let price = pick_f64(node, &["price", "now", "trade"]).map(round2);
    let prev_close = pick_f64(node, &["preClose", "yestClose", "prevClose"]).map(round2);
    let mut change = pick_f64(node, &["change", "updown"]).map(round2);
    let mut percent = pick_f64(node, &["pctChg", "percent", "updownPercent"]).map(round2);

    if let (Some(p), Some(prev)) = (price, prev_close) {
        if prev > 0.0 {
            if change.is_none() {
                change = Some(round2(p - prev));
            }
            if percent.is_none() {
                percent = change.map(|c| round2(c / prev * 100.0));
            }
        }
    }

    StockQuote {
        market: Some(determine_market(&code).to_string()),
        symbol: code,
        name_cn: Some(name.clone()),
        name: Some(name),
        price,
        change_amount: change,
        change_percent: percent,
        high: pick_f64(node, &["high", "max"]).map(round2),
        low: pick_f64(node, &["low", "min"]).map(round2),
        open: pick_f64(node, &["open", "todayStart"]).map(round2),
        prev_close,
        volume: pick_i64(node, &["volume", "vol", "tradedVol"]),
        ..Default::default()
    }
}

/// Stores a quote. New symbols become hot with a random rank; existing rows
/// keep their hot flags.
fn save_quote(store: &dyn Store, mut quote: StockQuote) -> Option<Stock> {
    if store.stock_find_by_symbol(&quote.symbol).is_none() {
        quote.is_hot = Some(true);
        quote.hot_rank = Some(rand::thread_rng().gen_range(1..=20));
    }
    match store.stock_upsert(&quote) {
        Ok(id) => store.stock_find_by_id(id),
        Err(e) => {
            log::warn!("[fetch] cannot store {}: {}", quote.symbol, e);
            None
        }
    }
}

/// Real-time quotes for the A-share list. Empty when no token is configured.
pub fn fetch_realtime(store: &dyn Store) -> Vec<Stock> {
    let token = store.setting_get_or("stock_api_token", "");
    if token.trim().is_empty() {
        log::debug!("[fetch] stock_api_token not set, skipping quote provider");
        return vec![];
    }
    let client = match super::http_client() {
        Ok(c) => c,
        Err(e) => {
            log::warn!("[fetch] {}", e);
            return vec![];
        }
    };

    let mut out = Vec::new();
    for symbol in A_SHARE_SYMBOLS {
        let mut url = match url::Url::parse(&format!("{}/{}", ZHITU_REALTIME_URL, symbol)) {
            Ok(u) => u,
            Err(_) => continue,
        };
        url.query_pairs_mut().append_pair("token", token.trim());
        match super::get_json(&client, url.as_str()) {
            Ok(node) if node.is_object() => {
                if let Some(stock) = save_quote(store, parse_quote(symbol, &node)) {
                    out.push(stock);
                }
            }
            Ok(_) => log::warn!("[fetch] empty quote for {}", symbol),
            Err(e) => log::warn!("[fetch] quote for {}: {}", symbol, e),
        }
    }
    out
}

/// 31-based rolling string hash, so base prices stay stable across restarts.
fn symbol_hash(symbol: &str) -> i64 {
    let h = symbol
        .chars()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32));
    (h as i64).abs()
}

/// Deterministic base price for a symbol: 10..2000 for A-shares, 50..500 for
/// Hong Kong and US listings, 100 otherwise.
pub fn base_price(symbol: &str, market: &str) -> f64 {
    let hash = symbol_hash(symbol);
    match market {
        "SH" | "SZ" => (hash % 1990 + 10) as f64,
        "HK" | "US" => (hash % 450 + 50) as f64,
        _ => 100.0,
    }
}

/// Quote around the symbol's base price with a change of at most ±5 %.
pub fn simulated_quote<R: Rng>(
    rng: &mut R,
    symbol: &str,
    name_cn: &str,
    name: &str,
    market: &str,
) -> StockQuote {
    let base = base_price(symbol, market);
    let percent = round2(rng.gen_range(-5.0..=5.0));
    let change = round2(base * percent / 100.0);
    let price = round2(base + change);
    StockQuote {
        symbol: symbol.to_string(),
        name: Some(name.to_string()),
        name_cn: Some(name_cn.to_string()),
        market: Some(market.to_string()),
        price: Some(price),
        change_amount: Some(change),
        change_percent: Some(percent),
        high: Some(round2(price * 1.02)),
        low: Some(round2(price * 0.98)),
        open: Some(round2(base * (1.0 + rng.gen_range(-0.01..=0.01)))),
        prev_close: Some(base),
        volume: Some(rng.gen_range(10_000_000..110_000_000)),
        market_cap: Some((price * rng.gen_range(1.0e9..1.1e10)).round()),
        pe_ratio: Some(round2(rng.gen_range(5.0..55.0))),
        ..Default::default()
    }
}

pub fn refresh_popular(store: &dyn Store) -> Vec<Stock> {
    let mut rng = rand::thread_rng();
    let quotes: Vec<StockQuote> = POPULAR_STOCKS
        .iter()
        .map(|(symbol, name_cn, name, market)| simulated_quote(&mut rng, symbol, name_cn, name, market))
        .collect();
    let out: Vec<Stock> = quotes
        .into_iter()
        .filter_map(|q| save_quote(store, q))
        .collect();
    log::info!("[fetch] refreshed {} simulated quotes", out.len());
    out
}

/// Real quotes when available, simulated popular stocks otherwise.
pub fn fetch_stocks(store: &dyn Store) -> Vec<Stock> {
    let fetched = fetch_realtime(store);
    if fetched.is_empty() {
        refresh_popular(store)
    } else {
        log::info!("[fetch] stored {} real-time quotes", fetched.len());
        fetched
    }
}
