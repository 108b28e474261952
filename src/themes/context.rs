use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::paging::Paged;
use crate::store::Store;

/// Pager handed to theme templates, with ready-made links.
#[derive(Debug, Clone, Serialize)]
pub struct Pagination {
    pub current: i64,
    pub size: i64,
    pub total: i64,
    pub pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
}

fn page_url(path: &str, page: i64, size: i64, lang: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("page", &page.to_string());
    query.append_pair("size", &size.to_string());
    if let Some(lang) = lang {
        query.append_pair("lang", lang);
    }
    format!("{}?{}", path, query.finish())
}

impl Pagination {
    /// `path` is the listing URL without a query string, e.g. `/themes/default`.
    pub fn from_paged<T>(paged: &Paged<T>, path: &str, lang: Option<&str>) -> Self {
        let has_previous = paged.has_previous();
        let has_next = paged.has_next();
        Pagination {
            current: paged.current,
            size: paged.size,
            total: paged.total,
            pages: paged.pages,
            has_previous,
            has_next,
            prev_url: has_previous.then(|| page_url(path, paged.current - 1, paged.size, lang)),
            next_url: has_next.then(|| page_url(path, paged.current + 1, paged.size, lang)),
        }
    }
}

/// `site` object built from the `site_*` settings.
pub fn site(store: &dyn Store) -> Value {
    let s = store.setting_get_group("site_");
    let get = |k: &str| s.get(k).cloned().unwrap_or_default();
    json!({
        "title": get("site_name"),
        "url": get("site_url"),
        "description": get("site_description"),
        "logo": get("site_logo"),
        "favicon": get("site_favicon"),
        "copyright": get("site_copyright"),
        "social": {
            "github": get("site_social_github"),
            "twitter": get("site_social_twitter"),
        },
    })
}

/// Turns `index.latestPosts = ...` into `{"index": {"latestPosts": ...}}` so
/// templates can write `i18n.index.latestPosts`. A key that is both a leaf and
/// a prefix keeps the leaf.
pub fn nest_messages(messages: &HashMap<String, String>) -> Value {
    let mut keys: Vec<&String> = messages.keys().collect();
    // Shorter keys first so leaves are placed before deeper paths try to claim them.
    keys.sort_by_key(|k| (k.matches('.').count(), k.as_str()));

    let mut root = Map::new();
    for key in keys {
        let parts: Vec<&str> = key.split('.').collect();
        let Some((last, parents)) = parts.split_last() else {
            continue;
        };
        insert_path(&mut root, parents, last, &messages[key]);
    }
    Value::Object(root)
}

/// Places `value` under `parents`, creating objects on the way. Gives up
/// when a parent is already a leaf or the leaf name is taken.
fn insert_path(node: &mut Map<String, Value>, parents: &[&str], last: &str, value: &str) {
    match parents.split_first() {
        None => {
            if !node.contains_key(last) {
                node.insert(last.to_string(), Value::String(value.to_string()));
            }
        }
        Some((head, rest)) => {
            let child = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, last, value);
            }
        }
    }
}
