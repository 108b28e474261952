use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const DEFAULT_LOCALE: &str = "en";

type Messages = Arc<HashMap<String, String>>;

/// Per-theme message bundles read from `themes/<id>/i18n/*.properties`.
pub struct Translations {
    themes_dir: PathBuf,
    cache: RwLock<HashMap<(String, String), Messages>>,
}

impl Translations {
    pub fn new(themes_dir: impl Into<PathBuf>) -> Self {
        Translations {
            themes_dir: themes_dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn i18n_dir(&self, theme_id: &str) -> PathBuf {
        self.themes_dir.join(theme_id).join("i18n")
    }

    /// Properties file for a locale: exact name, then the underscore
    /// variant (`zh-CN` -> `zh_CN`). The empty locale is `messages.properties`,
    /// which also stands in for a missing `messages_en.properties`.
    fn resolve_file(&self, theme_id: &str, locale: &str) -> Option<PathBuf> {
        let dir = self.i18n_dir(theme_id);
        let mut candidates = Vec::with_capacity(3);
        if !locale.is_empty() {
            candidates.push(format!("messages_{}.properties", locale));
            candidates.push(format!("messages_{}.properties", locale.replace('-', "_")));
        }
        if locale.is_empty() || locale == DEFAULT_LOCALE {
            candidates.push("messages.properties".to_string());
        }
        candidates.iter().map(|f| dir.join(f)).find(|p| p.is_file())
    }

    /// Bundle for one locale, loaded once and cached.
    pub fn bundle(&self, theme_id: &str, locale: &str) -> Messages {
        let key = (theme_id.to_string(), locale.to_string());
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(m) = cache.get(&key) {
                return Arc::clone(m);
            }
        }
        let messages = match self.resolve_file(theme_id, locale) {
            Some(path) => match fs::read_to_string(&path) {
                Ok(text) => parse_properties(&text),
                Err(e) => {
                    log::warn!("[theme] cannot read {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };
        let messages = Arc::new(messages);
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(key, Arc::clone(&messages));
        messages
    }

    /// Exact locale, base locale, `en`, the root bundle, then the key itself.
    pub fn translate(&self, theme_id: &str, locale: &str, key: &str) -> String {
        for candidate in fallback_chain(locale) {
            if let Some(v) = self.bundle(theme_id, &candidate).get(key) {
                return v.clone();
            }
        }
        key.to_string()
    }

    /// `translate` followed by `{0}`, `{1}`, ... substitution.
    pub fn translate_with(&self, theme_id: &str, locale: &str, key: &str, args: &[&str]) -> String {
        let mut text = self.translate(theme_id, locale, key);
        for (i, arg) in args.iter().enumerate() {
            text = text.replace(&format!("{{{}}}", i), arg);
        }
        text
    }

    /// Every key visible for `locale`, with more specific locales winning.
    pub fn messages(&self, theme_id: &str, locale: &str) -> HashMap<String, String> {
        let mut merged = HashMap::new();
        for candidate in fallback_chain(locale).into_iter().rev() {
            for (k, v) in self.bundle(theme_id, &candidate).iter() {
                merged.insert(k.clone(), v.clone());
            }
        }
        merged
    }

    /// Locales derived from file names. `messages.properties` counts as `en`.
    pub fn available_locales(&self, theme_id: &str) -> Vec<String> {
        let mut locales = BTreeSet::new();
        let entries = match fs::read_dir(self.i18n_dir(theme_id)) {
            Ok(e) => e,
            Err(_) => return vec![],
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = name.strip_suffix(".properties") else {
                continue;
            };
            if stem == "messages" {
                locales.insert(DEFAULT_LOCALE.to_string());
            } else if let Some(locale) = stem.strip_prefix("messages_") {
                if !locale.is_empty() {
                    locales.insert(locale.replace('_', "-"));
                }
            }
        }
        locales.into_iter().collect()
    }

    pub fn clear_cache(&self, theme_id: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.retain(|(theme, _), _| theme != theme_id);
    }

    pub fn clear_all(&self) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.clear();
    }

    /// Drops the theme's cached bundles and reads every available locale again.
    pub fn reload(&self, theme_id: &str) {
        self.clear_cache(theme_id);
        for locale in self.available_locales(theme_id) {
            self.bundle(theme_id, &locale);
        }
        log::info!("[theme] reloaded translations for {}", theme_id);
    }

    pub fn themes_dir(&self) -> &Path {
        &self.themes_dir
    }
}

/// `zh-CN` -> [`zh-CN`, `zh`, `en`, ``], without duplicates. The empty
/// entry is the root `messages.properties` bundle.
fn fallback_chain(locale: &str) -> Vec<String> {
    let mut chain: Vec<String> = Vec::with_capacity(4);
    let mut push = |l: &str| {
        if !l.is_empty() && !chain.iter().any(|c| c == l) {
            chain.push(l.to_string());
        }
    };
    push(locale);
    if let Some((base, _)) = locale.split_once('-') {
        push(base);
    }
    push(DEFAULT_LOCALE);
    chain.push(String::new());
    chain
}

/// Java-style `.properties` parser.
pub fn parse_properties(text: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let mut logical = line.trim_start().to_string();
        if logical.is_empty() || logical.starts_with('#') || logical.starts_with('!') {
            continue;
        }
        // Continuation: an odd number of trailing backslashes joins the next line.
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        out.insert(unescape(&key), unescape(value.trim_start()));
    }
    out
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (String, &str) {
    let mut key = String::new();
    let mut chars = line.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                key.push(c);
                if let Some((_, next)) = chars.next() {
                    key.push(next);
                }
            }
            '=' | ':' => return (key, &line[i + 1..]),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (key, rest);
            }
            _ => key.push(c),
        }
    }
    (key, "")
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let Ok(unit) = u16::from_str_radix(&hex, 16) else {
                    out.push_str("\\u");
                    out.push_str(&hex);
                    continue;
                };
                let mut units = vec![unit];
                // A high surrogate takes the following \uXXXX as its low half.
                if (0xD800..0xDC00).contains(&unit) {
                    let mut ahead = chars.clone();
                    if ahead.next() == Some('\\') && ahead.next() == Some('u') {
                        let low: String = ahead.by_ref().take(4).collect();
                        if let Ok(low) = u16::from_str_radix(&low, 16) {
                            if (0xDC00..0xE000).contains(&low) {
                                units.push(low);
                                chars = ahead;
                            }
                        }
                    }
                }
                out.extend(
                    char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)),
                );
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
