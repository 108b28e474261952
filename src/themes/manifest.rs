use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::theme::ThemeMeta;

pub const MANIFEST_FILES: &[&str] = &["theme.yaml", "theme.yml"];

// ── On-disk shape ──

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    id: Option<String>,
    name: Option<String>,
    version: Option<String>,
    author: Option<Author>,
    description: Option<String>,
    screenshot: Option<String>,
    requires: Option<String>,
    website: Option<String>,
    repo: Option<String>,
    #[serde(default)]
    settings: Vec<RawGroup>,
    i18n: Option<I18nConfig>,
    #[serde(default)]
    features: Features,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    group: String,
    label: Option<String>,
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    name: String,
    label: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    description: Option<String>,
    default_value: Option<serde_yaml::Value>,
    #[serde(default)]
    options: Vec<SelectOption>,
    min: Option<f64>,
    max: Option<f64>,
}

// ── Validated manifest ──

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Author {
    pub name: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct I18nConfig {
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default)]
    pub supported_locales: Vec<String>,
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for I18nConfig {
    fn default() -> Self {
        I18nConfig {
            default_locale: default_locale(),
            supported_locales: vec![default_locale()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub responsive: bool,
    #[serde(default)]
    pub pwa: bool,
    #[serde(default)]
    pub comments: bool,
    #[serde(default)]
    pub search: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

/// A settings control together with its typed default.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SettingKind {
    Text { default: String },
    Textarea { default: String },
    Switch { default: bool },
    Select { default: String, options: Vec<SelectOption> },
    Color { default: String },
    Number { default: f64, min: Option<f64>, max: Option<f64> },
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingItem {
    pub name: String,
    pub label: String,
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: SettingKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingGroup {
    pub group: String,
    pub label: String,
    pub items: Vec<SettingItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThemeManifest {
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    pub author: Option<Author>,
    pub description: Option<String>,
    pub screenshot: Option<String>,
    pub requires: Option<String>,
    pub website: Option<String>,
    pub repo: Option<String>,
    pub settings: Vec<SettingGroup>,
    pub i18n: I18nConfig,
    pub features: Features,
}

static THEME_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid theme id regex"));

pub fn is_valid_theme_id(id: &str) -> bool {
    THEME_ID_RE.is_match(id)
}

pub fn is_hex_color(value: &str) -> bool {
    let Some(hex) = value.strip_prefix('#') else {
        return false;
    };
    (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// `theme.yaml` (or `theme.yml`) inside `dir`, if present.
pub fn manifest_path(dir: &Path) -> Option<PathBuf> {
    MANIFEST_FILES
        .iter()
        .map(|f| dir.join(f))
        .find(|p| p.is_file())
}

impl ThemeManifest {
    /// Reads and validates the manifest of a theme folder.
    pub fn load(dir: &Path) -> Result<Self, String> {
        let path = manifest_path(dir)
            .ok_or_else(|| format!("theme.yaml not found in {}", dir.display()))?;
        let text = fs::read_to_string(&path).map_err(|e| format!("{}: {}", path.display(), e))?;
        Self::parse(&text)
    }

    pub fn parse(yaml: &str) -> Result<Self, String> {
        let raw: RawManifest =
            serde_yaml::from_str(yaml).map_err(|e| format!("Invalid theme.yaml: {}", e))?;

        let id = raw
            .id
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or("Invalid theme: id is required in theme.yaml")?;
        if !is_valid_theme_id(&id) {
            return Err(format!(
                "Invalid theme id '{}': use lowercase letters, digits, '-' or '_'",
                id
            ));
        }

        let mut seen = HashSet::new();
        let mut settings = Vec::with_capacity(raw.settings.len());
        for group in raw.settings {
            let mut items = Vec::with_capacity(group.items.len());
            for item in group.items {
                if !seen.insert(item.name.clone()) {
                    return Err(format!("Duplicate setting name: {}", item.name));
                }
                items.push(convert_item(item)?);
            }
            settings.push(SettingGroup {
                label: group.label.unwrap_or_else(|| group.group.clone()),
                group: group.group,
                items,
            });
        }

        Ok(ThemeManifest {
            name: raw.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| id.clone()),
            id,
            version: raw.version,
            author: raw.author,
            description: raw.description,
            screenshot: raw.screenshot,
            requires: raw.requires,
            website: raw.website,
            repo: raw.repo,
            settings,
            i18n: raw.i18n.unwrap_or_default(),
            features: raw.features,
        })
    }

    pub fn items(&self) -> impl Iterator<Item = &SettingItem> {
        self.settings.iter().flat_map(|g| g.items.iter())
    }

    pub fn item(&self, name: &str) -> Option<&SettingItem> {
        self.items().find(|i| i.name == name)
    }

    /// Item name to typed default.
    pub fn defaults(&self) -> Map<String, Value> {
        self.items()
            .map(|i| (i.name.clone(), i.default_value()))
            .collect()
    }

    /// Checks and coerces submitted values. Unknown names are rejected.
    pub fn validate_settings(&self, submitted: &Map<String, Value>) -> Result<Map<String, Value>, String> {
        let mut out = Map::new();
        for (name, value) in submitted {
            let item = self
                .item(name)
                .ok_or_else(|| format!("Unknown setting: {}", name))?;
            out.insert(name.clone(), item.coerce(value)?);
        }
        Ok(out)
    }

    /// Registry metadata; `config_json` is the whole validated manifest.
    pub fn meta(&self) -> ThemeMeta {
        let author = self.author.as_ref();
        ThemeMeta {
            theme_id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            author: author.and_then(|a| a.name.clone()),
            author_url: author.and_then(|a| a.website.clone()),
            description: self.description.clone(),
            screenshot: self.screenshot.clone(),
            config_json: serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string()),
        }
    }
}

fn yaml_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn convert_item(raw: RawItem) -> Result<SettingItem, String> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err("Setting name is required".to_string());
    }
    let dv = raw.default_value.as_ref();
    let bad_default = || format!("Invalid default for setting '{}'", name);

    let kind = match raw.kind.to_lowercase().as_str() {
        "text" => SettingKind::Text {
            default: dv.and_then(yaml_string).unwrap_or_default(),
        },
        "textarea" => SettingKind::Textarea {
            default: dv.and_then(yaml_string).unwrap_or_default(),
        },
        "switch" => SettingKind::Switch {
            default: match dv {
                None => false,
                Some(serde_yaml::Value::Bool(b)) => *b,
                Some(v) => parse_bool(&yaml_string(v).unwrap_or_default()).ok_or_else(bad_default)?,
            },
        },
        "select" => {
            if raw.options.is_empty() {
                return Err(format!("Select setting '{}' has no options", name));
            }
            let default = match dv {
                None => raw.options[0].value.clone(),
                Some(v) => yaml_string(v).ok_or_else(bad_default)?,
            };
            if !raw.options.iter().any(|o| o.value == default) {
                return Err(format!(
                    "Default '{}' of setting '{}' is not one of its options",
                    default, name
                ));
            }
            SettingKind::Select { default, options: raw.options }
        }
        "color" => {
            let default = dv
                .and_then(yaml_string)
                .unwrap_or_else(|| "#000000".to_string());
            if !is_hex_color(&default) {
                return Err(format!("Default of color setting '{}' must be a hex color", name));
            }
            SettingKind::Color { default }
        }
        "number" => {
            let default = match dv {
                None => raw.min.unwrap_or(0.0),
                Some(serde_yaml::Value::Number(n)) => n.as_f64().ok_or_else(bad_default)?,
                Some(v) => yaml_string(v)
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .ok_or_else(bad_default)?,
            };
            if raw.min.into_iter().chain(raw.max).any(|b| !b.is_finite()) {
                return Err(format!("Setting '{}' has a non-finite bound", name));
            }
            if let (Some(min), Some(max)) = (raw.min, raw.max) {
                if min > max {
                    return Err(format!("Setting '{}' has min greater than max", name));
                }
            }
            check_range(&name, default, raw.min, raw.max)?;
            SettingKind::Number { default, min: raw.min, max: raw.max }
        }
        other => return Err(format!("Unknown setting type '{}' for '{}'", other, name)),
    };

    Ok(SettingItem {
        label: raw.label.unwrap_or_else(|| name.clone()),
        name,
        description: raw.description,
        kind,
    })
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn check_range(name: &str, v: f64, min: Option<f64>, max: Option<f64>) -> Result<(), String> {
    if !v.is_finite() {
        return Err(format!("Setting '{}' must be a finite number", name));
    }
    if let Some(min) = min {
        if v < min {
            return Err(format!("Setting '{}' must be at least {}", name, min));
        }
    }
    if let Some(max) = max {
        if v > max {
            return Err(format!("Setting '{}' must be at most {}", name, max));
        }
    }
    Ok(())
}

impl SettingItem {
    pub fn default_value(&self) -> Value {
        match &self.kind {
            SettingKind::Text { default }
            | SettingKind::Textarea { default }
            | SettingKind::Color { default }
            | SettingKind::Select { default, .. } => Value::String(default.clone()),
            SettingKind::Switch { default } => Value::Bool(*default),
            SettingKind::Number { default, .. } => number(*default),
        }
    }

    /// Converts a submitted value to this item's type.
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        let invalid = || format!("Invalid value for setting '{}'", self.name);
        match &self.kind {
            SettingKind::Text { .. } | SettingKind::Textarea { .. } => match value {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                _ => Err(invalid()),
            },
            SettingKind::Switch { .. } => match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::String(s) => parse_bool(s).map(Value::Bool).ok_or_else(invalid),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(invalid()),
                },
                _ => Err(invalid()),
            },
            SettingKind::Select { options, .. } => {
                let s = value.as_str().ok_or_else(invalid)?;
                if options.iter().any(|o| o.value == s) {
                    Ok(Value::String(s.to_string()))
                } else {
                    Err(format!("'{}' is not an option of setting '{}'", s, self.name))
                }
            }
            SettingKind::Color { .. } => {
                let s = value.as_str().map(str::trim).ok_or_else(invalid)?;
                if is_hex_color(s) {
                    Ok(Value::String(s.to_string()))
                } else {
                    Err(format!("Setting '{}' must be a hex color", self.name))
                }
            }
            SettingKind::Number { min, max, .. } => {
                let v = match value {
                    Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
                    Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
                    _ => return Err(invalid()),
                };
                check_range(&self.name, v, *min, *max)?;
                Ok(number(v))
            }
        }
    }
}

fn number(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        Value::from(v as i64)
    } else {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}
