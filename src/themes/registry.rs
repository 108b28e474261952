use std::collections::HashMap;
use std::error::Error as _;
use std::path::Path;
use std::sync::{Arc, RwLock};

use rocket_dyn_templates::tera::{Context, Tera};

/// Templates every theme must ship.
pub const REQUIRED_TEMPLATES: &[&str] = &["index", "post"];

/// Parsed templates per theme, keyed by theme id. A theme is inserted only
/// after all of its templates compiled, so lookups never hit a half-loaded theme.
#[derive(Default)]
pub struct TemplateRegistry {
    themes: RwLock<HashMap<String, Arc<Tera>>>,
}

/// `index` -> `index.html`; names that already carry the extension pass through.
pub fn template_file(name: &str) -> String {
    if name.ends_with(".html") {
        name.to_string()
    } else {
        format!("{}.html", name)
    }
}

/// Tera error with its cause chain, which is where the line numbers live.
pub fn describe(err: &rocket_dyn_templates::tera::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `<dir>/templates/**/*.html` into one Tera instance and checks
    /// that the required templates are present.
    pub fn compile(dir: &Path) -> Result<Tera, String> {
        let templates = dir.join("templates");
        if !templates.is_dir() {
            return Err(format!("{} has no templates directory", dir.display()));
        }
        let glob = format!("{}/**/*.html", templates.display());
        let tera = Tera::new(&glob).map_err(|e| describe(&e))?;

        let names: Vec<&str> = tera.get_template_names().collect();
        for required in REQUIRED_TEMPLATES {
            let file = template_file(required);
            if !names.contains(&file.as_str()) {
                return Err(format!("Missing required template: {}", file));
            }
        }
        Ok(tera)
    }

    /// Compiles and (re)registers a theme. On error the previous entry stays.
    pub fn load(&self, theme_id: &str, dir: &Path) -> Result<(), String> {
        let tera = Self::compile(dir)?;
        let mut themes = self.themes.write().unwrap_or_else(|e| e.into_inner());
        themes.insert(theme_id.to_string(), Arc::new(tera));
        log::info!("[theme] loaded templates for {}", theme_id);
        Ok(())
    }

    pub fn unload(&self, theme_id: &str) {
        let mut themes = self.themes.write().unwrap_or_else(|e| e.into_inner());
        themes.remove(theme_id);
    }

    pub fn contains(&self, theme_id: &str) -> bool {
        let themes = self.themes.read().unwrap_or_else(|e| e.into_inner());
        themes.contains_key(theme_id)
    }

    pub fn template_names(&self, theme_id: &str) -> Vec<String> {
        let themes = self.themes.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = themes
            .get(theme_id)
            .map(|t| t.get_template_names().map(str::to_string).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Renders `name` from a loaded theme. An unknown theme or template is an error.
    pub fn render(&self, theme_id: &str, name: &str, ctx: &Context) -> Result<String, String> {
        let tera = {
            let themes = self.themes.read().unwrap_or_else(|e| e.into_inner());
            themes
                .get(theme_id)
                .cloned()
                .ok_or_else(|| format!("Theme not loaded: {}", theme_id))?
        };
        let file = template_file(name);
        if !tera.get_template_names().any(|n| n == file) {
            return Err(format!("Template not found: {}/{}", theme_id, file));
        }
        tera.render(&file, ctx).map_err(|e| describe(&e))
    }
}
