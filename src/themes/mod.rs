pub mod context;
pub mod default_theme;
pub mod i18n;
pub mod install;
pub mod manifest;
pub mod registry;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use rocket_dyn_templates::tera::Context;
use serde_json::{json, Map, Value};

use crate::models::post::PostView;
use crate::models::theme::ThemeRecord;
use crate::models::user::User;
use crate::paging::{PageRequest, Paged};
use crate::store::Store;

use context::Pagination;
use default_theme::DEFAULT_THEME_ID;
use i18n::Translations;
use manifest::{is_valid_theme_id, SettingGroup, ThemeManifest};
use registry::TemplateRegistry;

const RECENT_POSTS: i64 = 5;

/// Per-request inputs for a theme render.
pub struct RenderOptions<'a> {
    /// Link prefix for in-theme URLs: `""` for the active site, `/themes/<id>` otherwise.
    pub base: String,
    pub locale: Option<String>,
    pub user: Option<&'a User>,
}

/// Installed themes: the database registry, the parsed templates and the
/// translations, plus the id of the theme serving `/`.
pub struct ThemeEngine {
    store: Arc<dyn Store>,
    themes_dir: PathBuf,
    registry: TemplateRegistry,
    i18n: Translations,
    active: RwLock<String>,
    /// Held across every check-then-write on theme status or the active id.
    changes: Mutex<()>,
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

impl ThemeEngine {
    pub fn new(store: Arc<dyn Store>, themes_dir: impl Into<PathBuf>) -> Self {
        let themes_dir = themes_dir.into();
        ThemeEngine {
            store,
            i18n: Translations::new(themes_dir.clone()),
            themes_dir,
            registry: TemplateRegistry::new(),
            active: RwLock::new(DEFAULT_THEME_ID.to_string()),
            changes: Mutex::new(()),
        }
    }

    /// Prepares the themes directory, registers every theme found there and
    /// loads the active one.
    pub fn init(&self) -> Result<(), String> {
        fs::create_dir_all(&self.themes_dir)
            .map_err(|e| format!("{}: {}", self.themes_dir.display(), e))?;
        install::sweep_staging(&self.themes_dir);

        let default_dir = self.themes_dir.join(DEFAULT_THEME_ID);
        if manifest::manifest_path(&default_dir).is_none() {
            default_theme::write_to(&default_dir)?;
        }

        let found = self.scan();
        log::info!("[theme] {} theme(s) registered", found);

        let active_id = self
            .store
            .theme_find_active()
            .map(|t| t.theme_id)
            .unwrap_or_else(|| DEFAULT_THEME_ID.to_string());
        if let Err(e) = self.registry.load(&active_id, &self.theme_dir(&active_id)) {
            log::error!("[theme] active theme {} failed to load: {}", active_id, e);
            if active_id != DEFAULT_THEME_ID {
                self.registry.load(DEFAULT_THEME_ID, &default_dir)?;
                self.set_active(DEFAULT_THEME_ID);
                return Ok(());
            }
            return Err(e);
        }
        self.set_active(&active_id);
        Ok(())
    }

    /// Registers or refreshes every theme folder. Returns how many loaded cleanly.
    pub fn scan(&self) -> usize {
        let _changes = self.lock_changes();
        let entries = match fs::read_dir(&self.themes_dir) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("[theme] cannot read {}: {}", self.themes_dir.display(), e);
                return 0;
            }
        };

        let mut loaded = 0;
        for entry in entries.filter_map(|e| e.ok()) {
            let dir = entry.path();
            let folder = entry.file_name().to_string_lossy().to_string();
            if !dir.is_dir() || folder.starts_with('.') || manifest::manifest_path(&dir).is_none() {
                continue;
            }
            match self.check_theme_dir(&dir, &folder) {
                Ok(manifest) => {
                    let meta = manifest.meta();
                    let result = match self.store.theme_find_by_theme_id(&manifest.id) {
                        Some(existing) => {
                            let refreshed = self.store.theme_refresh_meta(&meta);
                            if existing.status == "ERROR" {
                                refreshed.and_then(|_| self.store.theme_set_status(&manifest.id, "ENABLED"))
                            } else {
                                refreshed
                            }
                        }
                        None => self.store.theme_insert(&meta, "ENABLED").map(|_| ()),
                    };
                    match result {
                        Ok(()) => loaded += 1,
                        Err(e) => log::error!("[theme] cannot register {}: {}", manifest.id, e),
                    }
                }
                Err(e) => {
                    log::error!("[theme] {} failed to load: {}", folder, e);
                    if self.store.theme_find_by_theme_id(&folder).is_some() {
                        let _ = self.store.theme_set_status(&folder, "ERROR");
                    }
                }
            }
        }

        if self.store.theme_find_active().is_none()
            && self.store.theme_find_by_theme_id(DEFAULT_THEME_ID).is_some()
        {
            if let Err(e) = self.store.theme_activate(DEFAULT_THEME_ID) {
                log::error!("[theme] cannot activate default theme: {}", e);
            }
        }
        loaded
    }

    /// A theme folder is usable when its manifest parses, its id matches the
    /// folder name and its templates compile.
    fn check_theme_dir(&self, dir: &Path, folder: &str) -> Result<ThemeManifest, String> {
        let manifest = ThemeManifest::load(dir)?;
        if manifest.id != folder {
            return Err(format!(
                "Theme id '{}' does not match folder '{}'",
                manifest.id, folder
            ));
        }
        TemplateRegistry::compile(dir)?;
        Ok(manifest)
    }

    fn theme_dir(&self, theme_id: &str) -> PathBuf {
        self.themes_dir.join(theme_id)
    }

    fn set_active(&self, theme_id: &str) {
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        *active = theme_id.to_string();
    }

    fn lock_changes(&self) -> MutexGuard<'_, ()> {
        self.changes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn require(&self, theme_id: &str) -> Result<ThemeRecord, String> {
        if !is_valid_theme_id(theme_id) {
            return Err(format!("Theme not found: {}", theme_id));
        }
        self.store
            .theme_find_by_theme_id(theme_id)
            .ok_or_else(|| format!("Theme not found: {}", theme_id))
    }

    // ── Queries ──

    pub fn list(&self) -> Vec<ThemeRecord> {
        self.store.theme_list()
    }

    pub fn get(&self, id: i64) -> Option<ThemeRecord> {
        self.store.theme_find_by_id(id)
    }

    pub fn get_by_theme_id(&self, theme_id: &str) -> Option<ThemeRecord> {
        self.store.theme_find_by_theme_id(theme_id)
    }

    pub fn active_theme_id(&self) -> String {
        self.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn active(&self) -> Option<ThemeRecord> {
        self.store.theme_find_active()
    }

    pub fn manifest(&self, theme_id: &str) -> Result<ThemeManifest, String> {
        self.require(theme_id)?;
        ThemeManifest::load(&self.theme_dir(theme_id))
    }

    pub fn themes_dir(&self) -> &Path {
        &self.themes_dir
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn i18n(&self) -> &Translations {
        &self.i18n
    }

    // ── State changes ──

    /// Makes `theme_id` the site theme. Its templates must compile before the
    /// database is touched, and the in-process id changes only after commit.
    pub fn activate(&self, theme_id: &str) -> Result<ThemeRecord, String> {
        let _changes = self.lock_changes();
        let record = self.require(theme_id)?;
        if record.status != "ENABLED" {
            return Err("Theme is not enabled".to_string());
        }
        self.registry.load(theme_id, &self.theme_dir(theme_id))?;
        self.store.theme_activate(theme_id)?;
        self.set_active(theme_id);
        log::info!("[theme] activated {}", theme_id);
        self.require(theme_id)
    }

    pub fn enable(&self, theme_id: &str) -> Result<(), String> {
        let _changes = self.lock_changes();
        self.require(theme_id)?;
        let dir = self.theme_dir(theme_id);
        if let Err(e) = self.check_theme_dir(&dir, theme_id) {
            let _ = self.store.theme_set_status(theme_id, "ERROR");
            return Err(e);
        }
        self.store.theme_set_status(theme_id, "ENABLED")
    }

    pub fn disable(&self, theme_id: &str) -> Result<(), String> {
        let _changes = self.lock_changes();
        let record = self.require(theme_id)?;
        if record.is_active || self.active_theme_id() == theme_id {
            return Err("Cannot disable the active theme".to_string());
        }
        self.store.theme_set_status(theme_id, "DISABLED")?;
        self.registry.unload(theme_id);
        Ok(())
    }

    // ── Settings ──

    pub fn settings_schema(&self, theme_id: &str) -> Result<Vec<SettingGroup>, String> {
        Ok(self.manifest(theme_id)?.settings)
    }

    pub fn default_settings(&self, theme_id: &str) -> Result<Map<String, Value>, String> {
        Ok(self.manifest(theme_id)?.defaults())
    }

    /// Stored values layered over the manifest defaults. Stored keys the
    /// schema no longer knows are dropped.
    pub fn effective_settings(&self, theme_id: &str) -> Result<Map<String, Value>, String> {
        let record = self.require(theme_id)?;
        let manifest = ThemeManifest::load(&self.theme_dir(theme_id))?;
        Ok(Self::layer_settings(&manifest, record.settings_json.as_deref()))
    }

    fn layer_settings(manifest: &ThemeManifest, stored: Option<&str>) -> Map<String, Value> {
        let mut settings = manifest.defaults();
        let stored: Map<String, Value> = stored
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        for (name, value) in stored {
            if let Some(item) = manifest.item(&name) {
                if let Ok(v) = item.coerce(&value) {
                    settings.insert(name, v);
                }
            }
        }
        settings
    }

    /// Validates `submitted` against the schema and merges it into the stored
    /// values. Returns the new effective settings.
    pub fn update_settings(
        &self,
        theme_id: &str,
        submitted: &Map<String, Value>,
    ) -> Result<Map<String, Value>, String> {
        let record = self.require(theme_id)?;
        let manifest = ThemeManifest::load(&self.theme_dir(theme_id))?;
        let validated = manifest.validate_settings(submitted)?;

        let mut stored: Map<String, Value> = record
            .settings_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        stored.extend(validated);
        let json = serde_json::to_string(&stored).map_err(|e| e.to_string())?;
        self.store.theme_set_settings(theme_id, &json)?;
        Ok(Self::layer_settings(&manifest, Some(&json)))
    }

    // ── Install / delete ──

    pub fn install(&self, bytes: &[u8]) -> Result<ThemeRecord, String> {
        let _changes = self.lock_changes();
        let store = &self.store;
        let is_taken = |id: &str| store.theme_find_by_theme_id(id).is_some();
        let manifest = install::install_archive(bytes, &self.themes_dir, &is_taken)?;

        if let Err(e) = self.store.theme_insert(&manifest.meta(), "ENABLED") {
            let _ = fs::remove_dir_all(self.theme_dir(&manifest.id));
            return Err(e);
        }
        self.i18n.clear_cache(&manifest.id);
        self.require(&manifest.id)
    }

    pub fn delete(&self, theme_id: &str) -> Result<(), String> {
        let _changes = self.lock_changes();
        let record = self.require(theme_id)?;
        if theme_id == DEFAULT_THEME_ID {
            return Err("Cannot delete the default theme".to_string());
        }
        if record.is_active || self.active_theme_id() == theme_id {
            return Err("Cannot delete the active theme".to_string());
        }
        let dir = self.theme_dir(theme_id);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|e| format!("Failed to remove theme files: {}", e))?;
        }
        self.store.theme_delete(theme_id)?;
        self.registry.unload(theme_id);
        self.i18n.clear_cache(theme_id);
        log::info!("[theme] deleted {}", theme_id);
        Ok(())
    }

    // ── Files ──

    /// `rel` joined under `base`, refusing anything that could climb out.
    fn contained(base: &Path, rel: &Path) -> Option<PathBuf> {
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        let path = base.join(rel);
        path.is_file().then_some(path)
    }

    pub fn screenshot_path(&self, theme_id: &str) -> Option<PathBuf> {
        let manifest = self.manifest(theme_id).ok()?;
        let file = manifest.screenshot?;
        Self::contained(&self.theme_dir(theme_id), Path::new(&file))
    }

    pub fn static_path(&self, theme_id: &str, rel: &Path) -> Option<PathBuf> {
        if !is_valid_theme_id(theme_id) {
            return None;
        }
        Self::contained(&self.theme_dir(theme_id).join("static"), rel)
    }

    // ── Rendering ──

    /// Loads the theme's templates on first use. Disabled and broken themes
    /// are not rendered.
    fn ensure_loaded(&self, theme_id: &str) -> Result<ThemeManifest, String> {
        let record = self.require(theme_id)?;
        if record.status != "ENABLED" {
            return Err("Theme is not enabled".to_string());
        }
        let dir = self.theme_dir(theme_id);
        if !self.registry.contains(theme_id) {
            self.registry.load(theme_id, &dir)?;
        }
        ThemeManifest::load(&dir)
    }

    fn resolve_locale(&self, manifest: &ThemeManifest, requested: Option<&str>) -> String {
        requested
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .or_else(|| self.store.setting_get("default_locale").filter(|l| !l.is_empty()))
            .unwrap_or_else(|| manifest.i18n.default_locale.clone())
    }

    fn base_context(
        &self,
        theme_id: &str,
        manifest: &ThemeManifest,
        opts: &RenderOptions,
    ) -> Context {
        let locale = self.resolve_locale(manifest, opts.locale.as_deref());
        let record = self.store.theme_find_by_theme_id(theme_id);
        let settings =
            Self::layer_settings(manifest, record.as_ref().and_then(|r| r.settings_json.as_deref()));

        let mut ctx = Context::new();
        ctx.insert("site", &context::site(self.store.as_ref()));
        ctx.insert("theme", &json!({ "id": manifest.id, "name": manifest.name, "version": manifest.version }));
        ctx.insert("base", &opts.base);
        ctx.insert("home_url", if opts.base.is_empty() { "/" } else { opts.base.as_str() });
        ctx.insert("asset_base", &format!("/themes/{}/static", theme_id));
        ctx.insert("user", &opts.user);
        ctx.insert("settings", &settings);
        ctx.insert("config", &manifest.features);
        ctx.insert("locale", &locale);
        ctx.insert("categories", &self.store.category_list());
        ctx.insert("tags", &self.store.tag_list());
        ctx.insert("recent_posts", &self.store.post_recent_published(RECENT_POSTS));
        ctx.insert("i18n", &context::nest_messages(&self.i18n.messages(theme_id, &locale)));
        ctx.insert("page", &Value::Null);
        ctx.insert("pagination", &Value::Null);
        ctx
    }

    /// Index page: published posts, newest first, with pagination links.
    pub fn render_index(
        &self,
        theme_id: &str,
        req: PageRequest,
        opts: &RenderOptions,
    ) -> Result<String, String> {
        let manifest = self.ensure_loaded(theme_id)?;
        let posts = self.store.post_list_published(req.limit(), req.offset());
        let paged = Paged::new(posts, self.store.post_count_published(), req);

        let mut ctx = self.base_context(theme_id, &manifest, opts);
        let path = if opts.base.is_empty() { "/" } else { opts.base.as_str() };
        ctx.insert(
            "pagination",
            &Pagination::from_paged(&paged, path, opts.locale.as_deref()),
        );
        ctx.insert("posts", &paged.records);
        self.registry.render(theme_id, "index", &ctx)
    }

    pub fn render_post(
        &self,
        theme_id: &str,
        post: &PostView,
        opts: &RenderOptions,
    ) -> Result<String, String> {
        let manifest = self.ensure_loaded(theme_id)?;
        let mut ctx = self.base_context(theme_id, &manifest, opts);
        ctx.insert("post", post);
        ctx.insert("posts", &Vec::<PostView>::new());
        self.registry.render(theme_id, "post", &ctx)
    }

    /// First page of the index, HTML-escaped for display inside the admin.
    pub fn preview(&self, theme_id: &str, locale: Option<String>) -> Result<String, String> {
        let opts = RenderOptions {
            base: format!("/themes/{}", theme_id),
            locale,
            user: None,
        };
        let html = self.render_index(theme_id, PageRequest::default(), &opts)?;
        Ok(html_escape(&html))
    }

    pub fn locales(&self, theme_id: &str) -> Result<Vec<String>, String> {
        self.require(theme_id)?;
        Ok(self.i18n.available_locales(theme_id))
    }

    /// Recompiles templates and drops cached translations.
    pub fn reload(&self, theme_id: &str) -> Result<(), String> {
        self.require(theme_id)?;
        self.registry.load(theme_id, &self.theme_dir(theme_id))?;
        self.i18n.reload(theme_id);
        Ok(())
    }
}
