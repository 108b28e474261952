#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket_dyn_templates::Template;

mod boot;
mod db;
mod fetchers;
mod models;
mod paging;
mod rate_limit;
mod routes;
mod security;
mod slugs;
mod store;
mod tasks;
mod themes;

#[cfg(test)]
mod tests;

use rate_limit::RateLimiter;
use store::sqlite::SqliteStore;
use store::Store;
use themes::ThemeEngine;

#[launch]
fn rocket() -> _ {
    env_logger::init();

    // Boot check: verify/create directories, validate server templates
    boot::run();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool.clone()));
    store.run_migrations().expect("Failed to run database migrations");
    store.seed_defaults().expect("Failed to seed default settings");
    store.seed_sample_content().expect("Failed to seed sample content");

    let engine = ThemeEngine::new(Arc::clone(&store), boot::THEMES_DIR);
    if let Err(e) = engine.init() {
        log::error!("[theme] initialization failed: {}", e);
    }
    log::info!("[theme] serving {}", engine.active_theme_id());

    rocket::build()
        .manage(pool)
        .manage(store)
        .manage(Arc::new(engine))
        .manage(Arc::new(RateLimiter::new()))
        .attach(Template::fairing())
        .attach(tasks::BackgroundTasks)
        .mount("/api", routes::api::routes())
        .mount("/", routes::site::routes())
        .register("/", routes::catchers())
}
