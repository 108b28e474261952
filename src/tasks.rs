use rocket::fairing::{Fairing, Info, Kind};
use rocket::tokio;
use rocket::{Orbit, Rocket};
use std::sync::Arc;
use std::time::Duration;

use crate::fetchers;
use crate::rate_limit::RateLimiter;
use crate::security::auth;
use crate::store::Store;

/// A job the scheduler runs on a blocking thread. Returns how many
/// records it touched.
struct Job {
    name: &'static str,
    /// Setting that switches the job off when not "true"; `None` always runs.
    enabled_key: Option<&'static str>,
    /// Setting holding the period in minutes.
    interval_key: &'static str,
    default_minutes: u64,
    first_run_after: Duration,
    run: fn(&dyn Store) -> usize,
}

const JOBS: &[Job] = &[
    Job {
        name: "news fetch",
        enabled_key: Some("news_fetch_enabled"),
        interval_key: "task_news_fetch_interval",
        default_minutes: 30,
        first_run_after: Duration::from_secs(5),
        run: fetchers::news::run_scheduled,
    },
    Job {
        name: "stock fetch",
        enabled_key: Some("stock_fetch_enabled"),
        interval_key: "task_stock_fetch_interval",
        default_minutes: 5,
        first_run_after: Duration::from_secs(10),
        run: refresh_stocks,
    },
    Job {
        name: "session cleanup",
        enabled_key: None,
        interval_key: "task_session_cleanup_interval",
        default_minutes: 60,
        first_run_after: Duration::from_secs(60),
        run: auth::cleanup_expired_sessions,
    },
];

fn refresh_stocks(store: &dyn Store) -> usize {
    fetchers::stock::fetch_stocks(store).len()
}

/// Interval in minutes, re-read every cycle so admin changes apply
/// without a restart. Never below one minute.
pub fn interval_minutes(store: &dyn Store, key: &str, default: u64) -> u64 {
    store
        .setting_get(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .max(1)
}

fn spawn_job(store: Arc<dyn Store>, job: &'static Job) {
    tokio::spawn(async move {
        tokio::time::sleep(job.first_run_after).await;
        loop {
            let enabled = job.enabled_key.map_or(true, |key| store.setting_get_bool(key));
            if enabled {
                let s = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || (job.run)(&*s)).await {
                    Ok(0) => log::debug!("[task] {} had nothing to do", job.name),
                    Ok(n) => log::info!("[task] {} touched {} records", job.name, n),
                    Err(e) => log::error!("[task] {} panicked: {}", job.name, e),
                }
            }
            let minutes = interval_minutes(&*store, job.interval_key, job.default_minutes);
            tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
        }
    });
}

pub struct BackgroundTasks;

#[rocket::async_trait]
impl Fairing for BackgroundTasks {
    fn info(&self) -> Info {
        Info {
            name: "Background Tasks",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let store = rocket
            .state::<Arc<dyn Store>>()
            .expect("Store not found in managed state")
            .clone();

        for job in JOBS {
            spawn_job(Arc::clone(&store), job);
        }

        if let Some(limiter) = rocket.state::<Arc<RateLimiter>>() {
            let limiter = Arc::clone(limiter);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
                    let tracked = limiter.cleanup();
                    log::debug!("[task] rate limiter tracking {} clients", tracked);
                }
            });
        }

        log::info!("[task] {} background jobs started", JOBS.len());
    }
}
