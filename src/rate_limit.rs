use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::store::Store;

/// What is being throttled. Each bucket has its own window and reads
/// its attempt limit from a setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Login,
    Register,
    Comment,
}

impl Bucket {
    pub fn name(self) -> &'static str {
        match self {
            Bucket::Login => "login",
            Bucket::Register => "register",
            Bucket::Comment => "comment",
        }
    }

    pub fn limit_setting(self) -> &'static str {
        match self {
            Bucket::Login | Bucket::Register => "login_rate_limit",
            Bucket::Comment => "comments_rate_limit",
        }
    }

    pub fn window(self) -> Duration {
        match self {
            Bucket::Login | Bucket::Register => Duration::from_secs(15 * 60),
            Bucket::Comment => Duration::from_secs(60 * 60),
        }
    }
}

type Attempts = HashMap<(Bucket, String), VecDeque<Instant>>;

/// In-memory sliding-window limiter keyed by bucket and hashed client IP.
#[derive(Default)]
pub struct RateLimiter {
    entries: Mutex<Attempts>,
}

fn prune(attempts: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while attempts.front().map_or(false, |t| now.duration_since(*t) >= window) {
        attempts.pop_front();
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Attempts> {
        // A poisoned map only holds timestamps; keep using it.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records an attempt for `client`. Once `max` attempts fall inside the
    /// bucket's window, returns how long until the oldest one expires.
    pub fn attempt(&self, bucket: Bucket, client: &str, max: u64) -> Result<(), Duration> {
        let window = bucket.window();
        let now = Instant::now();
        let mut map = self.lock();
        let attempts = map.entry((bucket, client.to_string())).or_default();
        prune(attempts, now, window);

        if (attempts.len() as u64) < max {
            attempts.push_back(now);
            return Ok(());
        }
        let oldest = attempts.front().copied().unwrap_or(now);
        Err(window.saturating_sub(now.duration_since(oldest)))
    }

    /// `attempt` with the limit read from the bucket's setting.
    pub fn check(&self, store: &dyn Store, bucket: Bucket, client: &str) -> Result<(), Duration> {
        let max = store.setting_get_i64(bucket.limit_setting()).max(1) as u64;
        self.attempt(bucket, client, max)
    }

    pub fn remaining(&self, bucket: Bucket, client: &str, max: u64) -> u64 {
        let now = Instant::now();
        let mut map = self.lock();
        match map.get_mut(&(bucket, client.to_string())) {
            Some(attempts) => {
                prune(attempts, now, bucket.window());
                max.saturating_sub(attempts.len() as u64)
            }
            None => max,
        }
    }

    /// Drops every client whose attempts have all left their window.
    /// Returns the number of clients still tracked.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut map = self.lock();
        map.retain(|(bucket, _), attempts| {
            prune(attempts, now, bucket.window());
            !attempts.is_empty()
        });
        map.len()
    }
}
