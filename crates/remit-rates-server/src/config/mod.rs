//! Listen address, database path, rate limit and shutdown settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use remit_rates::RateStore;

/// Port used when neither `--addr` nor `PORT` is given.
pub const DEFAULT_PORT: u16 = 3000;

/// Rate limit window, in minutes.
pub const RATE_LIMIT_WINDOW_ENV: &str = "RATE_LIMIT_WINDOW";

/// Requests allowed per client IP within one window.
pub const RATE_LIMIT_MAX_REQUESTS_ENV: &str = "RATE_LIMIT_MAX_REQUESTS";

pub const DEFAULT_RATE_LIMIT_WINDOW_MINUTES: u64 = 15;
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 100;

/// Seconds to wait for in-flight requests after a shutdown signal.
pub const SHUTDOWN_GRACE_ENV: &str = "REMIT_RATES_SHUTDOWN_GRACE";

pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Per-client request quota: at most `max_requests` per `window`, refilled
/// evenly across the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_MINUTES * 60),
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
        }
    }
}

impl RateLimit {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// Read `RATE_LIMIT_WINDOW` (minutes) and `RATE_LIMIT_MAX_REQUESTS`.
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_values(
            std::env::var(RATE_LIMIT_WINDOW_ENV).ok().as_deref(),
            std::env::var(RATE_LIMIT_MAX_REQUESTS_ENV).ok().as_deref(),
        )
    }

    fn from_values(window_minutes: Option<&str>, max_requests: Option<&str>) -> Self {
        let defaults = Self::default();
        let window = window_minutes
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|m| *m > 0)
            .map(|m| Duration::from_secs(m * 60))
            .unwrap_or(defaults.window);
        let max_requests = max_requests
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_requests);
        Self::new(window, max_requests)
    }

    /// Interval after which one more request is allowed.
    pub fn replenish_period(&self) -> Duration {
        let per_request = self.window / self.max_requests.max(1);
        per_request.max(Duration::from_millis(1))
    }
}

/// Resolve the shutdown grace period: explicit `--shutdown-grace`, then
/// `REMIT_RATES_SHUTDOWN_GRACE` (seconds), then five seconds.
pub fn resolve_shutdown_grace(explicit: Option<u64>) -> Duration {
    explicit
        .or_else(|| {
            std::env::var(SHUTDOWN_GRACE_ENV)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
        })
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SHUTDOWN_GRACE)
}

/// Resolve the listen address: explicit `--addr`, then `PORT`, then the
/// default port on all interfaces.
pub fn resolve_addr(explicit: Option<&str>) -> String {
    if let Some(addr) = explicit {
        return addr.to_string();
    }

    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);

    format!("0.0.0.0:{port}")
}

/// Resolve the database path: explicit `--db`, then `REMIT_RATES_DB`, then
/// `exchange_rates.db` in the working directory.
pub fn resolve_db_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => RateStore::default_path(),
    }
}
