//! Browser session abstraction for driving provider pages.
//!
//! Defines the `SessionFactory` and `BrowserSession` traits that abstract over
//! the automation engine (currently Chromium via chromiumoxide). Every
//! acquired session owns its browser resources until `close` is called.

pub mod chromium;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use chromium::{find_chromium, ChromiumSessionFactory};

/// Default desktop identity presented to provider sites.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// When a navigation counts as finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    /// The `load` event fired.
    Load,
    /// Loaded, and the network has gone quiet.
    NetworkIdle,
}

/// Settings for one automation session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: String,
    #[serde(with = "crate::config::millis")]
    pub navigation_timeout: Duration,
    #[serde(with = "crate::config::millis")]
    pub wait_timeout: Duration,
    /// Upper bound on starting the browser process.
    #[serde(with = "crate::config::millis")]
    pub launch_timeout: Duration,
    pub headless: bool,
    pub chromium_path: Option<PathBuf>,
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1920,
            viewport_height: 1080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(60),
            wait_timeout: Duration::from_secs(30),
            launch_timeout: Duration::from_secs(30),
            headless: true,
            chromium_path: None,
            extra_args: Vec::new(),
        }
    }
}

/// Starts isolated automation sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Start a fresh session. Failing here means the engine itself is unusable.
    async fn acquire(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserSession>>;
}

/// A single isolated page-automation session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, ready: ReadyState, timeout: Duration) -> Result<()>;
    /// Wait until an element matching `selector` exists.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    /// Evaluate a JavaScript expression and return its JSON value.
    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value>;
    /// Type text into the first element matching `selector`.
    async fn type_into(&mut self, selector: &str, text: &str) -> Result<()>;
    /// Press a key (e.g. "Enter") while the element has focus.
    async fn press_key(&mut self, selector: &str, key: &str) -> Result<()>;
    /// Click the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> Result<()>;
    /// Write a full-page PNG snapshot to `path`.
    async fn snapshot(&mut self, path: &Path) -> Result<()>;
    /// Release every resource held by the session.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A factory for environments with no usable browser.
///
/// Every acquisition fails, which the orchestrator reports as a systemic
/// failure instead of per-provider no-results.
pub struct NoopSessionFactory;

#[async_trait]
impl SessionFactory for NoopSessionFactory {
    async fn acquire(&self, _config: &BrowserConfig) -> Result<Box<dyn BrowserSession>> {
        Err(anyhow::anyhow!("browser not available"))
    }
}

/// JSON-encode a value for splicing into a page script.
pub fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
