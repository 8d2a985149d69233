//! Chromium-based sessions using chromiumoxide.
//!
//! Each acquired session launches its own headless browser process, so
//! providers never share cookies or page state. Closing the session closes
//! the browser and reaps the process.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::task::JoinHandle;

use super::{BrowserConfig, BrowserSession, ReadyState, SessionFactory};

/// Interval between element lookups while waiting for a selector.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Quiet period used to decide that the network has gone idle.
const IDLE_QUIET_PERIOD: Duration = Duration::from_millis(500);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(crate::config::CHROMIUM_PATH_ENV) {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Launches one Chromium process per session.
#[derive(Debug, Default, Clone)]
pub struct ChromiumSessionFactory;

impl ChromiumSessionFactory {
    pub fn new() -> Self {
        Self
    }

    fn launch_config(config: &BrowserConfig) -> Result<LaunchConfig> {
        let chrome_path = config
            .chromium_path
            .clone()
            .filter(|p| p.exists())
            .or_else(find_chromium)
            .context("Chromium not found. Set REMIT_RATES_CHROMIUM_PATH or install Chrome.")?;

        let mut builder = LaunchConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                ..Viewport::default()
            })
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .args(config.extra_args.iter().map(String::as_str));
        if !config.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn acquire(&self, config: &BrowserConfig) -> Result<Box<dyn BrowserSession>> {
        let launch = Self::launch_config(config)?;

        let (mut browser, mut handler) =
            tokio::time::timeout(config.launch_timeout, Browser::launch(launch))
                .await
                .map_err(|_| {
                    anyhow::anyhow!(
                        "Chromium did not start within {}ms",
                        config.launch_timeout.as_millis()
                    )
                })?
                .context("failed to launch Chromium")?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                return Err(anyhow::anyhow!("failed to open page: {e}"));
            }
        };

        if let Err(e) = page
            .set_user_agent(SetUserAgentOverrideParams::new(config.user_agent.clone()))
            .await
        {
            tracing::warn!("could not override user agent: {e}");
        }

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler,
        }))
    }
}

/// A page inside a dedicated Chromium process.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    /// Poll resource entries until no new requests start for a quiet period.
    async fn wait_for_network_idle(&self, deadline: Instant) {
        let mut last = -1_i64;
        while Instant::now() < deadline {
            let count = self
                .page
                .evaluate("performance.getEntriesByType('resource').length")
                .await
                .ok()
                .and_then(|r| r.into_value::<i64>().ok())
                .unwrap_or(-1);
            if count >= 0 && count == last {
                return;
            }
            last = count;
            tokio::time::sleep(IDLE_QUIET_PERIOD).await;
        }
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, ready: ReadyState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {}ms", timeout.as_millis()),
        }

        if ready == ReadyState::NetworkIdle {
            self.wait_for_network_idle(deadline).await;
        }
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                bail!(
                    "element '{selector}' not found within {}ms",
                    timeout.as_millis()
                );
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value> {
        let wrapped = format!("JSON.stringify(({expression}) ?? null)");
        let result = self
            .page
            .evaluate(wrapped.as_str())
            .await
            .context("JS execution failed")?;

        let json: String = result
            .into_value()
            .map_err(|e| anyhow::anyhow!("failed to convert JS result: {e:?}"))?;
        serde_json::from_str(&json).context("JS result is not valid JSON")
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element '{selector}' not found"))?;
        element.click().await?.type_str(text).await?;
        Ok(())
    }

    async fn press_key(&mut self, selector: &str, key: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element '{selector}' not found"))?;
        element.press_key(key).await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .with_context(|| format!("element '{selector}' not found"))?;
        element.click().await?;
        Ok(())
    }

    async fn snapshot(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        self.handler.abort();
        closed.context("failed to close Chromium")?;
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
