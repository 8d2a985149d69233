//! Scripted browser fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use remit_rates::browser::{js_string, BrowserConfig, BrowserSession, ReadyState, SessionFactory};
use remit_rates::poll::PollPolicy;
use remit_rates::providers::chapchap::TransfertChapChapSettings;
use remit_rates::providers::taptapsend::TapTapSendSettings;

/// What a fake page renders.
#[derive(Debug, Clone, Default)]
pub struct FakePage {
    /// Text of single elements, keyed by selector.
    pub elements: HashMap<String, String>,
    /// Texts returned by element scans once `scan_from` scans have happened.
    pub scan_texts: Vec<String>,
    pub scan_from: u32,
    /// The amount input is missing.
    pub no_amount_field: bool,
    /// Element scans return something other than a list of strings.
    pub garbled_scan: bool,
    /// Screenshots and browser shutdown fail on this page.
    pub broken_teardown: bool,
}

impl FakePage {
    pub fn single_read(rate_text: &str, fee_text: &str) -> Self {
        let mut elements = HashMap::new();
        elements.insert("#fxRateText".to_string(), rate_text.to_string());
        elements.insert("#feeText".to_string(), fee_text.to_string());
        Self {
            elements,
            ..Self::default()
        }
    }

    pub fn polled(texts: &[&str], scan_from: u32) -> Self {
        Self {
            scan_texts: texts.iter().map(|t| t.to_string()).collect(),
            scan_from,
            ..Self::default()
        }
    }

    pub fn with_broken_teardown(mut self) -> Self {
        self.broken_teardown = true;
        self
    }
}

/// Session lifecycle counters.
#[derive(Debug, Default)]
pub struct Counters {
    pub acquired: AtomicUsize,
    pub closed: AtomicUsize,
    pub snapshots: AtomicUsize,
    pub scans: AtomicUsize,
}

impl Counters {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

/// Serves fake pages by URL. Unknown URLs fail to navigate.
#[derive(Default)]
pub struct FakeFactory {
    pages: HashMap<String, FakePage>,
    refuse: bool,
    pub counters: Arc<Counters>,
    pub typed: Arc<Mutex<Vec<String>>>,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that cannot start any session.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub fn with_page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn acquire(&self, _config: &BrowserConfig) -> Result<Box<dyn BrowserSession>> {
        if self.refuse {
            return Err(anyhow!("no browser executable"));
        }
        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            pages: self.pages.clone(),
            current: None,
            scans: 0,
            counters: Arc::clone(&self.counters),
            typed: Arc::clone(&self.typed),
        }))
    }
}

pub struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<FakePage>,
    scans: u32,
    counters: Arc<Counters>,
    typed: Arc<Mutex<Vec<String>>>,
}

impl FakeSession {
    fn page(&self) -> Result<&FakePage> {
        self.current.as_ref().ok_or_else(|| anyhow!("no page loaded"))
    }

    fn teardown_broken(&self) -> bool {
        self.current.as_ref().is_some_and(|p| p.broken_teardown)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, _ready: ReadyState, _timeout: Duration) -> Result<()> {
        match self.pages.get(url) {
            Some(page) => {
                self.current = Some(page.clone());
                Ok(())
            }
            None => Err(anyhow!("net::ERR_NAME_NOT_RESOLVED")),
        }
    }

    async fn wait_for(&mut self, _selector: &str, _timeout: Duration) -> Result<()> {
        self.page().map(|_| ())
    }

    async fn evaluate(&mut self, expression: &str) -> Result<Value> {
        let page = self.page()?.clone();

        if expression.contains("markers.every") {
            self.scans += 1;
            self.counters.scans.fetch_add(1, Ordering::SeqCst);
            if page.garbled_scan {
                return Ok(json!({ "error": "querySelectorAll is not a function" }));
            }
            if self.scans >= page.scan_from {
                return Ok(json!(page.scan_texts));
            }
            return Ok(json!([]));
        }
        if expression.contains("o.value ===") || expression.contains("o.text.includes") {
            return Ok(json!({ "found": true, "selected": "option" }));
        }
        if expression.contains("options: Array.from") {
            return Ok(json!([]));
        }
        for (selector, text) in &page.elements {
            if expression.contains(&js_string(selector)) {
                return Ok(json!(text));
            }
        }
        Ok(Value::Null)
    }

    async fn type_into(&mut self, selector: &str, text: &str) -> Result<()> {
        if self.page()?.no_amount_field {
            return Err(anyhow!("no element matches {selector}"));
        }
        if let Ok(mut typed) = self.typed.lock() {
            typed.push(text.to_string());
        }
        Ok(())
    }

    async fn press_key(&mut self, _selector: &str, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn click(&mut self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn snapshot(&mut self, _path: &Path) -> Result<()> {
        self.counters.snapshots.fetch_add(1, Ordering::SeqCst);
        if self.teardown_broken() {
            return Err(anyhow!("Page.captureScreenshot: target crashed"));
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        if self.teardown_broken() {
            return Err(anyhow!("browser process already exited"));
        }
        Ok(())
    }
}

/// TapTapSend defaults without settle delays.
pub fn fast_taptapsend() -> TapTapSendSettings {
    TapTapSendSettings {
        settle_delay: Duration::ZERO,
        ..TapTapSendSettings::default()
    }
}

/// TransfertChapChap defaults without delays, polling `attempts` times.
pub fn fast_chapchap(attempts: u32) -> TransfertChapChapSettings {
    TransfertChapChapSettings {
        settle_delay: Duration::ZERO,
        submit_delay: Duration::ZERO,
        poll: PollPolicy::immediate(attempts),
        ..TransfertChapChapSettings::default()
    }
}

pub const TAPTAPSEND_URL: &str = "https://www.taptapsend.com";
pub const CHAPCHAP_URL: &str = "https://transfertchapchap.com";
