//! Configuration loading and resolution.
//!
//! The default configuration reproduces the deployed setup: two providers
//! quoting CAD → XOF. A JSON file can replace it, and a few environment
//! variables override individual settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::browser::BrowserConfig;
use crate::providers::chapchap::TransfertChapChapSettings;
use crate::providers::taptapsend::TapTapSendSettings;
use crate::types::{CurrencyPair, RatesError, RatesResult};
use crate::validate::RateBand;

/// Environment variable naming a JSON configuration file.
pub const CONFIG_ENV: &str = "REMIT_RATES_CONFIG";

/// Environment variable naming the snapshot directory.
pub const SNAPSHOT_DIR_ENV: &str = "REMIT_RATES_SNAPSHOT_DIR";

/// Environment variable naming the Chromium executable.
pub const CHROMIUM_PATH_ENV: &str = "REMIT_RATES_CHROMIUM_PATH";

/// Top-level scraper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub browser: BrowserConfig,
    /// Directory for failure snapshots; `None` disables capture.
    pub snapshot_dir: Option<PathBuf>,
    pub providers: Vec<ProviderSettings>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            snapshot_dir: Some(PathBuf::from("logs")),
            providers: vec![
                ProviderSettings::TapTapSend(TapTapSendSettings::default()),
                ProviderSettings::TransfertChapChap(TransfertChapChapSettings::default()),
            ],
        }
    }
}

impl ScraperConfig {
    /// Read a configuration file.
    pub fn load(path: &Path) -> RatesResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RatesError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> RatesResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.check()?;
        Ok(config)
    }

    /// Resolve the configuration: explicit path, then `REMIT_RATES_CONFIG`,
    /// then built-in defaults. Environment overrides are applied last.
    pub fn resolve(explicit: Option<&Path>) -> RatesResult<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => match std::env::var(CONFIG_ENV) {
                Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim()))?,
                _ => Self::default(),
            },
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(SNAPSHOT_DIR_ENV) {
            self.snapshot_dir = match dir.trim() {
                "" | "off" | "none" => None,
                other => Some(PathBuf::from(other)),
            };
        }
        if let Ok(path) = std::env::var(CHROMIUM_PATH_ENV) {
            if !path.trim().is_empty() {
                self.browser.chromium_path = Some(PathBuf::from(path.trim()));
            }
        }
    }

    /// Reject configurations that cannot produce quotes.
    pub fn check(&self) -> RatesResult<()> {
        let mut names = std::collections::HashSet::new();
        for provider in &self.providers {
            let target = provider.target();
            if target.service.trim().is_empty() {
                return Err(RatesError::Config("provider with empty service name".into()));
            }
            if !names.insert(target.service.as_str()) {
                tracing::warn!(
                    provider = %target.service,
                    "provider configured twice; only the first quote per pair is kept"
                );
            }
            if target.band.min > target.band.max || target.band.min <= 0.0 {
                return Err(RatesError::Config(format!(
                    "{}: invalid rate band [{}, {}]",
                    target.service, target.band.min, target.band.max
                )));
            }
        }
        Ok(())
    }
}

/// What a provider quotes and how to recognise a plausible quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTarget {
    /// Name stamped on produced quotes.
    pub service: String,
    pub url: String,
    pub pair: CurrencyPair,
    /// Ways the page writes the destination currency, e.g. `FCFA`, `XOF`.
    #[serde(default)]
    pub currency_labels: Vec<String>,
    #[serde(default)]
    pub band: RateBand,
    /// Rate patterns, most specific first. Empty means the defaults built
    /// from the pair and currency labels.
    #[serde(default)]
    pub rate_patterns: Vec<String>,
}

impl QuoteTarget {
    /// Destination labels, falling back to the pair's own code.
    pub fn labels(&self) -> Vec<String> {
        if self.currency_labels.is_empty() {
            vec![self.pair.to.clone()]
        } else {
            self.currency_labels.clone()
        }
    }
}

/// One configured provider, selected by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ProviderSettings {
    #[serde(rename = "taptapsend")]
    TapTapSend(TapTapSendSettings),
    #[serde(rename = "transfertchapchap")]
    TransfertChapChap(TransfertChapChapSettings),
}

impl ProviderSettings {
    pub fn target(&self) -> &QuoteTarget {
        match self {
            ProviderSettings::TapTapSend(s) => &s.target,
            ProviderSettings::TransfertChapChap(s) => &s.target,
        }
    }
}

/// Serialize a `Duration` as whole milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
