//! Core data types for rate quotes and provider outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A currency conversion direction, e.g. CAD → XOF.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl std::fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// A normalized exchange-rate observation for one provider and currency pair.
///
/// Only [`crate::validate::format_quote`] builds these, which keeps
/// `rate > 0` and `fees >= 0` true for every value in circulation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuote {
    pub(crate) service: String,
    pub(crate) from_currency: String,
    pub(crate) to_currency: String,
    pub(crate) rate: f64,
    pub(crate) fees: f64,
    pub(crate) timestamp: DateTime<Utc>,
}

impl RateQuote {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn from_currency(&self) -> &str {
        &self.from_currency
    }

    pub fn to_currency(&self) -> &str {
        &self.to_currency
    }

    /// Units of `to_currency` per one `from_currency`.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Fees in `from_currency`.
    pub fn fees(&self) -> f64 {
        self.fees
    }

    /// When the quote was extracted.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Composite identity used for deduplication.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.service, &self.from_currency, &self.to_currency)
    }
}

/// Why a provider produced no quote.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("no rate pattern matched after {attempts} attempt(s)")]
    PatternNotMatched { attempts: u32 },

    #[error("rate {rate} outside plausible band [{min}, {max}]")]
    OutOfRange { rate: f64, min: f64, max: f64 },

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("could not acquire browser session: {0}")]
    SessionAcquisition(String),
}

impl FailureReason {
    /// Environmental failures that would hit every provider alike.
    pub fn is_systemic(&self) -> bool {
        matches!(self, FailureReason::SessionAcquisition(_))
    }
}

/// The explicit "no result" outcome of one extractor run.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{provider}: {reason}")]
pub struct NoQuote {
    pub provider: String,
    pub reason: FailureReason,
}

impl NoQuote {
    pub fn new(provider: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            provider: provider.into(),
            reason,
        }
    }
}

/// Outcome of a single provider extraction.
pub type ProviderResult = Result<RateQuote, NoQuote>;

/// A stored rate row as read back from the rate store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRow {
    pub id: i64,
    pub service: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub fees: f64,
    /// Extraction instant carried by the quote.
    pub quoted_at: String,
    /// Write instant assigned by the store.
    pub timestamp: String,
}

/// Errors that can occur in the rates library.
#[derive(thiserror::Error, Debug)]
pub enum RatesError {
    #[error("every provider failed to start a browser session: {0}")]
    Systemic(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task error: {0}")]
    Task(String),
}

/// Convenience result type.
pub type RatesResult<T> = Result<T, RatesError>;
