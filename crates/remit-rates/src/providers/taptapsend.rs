//! TapTapSend-style provider: currency selects keyed by option value and a
//! dedicated rate element that is read once.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{pattern_error, steps, ProviderExtractor};
use crate::browser::{BrowserConfig, BrowserSession};
use crate::config::QuoteTarget;
use crate::diagnostics::DiagnosticsSink;
use crate::extract::PatternSet;
use crate::types::{CurrencyPair, FailureReason, RateQuote, RatesResult};
use crate::validate::{format_quote, validate_rate, RateBand};

/// Page layout of a TapTapSend-style quote widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapTapSendSettings {
    #[serde(flatten)]
    pub target: QuoteTarget,
    pub origin_select: String,
    /// Option value for the origin country and currency.
    pub origin_value: String,
    pub destination_select: String,
    pub destination_value: String,
    pub rate_selector: String,
    pub fee_selector: String,
    /// Pause after each selection so the widget can refresh its rate.
    #[serde(with = "crate::config::millis")]
    pub settle_delay: Duration,
}

impl Default for TapTapSendSettings {
    fn default() -> Self {
        Self {
            target: QuoteTarget {
                service: "TapTapSend".to_string(),
                url: "https://www.taptapsend.com".to_string(),
                pair: CurrencyPair::new("CAD", "XOF"),
                currency_labels: vec!["FCFA".to_string(), "XOF".to_string()],
                band: RateBand::default(),
                rate_patterns: Vec::new(),
            },
            origin_select: "#origin-currency".to_string(),
            origin_value: "CA-CAD".to_string(),
            destination_select: "#destination-currency".to_string(),
            destination_value: "BF-XOF".to_string(),
            rate_selector: "#fxRateText".to_string(),
            fee_selector: "#feeText".to_string(),
            settle_delay: Duration::from_secs(3),
        }
    }
}

/// Extractor for TapTapSend-style pages.
pub struct TapTapSendExtractor {
    settings: TapTapSendSettings,
    browser: BrowserConfig,
    rate_patterns: PatternSet,
    fee_patterns: PatternSet,
}

impl TapTapSendExtractor {
    pub fn new(settings: TapTapSendSettings, browser: BrowserConfig) -> RatesResult<Self> {
        let target = &settings.target;
        let rate_patterns = if target.rate_patterns.is_empty() {
            PatternSet::rate_patterns(&target.pair.from, &target.labels())
        } else {
            PatternSet::new(&target.rate_patterns)
        }
        .map_err(|e| pattern_error(&target.service, e))?;
        let fee_patterns = PatternSet::fee_patterns(&target.pair.from)
            .map_err(|e| pattern_error(&target.service, e))?;

        Ok(Self {
            settings,
            browser,
            rate_patterns,
            fee_patterns,
        })
    }

    async fn choose(
        &self,
        session: &mut dyn BrowserSession,
        diagnostics: &dyn DiagnosticsSink,
        step: &str,
        selector: &str,
        value: &str,
    ) -> Result<(), FailureReason> {
        steps::wait_for(session, selector, self.browser.wait_timeout).await?;
        let selection = steps::select_by_value(session, selector, value).await?;
        if !selection.found {
            tracing::warn!(provider = self.name(), selector, value, "option not found");
        }
        diagnostics.note(
            self.name(),
            step,
            &json!({ "found": selection.found, "selected": selection.selected }),
        );
        steps::settle(self.settings.settle_delay).await;
        Ok(())
    }
}

#[async_trait]
impl ProviderExtractor for TapTapSendExtractor {
    fn name(&self) -> &str {
        &self.settings.target.service
    }

    fn browser(&self) -> &BrowserConfig {
        &self.browser
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        diagnostics: &dyn DiagnosticsSink,
    ) -> Result<RateQuote, FailureReason> {
        let s = &self.settings;
        let provider = self.name();

        steps::navigate(session, &s.target.url, self.browser.navigation_timeout).await?;
        diagnostics.note(provider, "navigate", &json!({ "url": s.target.url }));

        self.choose(session, diagnostics, "select_origin", &s.origin_select, &s.origin_value)
            .await?;
        self.choose(
            session,
            diagnostics,
            "select_destination",
            &s.destination_select,
            &s.destination_value,
        )
        .await?;

        steps::wait_for(session, &s.rate_selector, self.browser.wait_timeout).await?;
        let rate_text = steps::element_text(session, &s.rate_selector)
            .await?
            .ok_or_else(|| FailureReason::SelectorNotFound(s.rate_selector.clone()))?;
        let fee_text = steps::element_text(session, &s.fee_selector).await?;
        diagnostics.note(
            provider,
            "rate_text",
            &json!({ "rate": rate_text, "fees": fee_text }),
        );

        let rate = self
            .rate_patterns
            .first_match(&rate_text)
            .ok_or(FailureReason::PatternNotMatched { attempts: 1 })?;
        let fees = fee_text
            .as_deref()
            .and_then(|t| self.fee_patterns.first_match(t))
            .unwrap_or(0.0);
        diagnostics.note(provider, "extracted", &json!({ "rate": rate, "fees": fees }));

        let rate = validate_rate(rate, &s.target.band)?;
        format_quote(rate, Some(fees), provider, &s.target.pair)
    }
}
