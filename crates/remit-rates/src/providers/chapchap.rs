//! TransfertChapChap-style provider: selects located by label text, a probe
//! amount submitted through the form, and a result that renders some time
//! later somewhere in the page.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{pattern_error, steps, ProviderExtractor};
use crate::browser::{BrowserConfig, BrowserSession};
use crate::config::QuoteTarget;
use crate::diagnostics::DiagnosticsSink;
use crate::extract::PatternSet;
use crate::poll::PollPolicy;
use crate::types::{CurrencyPair, FailureReason, RateQuote, RatesResult};
use crate::validate::{format_quote, validate_rate, RateBand};

/// Page layout of a TransfertChapChap-style quote form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransfertChapChapSettings {
    #[serde(flatten)]
    pub target: QuoteTarget,
    pub form_selector: String,
    /// Option text identifying the origin country.
    pub origin_label: String,
    /// Fragment of the origin select's id or name.
    pub origin_hint: String,
    pub destination_label: String,
    pub destination_hint: String,
    pub amount_selector: String,
    pub probe_amount: String,
    /// Elements scanned for the rendered rate.
    pub scan_selector: String,
    pub poll: PollPolicy,
    #[serde(with = "crate::config::millis")]
    pub settle_delay: Duration,
    /// Pause after submitting the probe amount, before polling starts.
    #[serde(with = "crate::config::millis")]
    pub submit_delay: Duration,
}

impl Default for TransfertChapChapSettings {
    fn default() -> Self {
        Self {
            target: QuoteTarget {
                service: "TransfertChapChap".to_string(),
                url: "https://transfertchapchap.com".to_string(),
                pair: CurrencyPair::new("CAD", "XOF"),
                currency_labels: vec!["XOF".to_string()],
                band: RateBand::default(),
                rate_patterns: Vec::new(),
            },
            form_selector: "form".to_string(),
            origin_label: "Canada".to_string(),
            origin_hint: "source".to_string(),
            destination_label: "Burkina".to_string(),
            destination_hint: "destination".to_string(),
            amount_selector: r#"input[type="number"], input[placeholder*="montant" i]"#
                .to_string(),
            probe_amount: "1".to_string(),
            scan_selector: "p, span, div".to_string(),
            poll: PollPolicy::default(),
            settle_delay: Duration::from_secs(3),
            submit_delay: Duration::from_secs(5),
        }
    }
}

/// Extractor for TransfertChapChap-style pages.
pub struct TransfertChapChapExtractor {
    settings: TransfertChapChapSettings,
    browser: BrowserConfig,
    rate_patterns: PatternSet,
    /// Substrings a text must contain to be considered: both currency codes.
    markers: Vec<String>,
}

impl TransfertChapChapExtractor {
    pub fn new(settings: TransfertChapChapSettings, browser: BrowserConfig) -> RatesResult<Self> {
        let target = &settings.target;
        let rate_patterns = if target.rate_patterns.is_empty() {
            PatternSet::rate_patterns(&target.pair.from, &target.labels())
        } else {
            PatternSet::new(&target.rate_patterns)
        }
        .map_err(|e| pattern_error(&target.service, e))?;
        let markers = vec![target.pair.from.clone(), target.pair.to.clone()];

        Ok(Self {
            settings,
            browser,
            rate_patterns,
            markers,
        })
    }

    async fn choose(
        &self,
        session: &mut dyn BrowserSession,
        diagnostics: &dyn DiagnosticsSink,
        step: &str,
        label: &str,
        hint: &str,
    ) -> Result<(), FailureReason> {
        let selection = steps::select_by_label(session, label, hint).await?;
        if !selection.found {
            tracing::warn!(provider = self.name(), label, "could not select option");
        }
        diagnostics.note(
            self.name(),
            step,
            &json!({ "label": label, "found": selection.found, "selected": selection.selected }),
        );
        steps::settle(self.settings.settle_delay).await;
        Ok(())
    }

    /// Type the probe amount and submit it; a missing field is not fatal.
    async fn submit_amount(
        &self,
        session: &mut dyn BrowserSession,
        diagnostics: &dyn DiagnosticsSink,
    ) {
        let s = &self.settings;
        let submitted = match session.type_into(&s.amount_selector, &s.probe_amount).await {
            Ok(()) => match session.press_key(&s.amount_selector, "Enter").await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(provider = self.name(), "could not submit amount: {e:#}");
                    false
                }
            },
            Err(e) => {
                tracing::warn!(provider = self.name(), "amount field not found: {e:#}");
                false
            }
        };
        diagnostics.note(
            self.name(),
            "submit_amount",
            &json!({ "amount": s.probe_amount, "submitted": submitted }),
        );
        steps::settle(s.submit_delay).await;
    }
}

#[async_trait]
impl ProviderExtractor for TransfertChapChapExtractor {
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

        steps::wait_for(session, &s.form_selector, self.browser.wait_timeout).await?;
        let controls = steps::evaluate(session, steps::SELECT_INVENTORY_SCRIPT).await?;
        diagnostics.note(provider, "form_controls", &controls);

        self.choose(session, diagnostics, "select_origin", &s.origin_label, &s.origin_hint)
            .await?;
        self.choose(
            session,
            diagnostics,
            "select_destination",
            &s.destination_label,
            &s.destination_hint,
        )
        .await?;

        self.submit_amount(session, diagnostics).await;

        let (rate, attempts) = steps::poll_for_rate(
            session,
            &s.poll,
            &s.scan_selector,
            &self.markers,
            &self.rate_patterns,
            diagnostics,
            provider,
        )
        .await?;
        let rate = rate.ok_or(FailureReason::PatternNotMatched { attempts })?;
        diagnostics.note(provider, "extracted", &json!({ "rate": rate, "attempts": attempts }));

        let rate = validate_rate(rate, &s.target.band)?;
        format_quote(rate, None, provider, &s.target.pair)
    }
}
