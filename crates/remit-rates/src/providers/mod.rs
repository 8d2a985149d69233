//! Provider extractors, one per remittance website.
//!
//! A provider implements [`ProviderExtractor::drive`]: navigate, configure the
//! quote form, wait for the rate and extract it. Session lifecycle is handled
//! once, in [`extract_in_session`], so every provider gets the same release
//! and failure-snapshot behaviour.

pub mod chapchap;
pub mod steps;
pub mod taptapsend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::browser::{BrowserConfig, BrowserSession, SessionFactory};
use crate::config::{ProviderSettings, ScraperConfig};
use crate::diagnostics::DiagnosticsSink;
use crate::types::{FailureReason, NoQuote, ProviderResult, RateQuote, RatesError, RatesResult};

pub use chapchap::TransfertChapChapExtractor;
pub use taptapsend::TapTapSendExtractor;

/// Drives one provider's page flow and extracts one quote.
#[async_trait]
pub trait ProviderExtractor: Send + Sync {
    /// Service name stamped on produced quotes.
    fn name(&self) -> &str;

    /// Session settings this provider needs.
    fn browser(&self) -> &BrowserConfig;

    /// Run the page flow inside an already acquired session.
    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        diagnostics: &dyn DiagnosticsSink,
    ) -> Result<RateQuote, FailureReason>;

    /// Acquire a session, run the flow, release the session.
    ///
    /// Never panics on provider errors and never returns an error other than
    /// the explicit [`NoQuote`].
    async fn get_rate(
        &self,
        sessions: &dyn SessionFactory,
        diagnostics: &dyn DiagnosticsSink,
    ) -> ProviderResult {
        extract_in_session(self, sessions, diagnostics).await
    }
}

/// Scoped session lifecycle shared by every provider.
///
/// The session is closed on every path once acquired. A failed flow gets a
/// best-effort snapshot first; snapshot and close failures are only logged.
pub async fn extract_in_session<E>(
    extractor: &E,
    sessions: &dyn SessionFactory,
    diagnostics: &dyn DiagnosticsSink,
) -> ProviderResult
where
    E: ProviderExtractor + ?Sized,
{
    let provider = extractor.name();
    tracing::info!(provider, "scrape started");

    let mut session = match sessions.acquire(extractor.browser()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(provider, "could not start browser session: {e:#}");
            return Err(NoQuote::new(
                provider,
                FailureReason::SessionAcquisition(format!("{e:#}")),
            ));
        }
    };

    let outcome = extractor.drive(session.as_mut(), diagnostics).await;

    if let Err(reason) = &outcome {
        log_failure(provider, reason);
        capture_snapshot(session.as_mut(), diagnostics, provider, snapshot_label(reason)).await;
    }

    tracing::debug!(provider, "closing browser session");
    if let Err(e) = session.close().await {
        tracing::warn!(provider, "failed to close browser session: {e:#}");
    }

    match outcome {
        Ok(quote) => {
            tracing::info!(
                provider,
                rate = quote.rate(),
                fees = quote.fees(),
                pair = %format!("{}/{}", quote.from_currency(), quote.to_currency()),
                "quote extracted"
            );
            Ok(quote)
        }
        Err(reason) => Err(NoQuote::new(provider, reason)),
    }
}

/// Out-of-range values are reported apart from "nothing found" so a broken
/// parser can be told from an unavailable quote.
fn log_failure(provider: &str, reason: &FailureReason) {
    match reason {
        FailureReason::OutOfRange { rate, min, max } => {
            tracing::warn!(provider, rate, min, max, "implausible rate rejected");
        }
        FailureReason::PatternNotMatched { attempts } => {
            tracing::warn!(provider, attempts, "no rate found on page");
        }
        other => {
            tracing::error!(provider, reason = %other, "scrape failed");
        }
    }
}

fn snapshot_label(reason: &FailureReason) -> &'static str {
    match reason {
        FailureReason::PatternNotMatched { .. } => "no_rate",
        FailureReason::OutOfRange { .. } => "out_of_range",
        FailureReason::Navigation(_) => "navigation",
        _ => "error",
    }
}

async fn capture_snapshot(
    session: &mut dyn BrowserSession,
    diagnostics: &dyn DiagnosticsSink,
    provider: &str,
    label: &str,
) {
    let Some(path) = diagnostics.snapshot_path(provider, label) else {
        return;
    };
    match session.snapshot(&path).await {
        Ok(()) => tracing::info!(provider, path = %path.display(), "snapshot saved"),
        Err(e) => tracing::warn!(provider, "snapshot failed: {e:#}"),
    }
}

/// Instantiate the extractors selected by configuration, in order.
pub fn build_extractors(config: &ScraperConfig) -> RatesResult<Vec<Arc<dyn ProviderExtractor>>> {
    config
        .providers
        .iter()
        .map(|settings| -> RatesResult<Arc<dyn ProviderExtractor>> {
            let extractor: Arc<dyn ProviderExtractor> = match settings {
                ProviderSettings::TapTapSend(s) => {
                    Arc::new(TapTapSendExtractor::new(s.clone(), config.browser.clone())?)
                }
                ProviderSettings::TransfertChapChap(s) => Arc::new(
                    TransfertChapChapExtractor::new(s.clone(), config.browser.clone())?,
                ),
            };
            Ok(extractor)
        })
        .collect()
}

/// Map a pattern compile error to a configuration error for `service`.
pub(crate) fn pattern_error(service: &str, e: regex::Error) -> RatesError {
    RatesError::Config(format!("{service}: invalid rate pattern: {e}"))
}
