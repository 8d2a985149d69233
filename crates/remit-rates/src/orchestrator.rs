//! Runs every configured provider concurrently and merges the outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinSet;

use crate::browser::{ChromiumSessionFactory, SessionFactory};
use crate::config::ScraperConfig;
use crate::diagnostics::{DiagnosticsSink, TracingDiagnostics};
use crate::providers::{build_extractors, ProviderExtractor};
use crate::types::{FailureReason, NoQuote, RateQuote, RatesError, RatesResult};

/// Quotes from one orchestration run, plus why each missing provider failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScrapeReport {
    pub quotes: Vec<RateQuote>,
    pub failures: Vec<NoQuote>,
}

/// Holds only shared handles, so it can be invoked repeatedly and from
/// several tasks at once.
#[derive(Clone)]
pub struct Orchestrator {
    providers: Vec<Arc<dyn ProviderExtractor>>,
    sessions: Arc<dyn SessionFactory>,
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl Orchestrator {
    pub fn new(
        providers: Vec<Arc<dyn ProviderExtractor>>,
        sessions: Arc<dyn SessionFactory>,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            providers,
            sessions,
            diagnostics,
        }
    }

    /// Chromium-backed orchestrator for the configured providers.
    pub fn from_config(config: &ScraperConfig) -> RatesResult<Self> {
        Ok(Self::new(
            build_extractors(config)?,
            Arc::new(ChromiumSessionFactory),
            Arc::new(TracingDiagnostics::new(config.snapshot_dir.clone())),
        ))
    }

    /// Names of the configured providers, in configuration order.
    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Deduplicated quotes from every provider that produced one.
    ///
    /// An empty list is a valid outcome. Fails only when no provider could
    /// even start a browser session.
    pub async fn scrape_all_rates(&self) -> RatesResult<Vec<RateQuote>> {
        Ok(self.scrape_report().await?.quotes)
    }

    /// Like [`Self::scrape_all_rates`], keeping the per-provider failures.
    pub async fn scrape_report(&self) -> RatesResult<ScrapeReport> {
        let started = std::time::Instant::now();
        tracing::info!(providers = self.providers.len(), "starting scrape");

        let mut tasks = JoinSet::new();
        let mut names = HashMap::new();
        for provider in &self.providers {
            let name = provider.name().to_string();
            let provider = Arc::clone(provider);
            let sessions = Arc::clone(&self.sessions);
            let diagnostics = Arc::clone(&self.diagnostics);
            let handle = tasks.spawn(async move {
                provider
                    .get_rate(sessions.as_ref(), diagnostics.as_ref())
                    .await
            });
            names.insert(handle.id(), name);
        }

        let mut quotes = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(quote)) => quotes.push(quote),
                Ok(Err(no_quote)) => failures.push(no_quote),
                Err(e) => {
                    let provider = names.get(&e.id()).map_or("unknown", String::as_str);
                    tracing::error!(provider, "provider task aborted: {e}");
                    failures.push(NoQuote::new(
                        provider,
                        FailureReason::Script(format!("task aborted: {e}")),
                    ));
                }
            }
        }

        if !self.providers.is_empty()
            && quotes.is_empty()
            && failures.len() == self.providers.len()
            && failures.iter().all(|f| f.reason.is_systemic())
        {
            let detail = failures
                .first()
                .map(|f| f.reason.to_string())
                .unwrap_or_default();
            tracing::error!("no provider could start a browser session");
            return Err(RatesError::Systemic(detail));
        }

        let quotes = dedup_quotes(quotes);
        tracing::info!(
            quotes = quotes.len(),
            failures = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scrape finished"
        );
        Ok(ScrapeReport { quotes, failures })
    }
}

/// Keep the first quote seen for each (service, from, to) key.
pub fn dedup_quotes(quotes: Vec<RateQuote>) -> Vec<RateQuote> {
    let mut seen = HashSet::new();
    quotes
        .into_iter()
        .filter(|q| {
            let (service, from, to) = q.key();
            seen.insert((service.to_string(), from.to_string(), to.to_string()))
        })
        .collect()
}
