//! Orchestration over several providers: isolation, dedup and the systemic
//! failure case.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::*;

use remit_rates::browser::{BrowserConfig, BrowserSession};
use remit_rates::diagnostics::{DiagnosticsSink, MemoryDiagnostics};
use remit_rates::providers::{ProviderExtractor, TapTapSendExtractor, TransfertChapChapExtractor};
use remit_rates::types::{FailureReason, RateQuote, RatesError};
use remit_rates::{dedup_quotes, Orchestrator};

fn orchestrator(
    providers: Vec<Arc<dyn ProviderExtractor>>,
    factory: FakeFactory,
) -> (Orchestrator, Arc<Counters>) {
    let counters = Arc::clone(&factory.counters);
    let orchestrator = Orchestrator::new(
        providers,
        Arc::new(factory),
        Arc::new(MemoryDiagnostics::new()),
    );
    (orchestrator, counters)
}

fn taptapsend() -> Arc<dyn ProviderExtractor> {
    Arc::new(TapTapSendExtractor::new(fast_taptapsend(), BrowserConfig::default()).unwrap())
}

fn chapchap() -> Arc<dyn ProviderExtractor> {
    Arc::new(TransfertChapChapExtractor::new(fast_chapchap(2), BrowserConfig::default()).unwrap())
}

/// A provider whose flow panics.
struct Exploding;

#[async_trait]
impl ProviderExtractor for Exploding {
    fn name(&self) -> &str {
        "Exploding"
    }

    fn browser(&self) -> &BrowserConfig {
        static CONFIG: std::sync::OnceLock<BrowserConfig> = std::sync::OnceLock::new();
        CONFIG.get_or_init(BrowserConfig::default)
    }

    async fn drive(
        &self,
        _session: &mut dyn BrowserSession,
        _diagnostics: &dyn DiagnosticsSink,
    ) -> Result<RateQuote, FailureReason> {
        panic!("selector engine crashed");
    }
}

#[tokio::test]
async fn test_one_success_one_navigation_failure() {
    let factory = FakeFactory::new().with_page(
        TAPTAPSEND_URL,
        FakePage::single_read("1 CAD = 450 FCFA", "2 CAD"),
    );
    let (orchestrator, counters) = orchestrator(vec![taptapsend(), chapchap()], factory);

    let report = orchestrator.scrape_report().await.unwrap();

    assert_eq!(report.quotes.len(), 1);
    let quote = &report.quotes[0];
    assert_eq!(quote.service(), "TapTapSend");
    assert_eq!(quote.rate(), 450.0);
    assert_eq!(quote.fees(), 2.0);

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].provider, "TransfertChapChap");
    assert!(matches!(report.failures[0].reason, FailureReason::Navigation(_)));

    assert_eq!(counters.acquired(), 2);
    assert_eq!(counters.closed(), 2);
}

#[tokio::test]
async fn test_duplicate_service_keeps_one_quote() {
    let factory = FakeFactory::new().with_page(
        TAPTAPSEND_URL,
        FakePage::single_read("1 CAD = 450 FCFA", "2 CAD"),
    );
    let (orchestrator, _) = orchestrator(vec![taptapsend(), taptapsend()], factory);

    let quotes = orchestrator.scrape_all_rates().await.unwrap();

    assert_eq!(quotes.len(), 1);
    assert_eq!(quotes[0].key(), ("TapTapSend", "CAD", "XOF"));
}

#[tokio::test]
async fn test_every_provider_failing_on_pages_is_empty_not_error() {
    let (orchestrator, counters) = orchestrator(vec![taptapsend(), chapchap()], FakeFactory::new());

    let report = orchestrator.scrape_report().await.unwrap();

    assert!(report.quotes.is_empty());
    assert_eq!(report.failures.len(), 2);
    assert_eq!(counters.closed(), 2);
}

#[tokio::test]
async fn test_no_session_anywhere_is_systemic() {
    let (orchestrator, counters) =
        orchestrator(vec![taptapsend(), chapchap()], FakeFactory::refusing());

    let result = orchestrator.scrape_all_rates().await;

    assert!(matches!(result, Err(RatesError::Systemic(_))));
    assert_eq!(counters.acquired(), 0);
}

#[tokio::test]
async fn test_panicking_provider_does_not_sink_the_run() {
    let factory = FakeFactory::new().with_page(
        TAPTAPSEND_URL,
        FakePage::single_read("1 CAD = 450 FCFA", "2 CAD"),
    );
    let (orchestrator, _) = orchestrator(vec![Arc::new(Exploding), taptapsend()], factory);

    let report = orchestrator.scrape_report().await.unwrap();

    assert_eq!(report.quotes.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].provider, "Exploding");
}

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let factory = FakeFactory::new()
        .with_page(TAPTAPSEND_URL, FakePage::single_read("1 CAD = 450 FCFA", "2 CAD"))
        .with_page(CHAPCHAP_URL, FakePage::polled(&["1 CAD = 455 XOF"], 1));
    let (orchestrator, counters) = orchestrator(vec![taptapsend(), chapchap()], factory);

    let (first, second) = tokio::join!(orchestrator.scrape_all_rates(), orchestrator.scrape_all_rates());

    assert_eq!(first.unwrap().len(), 2);
    assert_eq!(second.unwrap().len(), 2);
    assert_eq!(counters.acquired(), 4);
    assert_eq!(counters.closed(), 4);
}

#[tokio::test]
async fn test_dedup_of_scraped_quotes_is_idempotent() {
    let factory = FakeFactory::new()
        .with_page(TAPTAPSEND_URL, FakePage::single_read("1 CAD = 450 FCFA", "2 CAD"))
        .with_page(CHAPCHAP_URL, FakePage::polled(&["1 CAD = 455 XOF"], 1));
    let (orchestrator, _) = orchestrator(vec![taptapsend(), chapchap(), taptapsend()], factory);

    let quotes = orchestrator.scrape_all_rates().await.unwrap();

    assert_eq!(quotes.len(), 2);
    assert_eq!(dedup_quotes(quotes.clone()), quotes);
}

#[tokio::test]
async fn test_broken_teardown_does_not_affect_other_providers() {
    let dir = tempfile::tempdir().unwrap();
    let factory = FakeFactory::new()
        .with_page(TAPTAPSEND_URL, FakePage::single_read("1 CAD = 450 FCFA", "2 CAD"))
        .with_page(
            CHAPCHAP_URL,
            FakePage::polled(&["1 CAD = 999 XOF"], 1).with_broken_teardown(),
        );
    let counters = Arc::clone(&factory.counters);
    let orchestrator = Orchestrator::new(
        vec![taptapsend(), chapchap()],
        Arc::new(factory),
        Arc::new(MemoryDiagnostics::with_snapshot_dir(dir.path().to_path_buf())),
    );

    let report = orchestrator.scrape_report().await.unwrap();

    assert_eq!(report.quotes.len(), 1);
    assert_eq!(report.quotes[0].service(), "TapTapSend");
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].provider, "TransfertChapChap");
    assert!(matches!(
        report.failures[0].reason,
        FailureReason::OutOfRange { rate, .. } if rate == 999.0
    ));
    assert_eq!(counters.snapshots(), 1);
    assert_eq!(counters.closed(), 2);
}
