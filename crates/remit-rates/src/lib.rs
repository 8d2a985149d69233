//! remit-rates: concurrent scraping of remittance exchange-rate quotes from
//! provider websites, with validation, deduplication and SQLite history.

pub mod browser;
pub mod config;
pub mod diagnostics;
pub mod extract;
pub mod orchestrator;
pub mod poll;
pub mod providers;
pub mod store;
pub mod types;
pub mod validate;

pub use browser::{BrowserConfig, BrowserSession, ChromiumSessionFactory, SessionFactory};
pub use config::{ProviderSettings, QuoteTarget, ScraperConfig};
pub use diagnostics::{DiagnosticsSink, MemoryDiagnostics, TracingDiagnostics};
pub use orchestrator::{dedup_quotes, Orchestrator, ScrapeReport};
pub use poll::PollPolicy;
pub use providers::{build_extractors, ProviderExtractor};
pub use store::RateStore;
pub use types::*;
pub use validate::{format_quote, validate_rate, RateBand};
