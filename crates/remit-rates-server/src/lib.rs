//! remit-rates server: HTTP API and CLI over the remit-rates scraper.

pub mod config;
pub mod server;
pub mod types;

pub use config::{resolve_addr, resolve_db_path, resolve_shutdown_grace, RateLimit};
pub use server::{router, serve, serve_with_shutdown, AppState};
pub use types::{ApiError, PathError};
