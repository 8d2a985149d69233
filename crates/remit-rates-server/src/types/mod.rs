//! Response types for the HTTP API.

pub mod error;

pub use error::{ApiError, ApiResult, PathError};

use serde::Serialize;

use remit_rates::RateRow;

/// Outcome flag carried by every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Warning,
    Error,
}

/// A stored rate as exposed by `GET /api/taux`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicRate {
    pub service: String,
    pub from_currency: String,
    pub to_currency: String,
    pub rate: f64,
    pub fees: f64,
    pub timestamp: String,
}

impl From<RateRow> for PublicRate {
    fn from(row: RateRow) -> Self {
        Self {
            service: row.service,
            from_currency: row.from_currency,
            to_currency: row.to_currency,
            rate: row.rate,
            fees: row.fees,
            timestamp: row.timestamp,
        }
    }
}
