//! Plausibility checks and normalization into [`RateQuote`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{CurrencyPair, FailureReason, RateQuote};

/// Inclusive plausible range for a currency pair's rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBand {
    pub min: f64,
    pub max: f64,
}

impl RateBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, rate: f64) -> bool {
        rate >= self.min && rate <= self.max
    }
}

impl Default for RateBand {
    /// The band observed for CAD → XOF.
    fn default() -> Self {
        Self::new(400.0, 500.0)
    }
}

/// Reject a rate that falls outside the configured band.
pub fn validate_rate(rate: f64, band: &RateBand) -> Result<f64, FailureReason> {
    if band.contains(rate) {
        Ok(rate)
    } else {
        Err(FailureReason::OutOfRange {
            rate,
            min: band.min,
            max: band.max,
        })
    }
}

/// Build the canonical quote, stamping the current instant.
///
/// Missing fees default to zero. Non-finite or non-positive rates and
/// negative fees are refused rather than clamped.
pub fn format_quote(
    rate: f64,
    fees: Option<f64>,
    service: &str,
    pair: &CurrencyPair,
) -> Result<RateQuote, FailureReason> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(FailureReason::InvalidValue(format!("rate {rate}")));
    }
    let fees = fees.unwrap_or(0.0);
    if !fees.is_finite() || fees < 0.0 {
        return Err(FailureReason::InvalidValue(format!("fees {fees}")));
    }

    Ok(RateQuote {
        service: service.to_string(),
        from_currency: pair.from.clone(),
        to_currency: pair.to.clone(),
        rate,
        fees,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cad_xof() -> CurrencyPair {
        CurrencyPair::new("CAD", "XOF")
    }

    #[test]
    fn test_band_boundaries_are_inclusive() {
        let band = RateBand::default();
        assert!(!band.contains(399.0));
        assert!(band.contains(400.0));
        assert!(band.contains(500.0));
        assert!(!band.contains(501.0));
    }

    #[test]
    fn test_validate_rate_reports_band() {
        let err = validate_rate(520.5, &RateBand::default()).unwrap_err();
        assert_eq!(
            err,
            FailureReason::OutOfRange {
                rate: 520.5,
                min: 400.0,
                max: 500.0
            }
        );
        assert_eq!(validate_rate(450.0, &RateBand::default()), Ok(450.0));
    }

    #[test]
    fn test_format_defaults_missing_fees() {
        let quote = format_quote(451.2, None, "TapTapSend", &cad_xof()).unwrap();
        assert_eq!(quote.service(), "TapTapSend");
        assert_eq!(quote.from_currency(), "CAD");
        assert_eq!(quote.to_currency(), "XOF");
        assert_eq!(quote.rate(), 451.2);
        assert_eq!(quote.fees(), 0.0);
    }

    #[test]
    fn test_format_rejects_invalid_values() {
        let pair = cad_xof();
        assert!(format_quote(0.0, None, "A", &pair).is_err());
        assert!(format_quote(-3.0, None, "A", &pair).is_err());
        assert!(format_quote(f64::NAN, None, "A", &pair).is_err());
        assert!(format_quote(450.0, Some(-1.0), "A", &pair).is_err());
        assert!(format_quote(450.0, Some(f64::INFINITY), "A", &pair).is_err());
    }

    #[test]
    fn test_formatted_quotes_keep_invariants() {
        let pair = cad_xof();
        for (rate, fees) in [(0.01, None), (450.0, Some(0.0)), (480.1, Some(2.99))] {
            let quote = format_quote(rate, fees, "A", &pair).unwrap();
            assert!(quote.rate() > 0.0);
            assert!(quote.fees() >= 0.0);
        }
    }

    #[test]
    fn test_quote_timestamp_is_extraction_time() {
        let before = Utc::now();
        let quote = format_quote(450.0, None, "A", &cad_xof()).unwrap();
        assert!(quote.timestamp() >= before);
        assert!(quote.timestamp() <= Utc::now());
    }
}
