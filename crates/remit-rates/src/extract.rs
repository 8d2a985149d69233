//! Text-pattern extraction of rates and fees from rendered page text.
//!
//! A [`PatternSet`] is an ordered list of regular expressions, each with one
//! capture group around a decimal number. Patterns are tried most specific
//! first; the first capture that parses as a number wins. Numbers written
//! with a comma as decimal separator (`450,25`) are accepted.

use regex::Regex;

/// Ordered, first-match-wins list of number-capturing patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile patterns from their source strings, keeping their order.
    pub fn new<S: AsRef<str>>(sources: &[S]) -> Result<Self, regex::Error> {
        let patterns = sources
            .iter()
            .map(|s| Regex::new(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Default rate patterns for a pair, e.g. `CAD 1 = 480.10 FCFA`,
    /// `1 CAD = 450,25 XOF`, then a bare `450 FCFA`.
    ///
    /// `to_labels` lists how the site may write the destination currency
    /// (`XOF`, `FCFA`, ...). Matching is case-insensitive.
    pub fn rate_patterns(from: &str, to_labels: &[String]) -> Result<Self, regex::Error> {
        let from = regex::escape(from);
        let to = to_labels
            .iter()
            .map(|l| regex::escape(l))
            .collect::<Vec<_>>()
            .join("|");
        Self::new(&[
            format!(r"(?i){from}\s*1\s*=\s*([\d.,]+)\s*(?:{to})"),
            format!(r"(?i)1\s*{from}\s*=\s*([\d.,]+)\s*(?:{to})"),
            format!(r"(?i)([\d.,]+)\s*(?:{to})"),
        ])
    }

    /// Default fee pattern: an amount followed by the origin currency code.
    pub fn fee_patterns(from: &str) -> Result<Self, regex::Error> {
        Self::new(&[format!(r"(?i)([\d.,]+)\s*{}", regex::escape(from))])
    }

    /// First number recovered by the earliest pattern that yields one.
    pub fn first_match(&self, text: &str) -> Option<f64> {
        self.patterns.iter().find_map(|re| {
            re.captures_iter(text)
                .filter_map(|caps| caps.get(1))
                .find_map(|m| parse_decimal(m.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Parse a loosely formatted decimal such as `450,25`, `480.10` or `1 234,5`.
///
/// When both `,` and `.` appear, the last one is the decimal separator and
/// the other is a grouping mark. A single comma is a decimal separator.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if cleaned.matches(',').count() == 1 => cleaned.replace(',', "."),
        (Some(_), None) => cleaned.replace(',', ""),
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// True when `text` mentions every marker (plain substring match).
pub fn mentions_all(text: &str, markers: &[String]) -> bool {
    markers.iter().all(|m| text.contains(m.as_str()))
}
