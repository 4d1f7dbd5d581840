//! Parser for the plugin performance-data mini-language.
//!
//! Perfdata is a whitespace-separated sequence of tokens of the form
//! `label=value[UOM];warn;crit;min;max`. The threshold fields are optional
//! and the unit-of-measure suffix is stripped during numeric extraction.
//! A malformed token is skipped; it never aborts the rest of the string.

use thiserror::Error;

/// One decoded measurement from a perfdata token.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub warning: Option<f64>,
    pub critical: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Why a single token failed to decode. Only surfaced in debug logs; the
/// token is dropped either way.
#[derive(Error, Debug, PartialEq)]
pub enum TokenError {
    #[error("missing '=' separator")]
    MissingSeparator,

    #[error("empty label")]
    EmptyLabel,

    #[error("no numeric value in {0:?}")]
    BadValue(String),
}

/// Decodes a full perfdata string into samples, one per well-formed token.
pub fn parse(raw: &str) -> Vec<MetricSample> {
    let mut samples = Vec::new();
    for token in raw.split_whitespace() {
        match parse_token(token) {
            Ok(sample) => samples.push(sample),
            Err(e) => tracing::debug!(token, error = %e, "skipping malformed perfdata token"),
        }
    }
    samples
}

fn parse_token(token: &str) -> Result<MetricSample, TokenError> {
    let (label, rest) = token.split_once('=').ok_or(TokenError::MissingSeparator)?;
    if label.is_empty() {
        return Err(TokenError::EmptyLabel);
    }

    let mut fields = rest.split(';');
    let value_field = fields.next().unwrap_or("");
    let value = numeric_prefix(value_field)
        .ok_or_else(|| TokenError::BadValue(value_field.to_string()))?;

    // warn, crit, min, max in order. An absent or unparseable segment stays
    // None; it does not invalidate the sample.
    let warning = fields.next().and_then(threshold);
    let critical = fields.next().and_then(threshold);
    let min = fields.next().and_then(threshold);
    let max = fields.next().and_then(threshold);

    Ok(MetricSample {
        name: label.to_string(),
        value,
        warning,
        critical,
        min,
        max,
    })
}

/// Extracts the numeric prefix of the value field, dropping any unit
/// suffix (`1s` -> 1.0, `0.1` -> 0.1, `1e3ms` -> 1000.0). The prefix is
/// limited to the numeric character set so unit text never reads as a
/// special float literal.
fn numeric_prefix(field: &str) -> Option<f64> {
    let end = field
        .find(|c: char| !is_numeric_char(c))
        .unwrap_or(field.len());

    // Back off over dangling exponent/sign chars until something parses.
    let mut prefix = &field[..end];
    while !prefix.is_empty() {
        if let Ok(v) = prefix.parse::<f64>() {
            return Some(v);
        }
        prefix = &prefix[..prefix.len() - 1];
    }
    None
}

/// Parses a threshold segment. Unlike values, thresholds carry no unit:
/// the whole segment must be numeric, so range syntax like `10:20` yields
/// None rather than a half-read bound.
fn threshold(segment: &str) -> Option<f64> {
    if segment.is_empty() || !segment.chars().all(is_numeric_char) {
        return None;
    }
    segment.parse().ok()
}

fn is_numeric_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '.' | '+' | '-' | 'e' | 'E')
}
