//! # Threshold Comparator
//!
//! Judges a scalar against a directional target such as `>500` or `<80`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComparatorError {
    #[error("no values")]
    NoValues,
    #[error("invalid operator in evaluation target {0:?}")]
    InvalidOperator(String),
    #[error("could not parse evaluation target {0:?}")]
    InvalidTarget(String),
    #[error("could not parse value {0:?}")]
    InvalidValue(String),
}

/// `Ok(true)` if `value` strictly satisfies `target`
///
/// # Errors
///
/// Fails when either side is empty, the operator is not `>` or `<`, or either
/// number does not parse as a finite float.
pub fn compare(value: &str, target: &str) -> Result<bool, ComparatorError> {
    let value = value.trim();
    let target = target.trim();
    if value.is_empty() || target.is_empty() {
        return Err(ComparatorError::NoValues);
    }

    let mut chars = target.chars();
    let operator = chars.next();
    let threshold = chars.as_str().trim();

    let actual =
        parse_finite(value).ok_or_else(|| ComparatorError::InvalidValue(value.to_string()))?;
    let threshold =
        parse_finite(threshold).ok_or_else(|| ComparatorError::InvalidTarget(target.to_string()))?;

    match operator {
        Some('>') => Ok(actual > threshold),
        Some('<') => Ok(actual < threshold),
        _ => Err(ComparatorError::InvalidOperator(target.to_string())),
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
