//! # Duration Parsing
//!
//! Parses Kubernetes-style duration strings such as evaluation retry intervals.

use anyhow::{anyhow, Result};
use chrono::TimeDelta;
use regex::Regex;
use std::time::Duration;

/// Parse a duration such as `"30s"`, `"5m"`, `"1h"` or `"1d"`
///
/// # Errors
///
/// Returns an error for empty input, an unknown unit, a zero amount or an
/// amount too large to be added to a timestamp.
pub fn parse_kubernetes_duration(duration_str: &str) -> Result<Duration> {
    let trimmed = duration_str.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let duration_regex = Regex::new(r"^(?P<number>\d+)(?P<unit>ms|[smhd])$")
        .map_err(|e| anyhow!("Failed to compile regex: {e}"))?;

    let lower = trimmed.to_lowercase();
    let captures = duration_regex.captures(&lower).ok_or_else(|| {
        anyhow!("Invalid duration format '{trimmed}'. Expected <number><unit>, e.g. '5s' or '1m'")
    })?;

    let number: u64 = captures["number"]
        .parse()
        .map_err(|e| anyhow!("Invalid duration number in '{trimmed}': {e}"))?;
    if number == 0 {
        return Err(anyhow!("Duration must be greater than 0, got '{trimmed}'"));
    }

    let too_large = || anyhow!("Duration '{trimmed}' is too large");
    let seconds = |factor: u64| number.checked_mul(factor).map(Duration::from_secs);
    let duration = match &captures["unit"] {
        "ms" => Some(Duration::from_millis(number)),
        "s" => Some(Duration::from_secs(number)),
        "m" => seconds(60),
        "h" => seconds(3600),
        "d" => seconds(86400),
        unit => return Err(anyhow!("Invalid unit '{unit}' in duration '{trimmed}'")),
    }
    .ok_or_else(too_large)?;

    // Retry times are stored as timestamps
    TimeDelta::from_std(duration).map_err(|_| too_large())?;
    Ok(duration)
}
