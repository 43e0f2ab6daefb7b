//! Date and duration literals, as Unix seconds.
//!
//! Dates accept ISO-8601 dates and datetimes, `now`, `today`, and relative forms such
//! as `today-7day` or `now+2hour`. Durations accept `<n><unit>` terms joined by `+`/`-`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DateError {
    #[error("Unrecognized date `{0}`")]
    BadDate(String),
    #[error("Unrecognized duration `{0}`")]
    BadDuration(String),
    #[error("Duration unit `{0}` has no fixed length in seconds")]
    VariableUnit(String),
}

lazy_static::lazy_static! {
    static ref RELATIVE_DATE: Regex =
        Regex::new(r"^(now|today)((?:[+-][0-9]*\.?[0-9]*[a-z]+)*)$").expect("valid regex");
    static ref DURATION_TERM: Regex =
        Regex::new(r"([+-]?)([0-9]*\.?[0-9]*)([a-z]+)").expect("valid regex");
}

/// Seconds in one unit. Month and year are rejected.
pub fn unit_seconds(unit: &str) -> Result<f64, DateError> {
    let unit = unit.trim_end_matches('s');
    match unit {
        "second" | "" => Ok(1.0),
        "minute" => Ok(60.0),
        "hour" => Ok(3_600.0),
        "day" => Ok(86_400.0),
        "week" => Ok(604_800.0),
        "month" | "quarter" | "year" => Err(DateError::VariableUnit(unit.to_string())),
        other => Err(DateError::BadDuration(other.to_string())),
    }
}

pub fn parse_duration(text: &str) -> Result<f64, DateError> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return Err(DateError::BadDuration(text));
    }
    if let Ok(seconds) = text.parse::<f64>() {
        return Ok(seconds);
    }
    let mut total = 0.0;
    let mut consumed = 0;
    for caps in DURATION_TERM.captures_iter(&text) {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        consumed += whole.len();
        let sign = if caps.get(1).map(|m| m.as_str()) == Some("-") {
            -1.0
        } else {
            1.0
        };
        let amount = match caps.get(2).map(|m| m.as_str()).unwrap_or_default() {
            "" => 1.0,
            digits => digits
                .parse::<f64>()
                .map_err(|_| DateError::BadDuration(text.clone()))?,
        };
        let unit = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
        total += sign * amount * unit_seconds(unit)?;
    }
    if consumed != text.len() {
        return Err(DateError::BadDuration(text));
    }
    Ok(total)
}

pub fn parse_date(text: &str) -> Result<f64, DateError> {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    if let Some(caps) = RELATIVE_DATE.captures(&lower) {
        let now = Utc::now();
        let base = match caps.get(1).map(|m| m.as_str()) {
            Some("today") => {
                let midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default();
                midnight.and_utc().timestamp() as f64
            }
            _ => now.timestamp_millis() as f64 / 1000.0,
        };
        let offset = match caps.get(2).map(|m| m.as_str()) {
            Some(rest) if !rest.is_empty() => parse_duration(rest)?,
            _ => 0.0,
        };
        return Ok(base + offset);
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return Ok(seconds);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp_millis() as f64 / 1000.0);
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.and_utc().timestamp_millis() as f64 / 1000.0);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp() as f64);
        }
    }
    Err(DateError::BadDate(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_dates() {
        assert_eq!(parse_date("1970-01-02").unwrap(), 86_400.0);
        assert_eq!(parse_date("1970-01-01T00:01:00Z").unwrap(), 60.0);
        assert_eq!(parse_date("1970-01-01 01:00:00").unwrap(), 3_600.0);
        assert!(parse_date("yesterday-ish").is_err());
    }

    #[test]
    fn test_relative_dates() {
        let today = parse_date("today").unwrap();
        assert_eq!(today % 86_400.0, 0.0);
        assert_eq!(parse_date("today-7day").unwrap(), today - 7.0 * 86_400.0);
    }

    #[test]
    fn test_durations() {
        assert_eq!(parse_duration("hour").unwrap(), 3_600.0);
        assert_eq!(parse_duration("2day").unwrap(), 172_800.0);
        assert_eq!(parse_duration("1day+2hours").unwrap(), 93_600.0);
        assert_eq!(parse_duration("30").unwrap(), 30.0);
        assert_eq!(
            parse_duration("month"),
            Err(DateError::VariableUnit("month".to_string()))
        );
        assert!(parse_duration("3 fortnights").is_err());
    }
}
