//! Edge domains: the values an edge can take, declared up front or discovered from data.

use serde_json::{json, Value};

use crate::expressions::literal::{is_null_value, number_value};
use crate::expressions::CompileError;
use crate::utils::dates::{parse_date, parse_duration};

#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Distinct observed values, ascending unless the edge sorts descending.
    Default { limit: Option<usize> },
    /// Explicit partitions, kept in author order.
    Set { partitions: Vec<Value> },
    Range { min: f64, max: f64, interval: f64 },
    Time { min: f64, max: f64, interval: f64 },
    Duration { min: f64, max: f64, interval: f64 },
}

impl Domain {
    pub fn from_json(edge: &str, value: &Value) -> Result<Domain, CompileError> {
        let Value::Object(map) = value else {
            return Err(invalid(edge, format!("expected an object, found {}", value)));
        };
        let kind = match map.get("type") {
            Some(Value::String(t)) => t.as_str(),
            None if map.contains_key("partitions") => "set",
            None => "default",
            Some(other) => return Err(invalid(edge, format!("bad type {}", other))),
        };
        match kind {
            "default" => {
                let limit = match map.get("limit") {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(
                        v.as_u64()
                            .ok_or_else(|| invalid(edge, "limit must be a positive integer"))?
                            as usize,
                    ),
                };
                Ok(Domain::Default { limit })
            }
            "set" => {
                let Some(Value::Array(parts)) = map.get("partitions") else {
                    return Err(invalid(edge, "set domain needs a `partitions` list"));
                };
                let mut partitions = Vec::with_capacity(parts.len());
                for part in parts {
                    let key = match part {
                        Value::Object(p) => p.get("value").cloned().unwrap_or(Value::Null),
                        other => other.clone(),
                    };
                    if is_null_value(&key) {
                        return Err(invalid(edge, "partitions cannot be null"));
                    }
                    if partitions.contains(&key) {
                        return Err(invalid(edge, format!("partition {} is listed twice", key)));
                    }
                    partitions.push(key);
                }
                Ok(Domain::Set { partitions })
            }
            "range" => {
                let (min, max, interval) = bounds(edge, map, number, number)?;
                Ok(Domain::Range { min, max, interval })
            }
            "time" => {
                let (min, max, interval) = bounds(edge, map, date, duration)?;
                Ok(Domain::Time { min, max, interval })
            }
            "duration" => {
                let (min, max, interval) = bounds(edge, map, duration, duration)?;
                Ok(Domain::Duration { min, max, interval })
            }
            other => Err(invalid(edge, format!("unknown domain type `{}`", other))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Domain::Default { .. } => "default",
            Domain::Set { .. } => "set",
            Domain::Range { .. } => "range",
            Domain::Time { .. } => "time",
            Domain::Duration { .. } => "duration",
        }
    }

    /// Partitions are known before the query runs.
    pub fn is_declared(&self) -> bool {
        !matches!(self, Domain::Default { .. })
    }

    /// `(min, interval)` of evenly spaced domains.
    pub fn spacing(&self) -> Option<(f64, f64)> {
        match self {
            Domain::Range { min, interval, .. }
            | Domain::Time { min, interval, .. }
            | Domain::Duration { min, interval, .. } => Some((*min, *interval)),
            _ => None,
        }
    }

    /// Declared partitions; `None` for a default domain. Evenly spaced domains with more
    /// than `max_parts` partitions are rejected.
    pub fn partitions(&self, edge: &str, max_parts: usize) -> Result<Option<Vec<Value>>, CompileError> {
        match self {
            Domain::Default { .. } => Ok(None),
            Domain::Set { partitions } => Ok(Some(partitions.clone())),
            Domain::Range { min, max, interval }
            | Domain::Time { min, max, interval }
            | Domain::Duration { min, max, interval } => {
                let count = ((max - min) / interval).ceil() as usize;
                if count > max_parts {
                    return Err(invalid(
                        edge,
                        format!("{} partitions exceed the limit of {}", count, max_parts),
                    ));
                }
                Ok(Some(
                    (0..count)
                        .map(|i| number_value(min + i as f64 * interval))
                        .collect(),
                ))
            }
        }
    }

    /// Domain description for cube results.
    pub fn describe(&self, partitions: &[Value]) -> Value {
        let mut out = json!({
            "type": self.type_name(),
            "partitions": partitions,
        });
        if let Some((min, interval)) = self.spacing() {
            out["min"] = number_value(min);
            out["interval"] = number_value(interval);
            out["max"] = number_value(min + partitions.len() as f64 * interval);
        }
        out
    }
}

fn invalid(edge: &str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidDomain {
        edge: edge.to_string(),
        reason: reason.into(),
    }
}

type Reader = fn(&Value) -> Result<f64, String>;

fn bounds(
    edge: &str,
    map: &serde_json::Map<String, Value>,
    endpoint: Reader,
    step: Reader,
) -> Result<(f64, f64, f64), CompileError> {
    let get = |key: &str, read: Reader| -> Result<f64, CompileError> {
        let value = map
            .get(key)
            .ok_or_else(|| invalid(edge, format!("missing `{}`", key)))?;
        read(value).map_err(|reason| invalid(edge, format!("`{}`: {}", key, reason)))
    };
    let min = get("min", endpoint)?;
    let max = get("max", endpoint)?;
    let interval = get("interval", step)?;
    if interval.is_nan() || interval <= 0.0 {
        return Err(invalid(edge, "interval must be positive"));
    }
    if max < min {
        return Err(invalid(edge, "max is below min"));
    }
    Ok((min, max, interval))
}

fn number(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected a number, found {}", value))
}

fn date(value: &Value) -> Result<f64, String> {
    match value {
        Value::String(s) => parse_date(s).map_err(|e| e.to_string()),
        Value::Object(m) => match m.get("date") {
            Some(Value::String(s)) => parse_date(s).map_err(|e| e.to_string()),
            _ => Err(format!("expected a date, found {}", value)),
        },
        other => number(other),
    }
}

fn duration(value: &Value) -> Result<f64, String> {
    match value {
        Value::String(s) => parse_duration(s).map_err(|e| e.to_string()),
        other => number(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_domain_keeps_author_order() {
        let domain = Domain::from_json("a", &json!({"type": "set", "partitions": [3, 1, {"value": 2}]})).unwrap();
        assert_eq!(
            domain.partitions("a", 10).unwrap(),
            Some(vec![json!(3), json!(1), json!(2)])
        );
    }

    #[test]
    fn test_range_partitions() {
        let domain = Domain::from_json("a", &json!({"type": "range", "min": 0, "max": 25, "interval": 10})).unwrap();
        assert_eq!(
            domain.partitions("a", 10).unwrap(),
            Some(vec![json!(0), json!(10), json!(20)])
        );
        assert!(matches!(
            domain.partitions("a", 2),
            Err(CompileError::InvalidDomain { .. })
        ));
    }

    #[test]
    fn test_time_and_duration_domains() {
        let time = Domain::from_json(
            "t",
            &json!({"type": "time", "min": "1970-01-01", "max": "1970-01-03", "interval": "day"}),
        )
        .unwrap();
        assert_eq!(
            time.partitions("t", 10).unwrap(),
            Some(vec![json!(0), json!(86400)])
        );
        let monthly = Domain::from_json(
            "t",
            &json!({"type": "time", "min": "1970-01-01", "max": "1971-01-01", "interval": "month"}),
        );
        assert!(matches!(monthly, Err(CompileError::InvalidDomain { .. })));
        let duration = Domain::from_json(
            "d",
            &json!({"type": "duration", "min": 0, "max": "2hour", "interval": "hour"}),
        )
        .unwrap();
        assert_eq!(duration.partitions("d", 10).unwrap().map(|p| p.len()), Some(2));
    }

    #[test]
    fn test_bad_domains() {
        assert!(Domain::from_json("a", &json!({"type": "range", "min": 0, "max": 10, "interval": 0})).is_err());
        assert!(Domain::from_json("a", &json!({"type": "set", "partitions": [1, 1]})).is_err());
        assert!(Domain::from_json("a", &json!({"type": "bogus"})).is_err());
        assert_eq!(
            Domain::from_json("a", &json!({})).unwrap(),
            Domain::Default { limit: None }
        );
    }
}
