//! Aggregate functions over one input column.
//!
//! SQLite has no boolean aggregates, so `or`/`and` count matching rows instead; `stats`
//! expands into one output column per statistic.

use serde_json::Value;

use super::column_mapping::Pull;
use crate::jx_type::JsonType;
use crate::query::Aggregate;
use crate::utils::sql_quote::quote_value;

/// One aggregated output column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AggregateColumn {
    /// `"."` for plain aggregates, the statistic name under `stats`.
    pub sub_path: String,
    pub sql: String,
    pub pull: Pull,
    /// Value when the group is empty.
    pub empty: Value,
}

const STATS: [&str; 8] = ["count", "min", "max", "sum", "avg", "sos", "variance", "std"];

/// Aggregate `input` (already compiled SQL with its type); `None` counts rows.
pub(crate) fn aggregate_columns(
    aggregate: Aggregate,
    input: Option<(&str, JsonType)>,
    default: Option<&Value>,
) -> Vec<AggregateColumn> {
    let (x, json_type) = match input {
        Some((sql, t)) => (format!("({})", sql), t),
        None => ("*".to_string(), JsonType::Integer),
    };
    let single = |sql: String, pull: Pull, empty: Value| {
        vec![AggregateColumn {
            sub_path: ".".to_string(),
            sql: with_default(sql, default),
            pull,
            empty: default.cloned().unwrap_or(empty),
        }]
    };
    match aggregate {
        Aggregate::None => single(x, Pull::for_type(json_type), Value::Null),
        Aggregate::Count => single(format!("COUNT({})", x), Pull::Number, Value::from(0)),
        Aggregate::Cardinality => {
            single(format!("COUNT(DISTINCT {})", x), Pull::Number, Value::from(0))
        }
        Aggregate::Sum => single(format!("SUM({})", x), Pull::Number, Value::Null),
        Aggregate::Min => single(format!("MIN({})", x), Pull::for_type(json_type), Value::Null),
        Aggregate::Max => single(format!("MAX({})", x), Pull::for_type(json_type), Value::Null),
        Aggregate::Average => single(format!("AVG({})", x), Pull::Number, Value::Null),
        Aggregate::Any => single(
            format!("(SUM(CASE WHEN {} THEN 1 ELSE 0 END) > 0)", x),
            Pull::Boolean,
            Value::Null,
        ),
        Aggregate::All => single(
            format!("(SUM(CASE WHEN NOT {} THEN 1 ELSE 0 END) = 0)", x),
            Pull::Boolean,
            Value::Null,
        ),
        Aggregate::Stats => STATS
            .iter()
            .map(|stat| {
                let (sql, pull) = stat_sql(stat, &x);
                AggregateColumn {
                    sub_path: stat.to_string(),
                    sql,
                    pull,
                    empty: if *stat == "count" { Value::from(0) } else { Value::Null },
                }
            })
            .collect(),
    }
}

fn stat_sql(stat: &str, x: &str) -> (String, Pull) {
    let variance = format!(
        "(SUM({x} * {x}) * 1.0 / COUNT({x}) - AVG({x}) * AVG({x}))",
        x = x
    );
    match stat {
        "count" => (format!("COUNT({})", x), Pull::Number),
        "min" => (format!("MIN({})", x), Pull::Number),
        "max" => (format!("MAX({})", x), Pull::Number),
        "sum" => (format!("SUM({})", x), Pull::Number),
        "avg" => (format!("AVG({})", x), Pull::Number),
        "sos" => (format!("SUM({x} * {x})", x = x), Pull::Number),
        "variance" => (variance, Pull::Number),
        _ => (variance, Pull::Sqrt),
    }
}

fn with_default(sql: String, default: Option<&Value>) -> String {
    match default {
        Some(v) if !v.is_null() => format!("COALESCE({}, {})", sql, quote_value(v)),
        _ => sql,
    }
}
