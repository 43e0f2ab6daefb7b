//! # Normalized queries
//!
//! A query arrives as JSON:
//!
//! ```json
//! {"from": "orders.lines", "select": ["qty", {"name": "n", "aggregate": "count"}],
//!  "where": {"gt": {"qty": 1}}, "edges": ["sku"], "sort": "qty", "limit": 10, "format": "cube"}
//! ```
//!
//! [`Query::from_json`] checks its shape and turns every expression into an [`Expression`].
//! Names are not checked against a schema here; that happens at planning time.

pub mod domain;

pub use domain::Domain;

use serde_json::{Map, Value};

use crate::expressions::{CompileError, Expr, Expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    List,
    Table,
    Cube,
}

impl Format {
    pub fn parse(name: &str) -> Result<Format, CompileError> {
        match name {
            "list" => Ok(Format::List),
            "table" => Ok(Format::Table),
            "cube" => Ok(Format::Cube),
            other => Err(CompileError::InvalidQuery(format!("unknown format `{}`", other))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Format::List => "list",
            Format::Table => "table",
            Format::Cube => "cube",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    None,
    Count,
    Sum,
    Min,
    Max,
    Average,
    Cardinality,
    /// Boolean OR over the group.
    Any,
    /// Boolean AND over the group.
    All,
    Stats,
}

impl Aggregate {
    pub fn parse(name: &str) -> Result<Aggregate, CompileError> {
        match name {
            "none" => Ok(Aggregate::None),
            "count" => Ok(Aggregate::Count),
            "sum" | "add" => Ok(Aggregate::Sum),
            "min" | "minimum" => Ok(Aggregate::Min),
            "max" | "maximum" => Ok(Aggregate::Max),
            "avg" | "average" | "mean" => Ok(Aggregate::Average),
            "cardinality" | "count_distinct" => Ok(Aggregate::Cardinality),
            "or" | "any" => Ok(Aggregate::Any),
            "and" | "all" => Ok(Aggregate::All),
            "stats" => Ok(Aggregate::Stats),
            other => Err(CompileError::InvalidQuery(format!("unknown aggregate `{}`", other))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Aggregate::None => "none",
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Average => "average",
            Aggregate::Cardinality => "cardinality",
            Aggregate::Any => "or",
            Aggregate::All => "and",
            Aggregate::Stats => "stats",
        }
    }

    pub fn is_aggregate(self) -> bool {
        self != Aggregate::None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectColumn {
    pub name: String,
    pub value: Expression,
    pub aggregate: Aggregate,
    /// Replaces a missing result.
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn parse(value: &Value) -> Result<SortOrder, CompileError> {
        match value {
            Value::String(s) if s == "asc" => Ok(SortOrder::Asc),
            Value::String(s) if s == "desc" => Ok(SortOrder::Desc),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SortOrder::Asc),
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortOrder::Desc),
            other => Err(CompileError::InvalidQuery(format!("bad sort order {}", other))),
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "",
            SortOrder::Desc => " DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortColumn {
    pub value: Expression,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub name: String,
    pub value: Expression,
    pub domain: Domain,
    /// `None` defers to the compiler configuration.
    pub allow_nulls: Option<bool>,
    pub sort: SortOrder,
}

/// The three statement shapes the planner builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    List,
    /// Aggregates without edges or group-by: one result record.
    Aggregate,
    Cube,
    GroupBy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Fact name, optionally followed by a nested path: `orders.lines`.
    pub from: String,
    pub select: Vec<SelectColumn>,
    /// `select` was written as a list, so rows come back as records.
    pub select_is_list: bool,
    pub where_clause: Expression,
    pub edges: Vec<Edge>,
    pub groupby: Vec<Edge>,
    pub sort: Vec<SortColumn>,
    pub limit: Option<usize>,
    pub format: Option<Format>,
}

impl Query {
    pub fn from_json(value: &Value) -> Result<Query, CompileError> {
        let Value::Object(map) = value else {
            return Err(CompileError::InvalidQuery(format!("expected an object, found {}", value)));
        };
        for key in map.keys() {
            if !matches!(
                key.as_str(),
                "from" | "select" | "where" | "edges" | "groupby" | "sort" | "limit" | "format"
            ) {
                return Err(CompileError::invalid_query_with_context(
                    format!("unknown clause `{}`", key),
                    value.to_string(),
                ));
            }
        }
        let from = match map.get("from") {
            Some(Value::String(from)) if !from.is_empty() => from.clone(),
            _ => return Err(CompileError::InvalidQuery("`from` must name a fact".to_string())),
        };

        let edges = parse_edges(map.get("edges"), true)?;
        let groupby = parse_edges(map.get("groupby"), false)?;
        if !edges.is_empty() && !groupby.is_empty() {
            return Err(CompileError::InvalidQuery(
                "`edges` and `groupby` cannot be combined".to_string(),
            ));
        }

        let (select, select_is_list) = match map.get("select") {
            None | Some(Value::Null) => {
                if edges.is_empty() && groupby.is_empty() {
                    (vec![parse_select(&Value::String("*".to_string()))?], true)
                } else {
                    (vec![parse_select(&serde_json::json!({"aggregate": "count"}))?], false)
                }
            }
            Some(Value::Array(items)) => (
                items.iter().map(parse_select).collect::<Result<Vec<_>, _>>()?,
                true,
            ),
            Some(single) => (vec![parse_select(single)?], false),
        };
        let mut names = std::collections::HashSet::new();
        for column in &select {
            if !names.insert(column.name.clone()) {
                return Err(CompileError::InvalidQuery(format!(
                    "select name `{}` is used twice",
                    column.name
                )));
            }
        }

        let where_clause = match map.get("where") {
            None | Some(Value::Null) => Expression::boolean(true),
            Some(w) => Expression::from_json(w)?,
        };
        let sort = parse_sort(map.get("sort"))?;
        let limit = match map.get("limit") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or_else(|| {
                CompileError::InvalidQuery(format!("`limit` must be a non-negative integer, found {}", v))
            })? as usize),
        };
        let format = match map.get("format") {
            None | Some(Value::Null) => None,
            Some(Value::String(f)) => Some(Format::parse(f)?),
            Some(other) => return Err(CompileError::InvalidQuery(format!("bad format {}", other))),
        };

        let query = Query {
            from,
            select,
            select_is_list,
            where_clause,
            edges,
            groupby,
            sort,
            limit,
            format,
        };
        query.check_aggregates()?;
        Ok(query)
    }

    fn check_aggregates(&self) -> Result<(), CompileError> {
        let aggregated = self.select.iter().filter(|s| s.aggregate.is_aggregate()).count();
        match self.shape() {
            Shape::Cube | Shape::GroupBy if aggregated != self.select.len() => Err(
                CompileError::InvalidQuery("every select column of an edges or groupby query needs an aggregate".to_string()),
            ),
            Shape::Aggregate if aggregated != self.select.len() => Err(CompileError::InvalidQuery(
                "aggregates cannot be mixed with plain values without edges or groupby".to_string(),
            )),
            _ => Ok(()),
        }
    }

    pub fn shape(&self) -> Shape {
        if !self.edges.is_empty() {
            Shape::Cube
        } else if !self.groupby.is_empty() {
            Shape::GroupBy
        } else if self.select.iter().any(|s| s.aggregate.is_aggregate()) {
            Shape::Aggregate
        } else {
            Shape::List
        }
    }

    /// Requested format, else the natural one for the shape.
    pub fn format(&self) -> Format {
        self.format.unwrap_or(match self.shape() {
            Shape::List | Shape::Aggregate => Format::List,
            Shape::Cube => Format::Cube,
            Shape::GroupBy => Format::Table,
        })
    }
}

fn parse_select(value: &Value) -> Result<SelectColumn, CompileError> {
    match value {
        Value::String(name) => {
            let name = name.trim_end_matches(".*").trim_end_matches('*').to_string();
            Ok(SelectColumn {
                name: if name.is_empty() { ".".to_string() } else { name },
                value: Expression::from_json(value)?,
                aggregate: Aggregate::None,
                default: None,
            })
        }
        Value::Object(map) => {
            check_keys(map, &["name", "value", "aggregate", "default"], "select")?;
            let aggregate = match map.get("aggregate") {
                None | Some(Value::Null) => Aggregate::None,
                Some(Value::String(a)) => Aggregate::parse(a)?,
                Some(other) => return Err(CompileError::InvalidQuery(format!("bad aggregate {}", other))),
            };
            let value_json = match map.get("value") {
                Some(v) => v.clone(),
                None if aggregate == Aggregate::Count => Value::String(".".to_string()),
                None => {
                    return Err(CompileError::invalid_query_with_context(
                        "select column needs a `value`",
                        value.to_string(),
                    ))
                }
            };
            let expr = Expression::from_json(&value_json)?;
            let name = match (map.get("name"), &value_json) {
                (Some(Value::String(name)), _) => name.clone(),
                (Some(other), _) => {
                    return Err(CompileError::InvalidQuery(format!("bad select name {}", other)))
                }
                (None, _) if aggregate.is_aggregate() && !matches!(expr.node(), Expr::Variable(v) if v.var != ".") => {
                    aggregate.name().to_string()
                }
                (None, Value::String(path)) => path.trim_end_matches(".*").to_string(),
                (None, _) => {
                    return Err(CompileError::invalid_query_with_context(
                        "select expression needs a `name`",
                        value.to_string(),
                    ))
                }
            };
            Ok(SelectColumn {
                name,
                value: expr,
                aggregate,
                default: map.get("default").cloned(),
            })
        }
        other => Err(CompileError::InvalidQuery(format!("bad select {}", other))),
    }
}

fn parse_edges(value: Option<&Value>, with_domain: bool) -> Result<Vec<Edge>, CompileError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.clone(),
        Some(single) => vec![single.clone()],
    };
    items.iter().map(|item| parse_edge(item, with_domain)).collect()
}

fn parse_edge(value: &Value, with_domain: bool) -> Result<Edge, CompileError> {
    match value {
        Value::String(name) => Ok(Edge {
            name: name.clone(),
            value: Expression::from_json(value)?,
            domain: Domain::Default { limit: None },
            allow_nulls: None,
            sort: SortOrder::Asc,
        }),
        Value::Object(map) => {
            check_keys(
                map,
                &["name", "value", "domain", "allowNulls", "allow_nulls", "sort"],
                "edge",
            )?;
            let value_json = map.get("value").ok_or_else(|| {
                CompileError::invalid_query_with_context("edge needs a `value`", value.to_string())
            })?;
            let name = match (map.get("name"), value_json) {
                (Some(Value::String(name)), _) => name.clone(),
                (None, Value::String(path)) => path.clone(),
                _ => {
                    return Err(CompileError::invalid_query_with_context(
                        "edge needs a `name`",
                        value.to_string(),
                    ))
                }
            };
            let domain = match map.get("domain") {
                None | Some(Value::Null) => Domain::Default { limit: None },
                Some(_) if !with_domain => {
                    return Err(CompileError::InvalidQuery(format!(
                        "groupby `{}` cannot declare a domain",
                        name
                    )))
                }
                Some(d) => Domain::from_json(&name, d)?,
            };
            let allow_nulls = match map.get("allowNulls").or_else(|| map.get("allow_nulls")) {
                None | Some(Value::Null) => None,
                Some(Value::Bool(b)) => Some(*b),
                Some(other) => {
                    return Err(CompileError::InvalidQuery(format!("bad allowNulls {}", other)))
                }
            };
            let sort = match map.get("sort") {
                None | Some(Value::Null) => SortOrder::Asc,
                Some(s) => SortOrder::parse(s)?,
            };
            Ok(Edge {
                name,
                value: Expression::from_json(value_json)?,
                domain,
                allow_nulls,
                sort,
            })
        }
        other => Err(CompileError::InvalidQuery(format!("bad edge {}", other))),
    }
}

fn parse_sort(value: Option<&Value>) -> Result<Vec<SortColumn>, CompileError> {
    let items = match value {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.clone(),
        Some(single) => vec![single.clone()],
    };
    let mut out = Vec::with_capacity(items.len());
    for item in &items {
        match item {
            Value::String(_) => out.push(SortColumn {
                value: Expression::from_json(item)?,
                order: SortOrder::Asc,
            }),
            Value::Object(map) if map.contains_key("value") => {
                check_keys(map, &["value", "sort"], "sort")?;
                out.push(SortColumn {
                    value: Expression::from_json(&map["value"])?,
                    order: match map.get("sort") {
                        None => SortOrder::Asc,
                        Some(s) => SortOrder::parse(s)?,
                    },
                });
            }
            // {"a": "desc"}
            Value::Object(map) if map.len() == 1 => {
                for (var, order) in map {
                    out.push(SortColumn {
                        value: Expression::variable(var.clone()),
                        order: SortOrder::parse(order)?,
                    });
                }
            }
            other => return Err(CompileError::InvalidQuery(format!("bad sort {}", other))),
        }
    }
    Ok(out)
}

fn check_keys(map: &Map<String, Value>, allowed: &[&str], what: &str) -> Result<(), CompileError> {
    match map.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(CompileError::InvalidQuery(format!(
            "unknown {} property `{}`",
            what, key
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_query() {
        let query = Query::from_json(&json!({
            "from": "t",
            "select": ["a", "b.c"],
            "where": {"eq": {"a": 1}},
            "sort": {"value": "a", "sort": "desc"},
            "limit": 5
        }))
        .unwrap();
        assert_eq!(query.shape(), Shape::List);
        assert_eq!(query.format(), Format::List);
        assert!(query.select_is_list);
        assert_eq!(query.select[1].name, "b.c");
        assert_eq!(query.sort[0].order, SortOrder::Desc);
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_count_defaults() {
        let query = Query::from_json(&json!({"from": "t", "select": {"aggregate": "count"}})).unwrap();
        assert_eq!(query.shape(), Shape::Aggregate);
        assert_eq!(query.select[0].name, "count");
        assert_eq!(query.select[0].value, Expression::variable("."));

        let cube = Query::from_json(&json!({"from": "t", "edges": ["a"]})).unwrap();
        assert_eq!(cube.shape(), Shape::Cube);
        assert_eq!(cube.format(), Format::Cube);
        assert_eq!(cube.select[0].aggregate, Aggregate::Count);
    }

    #[test]
    fn test_edges_and_groupby() {
        let query = Query::from_json(&json!({
            "from": "t",
            "select": {"name": "total", "value": "v", "aggregate": "sum"},
            "edges": [{"value": "a", "domain": {"type": "set", "partitions": [1, 2]}, "allowNulls": true}]
        }))
        .unwrap();
        assert_eq!(query.edges[0].name, "a");
        assert_eq!(query.edges[0].allow_nulls, Some(true));

        let grouped = Query::from_json(&json!({"from": "t", "groupby": ["a"], "select": {"aggregate": "count"}})).unwrap();
        assert_eq!(grouped.format(), Format::Table);
    }

    #[test]
    fn test_rejected_queries() {
        for bad in [
            json!({"select": "a"}),
            json!({"from": "t", "selct": "a"}),
            json!({"from": "t", "select": ["a", "a"]}),
            json!({"from": "t", "select": ["a", {"value": "b", "aggregate": "sum"}]}),
            json!({"from": "t", "edges": ["a"], "groupby": ["b"]}),
            json!({"from": "t", "groupby": [{"value": "a", "domain": {"type": "set", "partitions": [1]}}]}),
            json!({"from": "t", "format": "csv"}),
        ] {
            assert!(Query::from_json(&bad).is_err(), "accepted {}", bad);
        }
    }
}
