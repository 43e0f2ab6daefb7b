//! # Query planning
//!
//! Turns a [`Query`] into one SQLite statement plus the [`ColumnMapping`]s that say where
//! every result column belongs in the reassembled document.
//!
//! - **list**: one `SELECT` per nesting level touched, combined with `UNION ALL` and ordered
//!   so each row is followed by its nested rows (see [`list`])
//! - **cube** (edges): domains cross joined and left joined to grouped data, so every
//!   coordinate appears (see [`cube`])
//! - **group-by** and plain aggregates: a single grouped statement (see [`groupby`])

pub mod aggregates;
pub mod column_mapping;
pub mod cube;
pub mod groupby;
pub mod list;
pub(crate) mod scope;

pub use column_mapping::{ColumnMapping, Placement, Pull};

use std::collections::BTreeMap;

use log::debug;
use serde_json::Value;

use crate::config::CompilerConfig;
use crate::expressions::{CompileError, Expr, Expression, SqlLang};
use crate::query::{Domain, Format, Query, Shape};
use crate::schema::Schema;
use crate::sql::ColumnResolver;
use crate::utils::field_path::{relative_field, startswith_field};

/// Fixed leading columns of a list statement.
pub const LEVEL_COLUMN: usize = 0;
pub const ROW_COLUMN: usize = 1;
pub const ID_COLUMN: usize = 2;
pub const PARENT_COLUMN: usize = 3;

/// A nested table a list query reads, with where its elements land.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    pub query_path: String,
    /// Nesting levels below the queried table; 0 for the queried table itself.
    pub depth: usize,
    /// Route to each element container this level fills, and whether the element is a
    /// bare value rather than an object.
    pub elements: Vec<(Vec<Placement>, bool)>,
}

/// Result columns describing one edge (or group-by key).
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeLayout {
    pub name: String,
    pub domain: Domain,
    /// Declared partitions; `None` when the domain is discovered from data.
    pub partitions: Option<Vec<Value>>,
    pub allow_nulls: bool,
    /// Column holding the partition index (cube) or the group value (group-by).
    pub index_column: usize,
    /// Column holding the partition value.
    pub part_column: usize,
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub sql: String,
    pub shape: Shape,
    pub format: Format,
    pub select_names: Vec<String>,
    pub select_is_list: bool,
    pub columns: Vec<ColumnMapping>,
    pub levels: Vec<Level>,
    pub edges: Vec<EdgeLayout>,
    /// Number of columns every result row carries.
    pub width: usize,
}

impl QueryPlan {
    /// Mappings of one select column, in result order.
    pub fn columns_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ColumnMapping> + 'a {
        self.columns
            .iter()
            .filter(move |c| !c.is_edge && c.name == name)
    }
}

pub fn compile(
    query: &Query,
    schema: &dyn Schema,
    config: &CompilerConfig,
) -> Result<QueryPlan, CompileError> {
    let nested_path = nested_path_of(&query.from, schema.fact())?;
    scope::get_table(schema, &nested_path)?;

    let plan = match query.shape() {
        Shape::List => list::plan_list(query, schema, config, &nested_path)?,
        Shape::Aggregate | Shape::GroupBy => groupby::plan_grouped(query, schema, config, &nested_path)?,
        Shape::Cube => cube::plan_cube(query, schema, config, &nested_path)?,
    };
    debug!(
        "Compiled {:?} query on `{}` ({} columns): {}",
        plan.shape,
        query.from,
        plan.columns.len(),
        plan.sql
    );
    Ok(plan)
}

/// Nested path named by `from`, relative to the fact.
pub fn nested_path_of(from: &str, fact: &str) -> Result<String, CompileError> {
    if !startswith_field(from, fact) {
        return Err(CompileError::invalid_query_with_context(
            format!("`{}` is not part of fact `{}`", from, fact),
            "from",
        ));
    }
    Ok(relative_field(from, fact))
}

/// Conjuncts of a simplified where clause; `true` has none.
pub(crate) fn where_terms(where_clause: &Expression) -> Vec<Expression> {
    let simple = where_clause.partial_eval::<SqlLang>();
    if simple.is_true() {
        return Vec::new();
    }
    match simple.node() {
        Expr::And(and) => and.terms.clone(),
        _ => vec![simple],
    }
}

/// Where conjuncts paired with the table each one reads, seen from `nested_path`.
pub(crate) fn routed_where(
    query: &Query,
    schema: &dyn Schema,
    nested_path: &str,
) -> Result<Vec<(String, Expression)>, CompileError> {
    where_terms(&query.where_clause)
        .into_iter()
        .map(|term| Ok((scope::level_of(schema, nested_path, &term)?, term)))
        .collect()
}

/// `WHERE` clause over rows of the table at `nested_path`. Terms on deeper tables keep a
/// row when one of its nested rows matches, unless `applied` says a statement reading
/// that table filters it.
pub(crate) fn row_filter(
    schema: &dyn Schema,
    nested_path: &str,
    routed: &[(String, Expression)],
    resolver: &dyn ColumnResolver,
    applied: impl Fn(&str) -> bool,
) -> Result<String, CompileError> {
    let mut conditions = Vec::new();
    let base: Vec<Expression> = routed
        .iter()
        .filter(|(level, _)| level == nested_path)
        .map(|(_, term)| term.clone())
        .collect();
    if !base.is_empty() {
        conditions.push(Expression::all(base).to_sql(resolver)?.condition());
    }
    let mut nested: BTreeMap<&str, Vec<Expression>> = BTreeMap::new();
    for (level, term) in routed {
        if level != nested_path && !applied(level.as_str()) {
            nested.entry(level.as_str()).or_default().push(term.clone());
        }
    }
    for (level, terms) in nested {
        conditions.push(scope::exists_sql(schema, nested_path, level, terms)?);
    }
    if conditions.is_empty() {
        return Ok(String::new());
    }
    Ok(format!(" WHERE {}", conditions.join(" AND ")))
}

/// `WHERE` clause for the given conjuncts, compiled against `resolver`.
pub(crate) fn where_sql(terms: &[Expression], resolver: &dyn ColumnResolver) -> Result<String, CompileError> {
    if terms.is_empty() {
        return Ok(String::new());
    }
    let script = Expression::all(terms.to_vec()).to_sql(resolver)?;
    Ok(format!(" WHERE {}", script.condition()))
}

/// Sort expressions may name select columns.
pub(crate) fn resolve_select_names(query: &Query, expr: &Expression) -> Expression {
    let bindings = query
        .select
        .iter()
        .filter(|s| expr.as_variable() == Some(s.name.as_str()))
        .map(|s| (s.name.clone(), s.value.clone()))
        .collect();
    expr.substitute(&bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_path_of() {
        assert_eq!(nested_path_of("orders", "orders").unwrap(), ".");
        assert_eq!(nested_path_of("orders.lines", "orders").unwrap(), "lines");
        assert!(nested_path_of("other", "orders").is_err());
    }

    #[test]
    fn test_where_terms() {
        let w = Expression::from_json(&json!({"and": [{"eq": {"a": 1}}, true, {"gt": {"b": 2}}]})).unwrap();
        assert_eq!(where_terms(&w).len(), 2);
        assert!(where_terms(&Expression::boolean(true)).is_empty());
    }

    #[test]
    fn test_sort_by_select_name() {
        let query = Query::from_json(&json!({"from": "t", "select": [{"name": "x", "value": {"add": ["a", 1]}}]})).unwrap();
        let resolved = resolve_select_names(&query, &Expression::variable("x"));
        assert_eq!(resolved, query.select[0].value);
        assert_eq!(resolve_select_names(&query, &Expression::variable("a")), Expression::variable("a"));
    }
}
