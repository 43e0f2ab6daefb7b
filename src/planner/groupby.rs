//! Plain aggregates and group-by: one grouped statement over the queried table.

use super::aggregates::{aggregate_columns, AggregateColumn};
use super::column_mapping::{ColumnMapping, Pull};
use super::scope::{chain, join_chain, Scope};
use super::{routed_where, row_filter, EdgeLayout, QueryPlan};
use crate::config::CompilerConfig;
use crate::expressions::{CompileError, Expression};
use crate::query::{Query, SelectColumn, Shape};
use crate::schema::Schema;
use crate::sql::ColumnResolver;
use crate::utils::sql_quote::quote_column;

pub fn plan_grouped(
    query: &Query,
    schema: &dyn Schema,
    config: &CompilerConfig,
    nested_path: &str,
) -> Result<QueryPlan, CompileError> {
    let tables = chain(schema, nested_path)?;
    let scope = Scope::new(schema, &tables);
    let routed = routed_where(query, schema, nested_path)?;
    let filter = row_filter(schema, nested_path, &routed, &scope, |_| false)?;

    let mut fields = Vec::new();
    let mut columns = Vec::new();
    let mut edges = Vec::new();
    let mut group_by = Vec::new();
    let mut having = Vec::new();
    let mut order = Vec::new();
    for (k, edge) in query.groupby.iter().enumerate() {
        let script = edge.value.to_sql(&scope)?;
        let alias = quote_column(&format!("g{}", k));
        let allow_nulls = edge.allow_nulls.unwrap_or(config.allow_nulls);
        fields.push(format!("{} AS {}", script.sql, alias));
        group_by.push(script.wrapped());
        if !allow_nulls {
            having.push(format!("{} IS NOT NULL", script.wrapped()));
        }
        order.push(format!("{}{}", alias, edge.sort.sql()));
        columns.push(
            ColumnMapping::new(&edge.name, k, &script.sql, Pull::for_type(script.json_type)).edge(),
        );
        edges.push(EdgeLayout {
            name: edge.name.clone(),
            domain: edge.domain.clone(),
            partitions: None,
            allow_nulls,
            index_column: k,
            part_column: k,
        });
    }

    for select in &query.select {
        let input = aggregate_input(select, &scope)?;
        let input = input.as_ref().map(|(sql, t)| (sql.as_str(), *t));
        for aggregate in aggregate_columns(select.aggregate, input, select.default.as_ref()) {
            let index = columns.len();
            fields.push(format!("{} AS {}", aggregate.sql, quote_column(&format!("a{}", index))));
            columns.push(aggregate_mapping(&select.name, index, aggregate));
        }
    }

    let mut sql = format!(
        "SELECT {} FROM {}{}",
        fields.join(", "),
        join_chain(&tables, tables.len() - 1, None),
        filter
    );
    if query.shape() == Shape::GroupBy {
        sql.push_str(&format!(" GROUP BY {}", group_by.join(", ")));
        if !having.is_empty() {
            sql.push_str(&format!(" HAVING {}", having.join(" AND ")));
        }
        sql.push_str(&format!(
            " ORDER BY {} LIMIT {}",
            order.join(", "),
            config.effective_limit(query.limit)
        ));
    }

    Ok(QueryPlan {
        sql,
        shape: query.shape(),
        format: query.format(),
        select_names: query.select.iter().map(|s| s.name.clone()).collect(),
        select_is_list: query.select_is_list,
        width: columns.len(),
        columns,
        levels: Vec::new(),
        edges,
    })
}

/// SQL and type an aggregate reads; `None` counts rows.
pub(super) fn aggregate_input(
    select: &SelectColumn,
    resolver: &dyn ColumnResolver,
) -> Result<Option<(String, crate::jx_type::JsonType)>, CompileError> {
    if select.value == Expression::variable(".") {
        return Ok(None);
    }
    let script = select.value.to_sql(resolver)?;
    Ok(Some((script.sql, script.json_type)))
}

pub(super) fn aggregate_mapping(name: &str, index: usize, aggregate: AggregateColumn) -> ColumnMapping {
    let mut mapping = ColumnMapping::new(name, index, aggregate.sql, aggregate.pull)
        .with_sub_path(aggregate.sub_path);
    mapping.empty = aggregate.empty;
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Snowflake;
    use serde_json::json;

    fn snowflake() -> Snowflake {
        let snowflake = Snowflake::new("t");
        snowflake
            .insert(&[json!({"a": 1, "k": "x"}), json!({"a": 2, "k": "y"}), json!({"a": 3})])
            .unwrap();
        snowflake
    }

    fn plan(q: serde_json::Value) -> Result<QueryPlan, CompileError> {
        let snowflake = snowflake();
        let query = Query::from_json(&q)?;
        plan_grouped(&query, &snowflake, &CompilerConfig::default(), ".")
    }

    #[test]
    fn test_count_rows() {
        let plan = plan(json!({"from": "t", "select": {"aggregate": "count"}})).unwrap();
        assert_eq!(plan.sql, "SELECT COUNT(*) AS \"a0\" FROM \"t\" t0");
        assert_eq!(plan.shape, Shape::Aggregate);
    }

    #[test]
    fn test_groupby_statement() {
        let plan = plan(json!({
            "from": "t",
            "groupby": "k",
            "select": [{"name": "total", "value": "a", "aggregate": "sum"}]
        }))
        .unwrap();
        assert_eq!(
            plan.sql,
            "SELECT t0.\"k.$string\" AS \"g0\", SUM((t0.\"a.$number\")) AS \"a1\" FROM \"t\" t0 \
             GROUP BY (t0.\"k.$string\") HAVING (t0.\"k.$string\") IS NOT NULL ORDER BY \"g0\" LIMIT 10"
        );
        assert!(plan.columns[0].is_edge);
        assert_eq!(plan.columns[0].pull, Pull::Text);
        assert_eq!(plan.width, 2);
    }

    #[test]
    fn test_stats_columns() {
        let plan = plan(json!({"from": "t", "select": {"name": "s", "value": "a", "aggregate": "stats"}})).unwrap();
        assert_eq!(plan.columns.len(), 8);
        assert_eq!(plan.columns_of("s").count(), 8);
    }
}
