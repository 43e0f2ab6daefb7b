//! Table and cube layouts of list results.

use serde_json::{json, Value};

use super::get_path;
use crate::planner::QueryPlan;

/// Cell of `record` for one select column.
fn cell(plan: &QueryPlan, record: &Value, name: &str) -> Value {
    if plan.select_is_list {
        get_path(record, name)
    } else {
        record.clone()
    }
}

/// `{"header": [...], "data": [[...], ...]}`, one row per record.
pub fn records_table(plan: &QueryPlan, records: &[Value]) -> Value {
    let data: Vec<Value> = records
        .iter()
        .map(|record| {
            Value::Array(
                plan.select_names
                    .iter()
                    .map(|name| cell(plan, record, name))
                    .collect(),
            )
        })
        .collect();
    json!({
        "header": plan.select_names,
        "data": data,
    })
}

/// A cube with a single `rownum` edge.
pub fn records_cube(plan: &QueryPlan, records: &[Value]) -> Value {
    let mut data = serde_json::Map::new();
    for name in &plan.select_names {
        data.insert(
            name.clone(),
            Value::Array(records.iter().map(|record| cell(plan, record, name)).collect()),
        );
    }
    json!({
        "edges": [{
            "name": "rownum",
            "domain": {"type": "rownum", "min": 0, "max": records.len(), "interval": 1},
        }],
        "data": data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Format, Shape};

    fn plan(select_is_list: bool) -> QueryPlan {
        QueryPlan {
            sql: String::new(),
            shape: Shape::List,
            format: Format::Table,
            select_names: if select_is_list {
                vec!["a".into(), "b.c".into()]
            } else {
                vec!["a".into()]
            },
            select_is_list,
            columns: vec![],
            levels: vec![],
            edges: vec![],
            width: 0,
        }
    }

    #[test]
    fn test_table_cells_follow_names() {
        let records = vec![json!({"a": 1, "b": [{"c": 10}, {"c": 20}]}), json!({"a": 2})];
        assert_eq!(
            records_table(&plan(true), &records),
            json!({"header": ["a", "b.c"], "data": [[1, [10, 20]], [2, null]]})
        );
    }

    #[test]
    fn test_rownum_cube() {
        let records = vec![json!(1), json!(2)];
        assert_eq!(
            records_cube(&plan(false), &records),
            json!({
                "edges": [{"name": "rownum", "domain": {"type": "rownum", "min": 0, "max": 2, "interval": 1}}],
                "data": {"a": [1, 2]}
            })
        );
    }
}
