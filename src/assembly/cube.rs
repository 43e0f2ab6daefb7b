//! Aggregate, group-by and cube results laid out over their edges.

use serde_json::{json, Map, Value};

use super::{pull, slot, AssemblyError, Step};
use crate::expressions::literal::compare_values;
use crate::planner::{EdgeLayout, QueryPlan};
use crate::query::{Format, Shape};

/// Value of one select column in `row`; empty groups get the column's empty value.
fn select_value(plan: &QueryPlan, name: &str, row: Option<&[Value]>) -> Value {
    let mut out = Value::Null;
    for column in plan.columns_of(name) {
        let mut value = row.map_or(Value::Null, |r| pull(column.pull, &r[column.index]));
        if value.is_null() {
            value = column.empty.clone();
        }
        if column.sub_path == "." {
            out = value;
        } else if !value.is_null() {
            *slot(&mut out, &[Step::Key(column.sub_path.clone())]) = value;
        }
    }
    out
}

fn select_values(plan: &QueryPlan, row: Option<&[Value]>) -> Map<String, Value> {
    plan.select_names
        .iter()
        .map(|name| (name.clone(), select_value(plan, name, row)))
        .collect()
}

/// A plain aggregate: one row, no edges.
pub fn aggregate(plan: &QueryPlan, row: Option<&Vec<Value>>) -> Value {
    let values = select_values(plan, row.map(|r| r.as_slice()));
    match plan.format {
        Format::List => Value::Object(values),
        Format::Table => json!({
            "header": plan.select_names,
            "data": [values.values().cloned().collect::<Vec<_>>()],
        }),
        Format::Cube => json!({"edges": [], "data": values}),
    }
}

/// Partitions of one edge and where each row falls in them.
struct Axis<'a> {
    edge: &'a EdgeLayout,
    parts: Vec<Value>,
}

impl Axis<'_> {
    fn size(&self) -> usize {
        self.parts.len() + usize::from(self.edge.allow_nulls)
    }

    fn part(&self, index: usize) -> Value {
        self.parts.get(index).cloned().unwrap_or(Value::Null)
    }
}

fn axes_of<'a>(plan: &'a QueryPlan, rows: &[Vec<Value>]) -> Vec<Axis<'a>> {
    plan.edges
        .iter()
        .map(|edge| {
            let parts = match &edge.partitions {
                Some(parts) => parts.clone(),
                None if plan.shape == Shape::Cube => {
                    // discovered domains arrive with their index
                    let mut found: Vec<(i64, Value)> = rows
                        .iter()
                        .filter(|r| !r[edge.part_column].is_null())
                        .filter_map(|r| r[edge.index_column].as_i64().map(|i| (i, r[edge.part_column].clone())))
                        .collect();
                    found.sort_by_key(|(i, _)| *i);
                    found.dedup_by_key(|(i, _)| *i);
                    found.into_iter().map(|(_, p)| p).collect()
                }
                None => {
                    let mut found: Vec<Value> = Vec::new();
                    for row in rows {
                        let value = edge_value(plan, edge, row);
                        if !value.is_null() && !found.contains(&value) {
                            found.push(value);
                        }
                    }
                    found.sort_by(|a, b| compare_values(a, b).unwrap_or(std::cmp::Ordering::Equal));
                    found
                }
            };
            Axis { edge, parts }
        })
        .collect()
}

fn edge_value(plan: &QueryPlan, edge: &EdgeLayout, row: &[Value]) -> Value {
    plan.columns
        .iter()
        .find(|c| c.is_edge && c.index == edge.index_column)
        .map_or(Value::Null, |c| pull(c.pull, &row[edge.part_column]))
}

fn coordinate(
    plan: &QueryPlan,
    axis: &Axis,
    r: usize,
    row: &[Value],
) -> Result<usize, AssemblyError> {
    let out_of_range = |index: i64| AssemblyError::CoordinateOutOfRange {
        row: r,
        edge: axis.edge.name.clone(),
        index,
        size: axis.size(),
    };
    let index = if plan.shape == Shape::Cube {
        let index = row[axis.edge.index_column].as_i64().ok_or_else(|| {
            AssemblyError::UnexpectedCell {
                row: r,
                column: axis.edge.index_column,
                reason: "partition index is not an integer".to_string(),
            }
        })?;
        if index < 0 {
            return Err(out_of_range(index));
        }
        index as usize
    } else {
        let value = edge_value(plan, axis.edge, row);
        if value.is_null() {
            axis.parts.len()
        } else {
            axis.parts.iter().position(|p| *p == value).unwrap_or(axis.parts.len())
        }
    };
    if index >= axis.size() {
        return Err(out_of_range(index as i64));
    }
    Ok(index)
}

fn dense(dims: &[usize], fill: &Value) -> Value {
    match dims.split_first() {
        None => fill.clone(),
        Some((n, rest)) => Value::Array((0..*n).map(|_| dense(rest, fill)).collect()),
    }
}

/// Group-by and cube results.
pub fn coordinates(plan: &QueryPlan, rows: &[Vec<Value>]) -> Result<Value, AssemblyError> {
    let axes = axes_of(plan, rows);
    let mut cells = Vec::with_capacity(rows.len());
    for (r, row) in rows.iter().enumerate() {
        let coords = axes
            .iter()
            .map(|axis| coordinate(plan, axis, r, row))
            .collect::<Result<Vec<_>, _>>()?;
        cells.push((coords, select_values(plan, Some(row.as_slice()))));
    }

    Ok(match plan.format {
        Format::Cube => {
            let dims: Vec<usize> = axes.iter().map(Axis::size).collect();
            let mut data = Map::new();
            for name in &plan.select_names {
                let mut cube = dense(&dims, &select_value(plan, name, None));
                for (coords, values) in &cells {
                    let steps: Vec<Step> = coords.iter().map(|c| Step::Index(*c)).collect();
                    *slot(&mut cube, &steps) = values.get(name).cloned().unwrap_or(Value::Null);
                }
                data.insert(name.clone(), cube);
            }
            let edges: Vec<Value> = axes
                .iter()
                .map(|axis| {
                    json!({
                        "name": axis.edge.name,
                        "allowNulls": axis.edge.allow_nulls,
                        "domain": axis.edge.domain.describe(&axis.parts),
                    })
                })
                .collect();
            json!({"edges": edges, "data": data})
        }
        Format::List => Value::Array(
            cells
                .into_iter()
                .map(|(coords, values)| {
                    let mut record = Map::new();
                    for (axis, c) in axes.iter().zip(&coords) {
                        record.insert(axis.edge.name.clone(), axis.part(*c));
                    }
                    record.extend(values);
                    Value::Object(record)
                })
                .collect(),
        ),
        Format::Table => {
            let mut header: Vec<String> = axes.iter().map(|a| a.edge.name.clone()).collect();
            header.extend(plan.select_names.iter().cloned());
            let data: Vec<Value> = cells
                .into_iter()
                .map(|(coords, values)| {
                    let mut row: Vec<Value> = axes.iter().zip(&coords).map(|(a, c)| a.part(*c)).collect();
                    row.extend(values.into_iter().map(|(_, v)| v));
                    Value::Array(row)
                })
                .collect();
            json!({"header": header, "data": data})
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ColumnMapping, Pull};
    use crate::query::Domain;

    fn cube_plan(format: Format) -> QueryPlan {
        let mut count = ColumnMapping::new("count", 2, "", Pull::Number);
        count.empty = json!(0);
        QueryPlan {
            sql: String::new(),
            shape: Shape::Cube,
            format,
            select_names: vec!["count".into()],
            select_is_list: false,
            columns: vec![ColumnMapping::new("a", 0, "", Pull::Number).edge(), count],
            levels: vec![],
            edges: vec![EdgeLayout {
                name: "a".into(),
                domain: Domain::Set { partitions: vec![json!(1), json!(2), json!(3)] },
                partitions: Some(vec![json!(1), json!(2), json!(3)]),
                allow_nulls: false,
                index_column: 0,
                part_column: 1,
            }],
            width: 3,
        }
    }

    fn cube_rows() -> Vec<Vec<Value>> {
        vec![
            vec![json!(0), json!(1), json!(3)],
            vec![json!(1), json!(2), json!(1)],
            vec![json!(2), json!(3), json!(0)],
        ]
    }

    #[test]
    fn test_set_domain_cube() {
        let out = coordinates(&cube_plan(Format::Cube), &cube_rows()).unwrap();
        assert_eq!(out["data"], json!({"count": [3, 1, 0]}));
        assert_eq!(out["edges"][0]["domain"]["partitions"], json!([1, 2, 3]));
    }

    #[test]
    fn test_cube_as_list() {
        let out = coordinates(&cube_plan(Format::List), &cube_rows()).unwrap();
        assert_eq!(
            out,
            json!([{"a": 1, "count": 3}, {"a": 2, "count": 1}, {"a": 3, "count": 0}])
        );
    }

    #[test]
    fn test_coordinate_out_of_range() {
        let rows = vec![vec![json!(7), json!(1), json!(3)]];
        assert!(matches!(
            coordinates(&cube_plan(Format::Cube), &rows),
            Err(AssemblyError::CoordinateOutOfRange { index: 7, .. })
        ));
    }

    #[test]
    fn test_groupby_table_and_cube() {
        let mut plan = cube_plan(Format::Table);
        plan.shape = Shape::GroupBy;
        plan.columns = vec![
            ColumnMapping::new("k", 0, "", Pull::Text).edge(),
            ColumnMapping::new("count", 1, "", Pull::Number),
        ];
        plan.edges = vec![EdgeLayout {
            name: "k".into(),
            domain: Domain::Default { limit: None },
            partitions: None,
            allow_nulls: false,
            index_column: 0,
            part_column: 0,
        }];
        plan.width = 2;
        let rows = vec![vec![json!("x"), json!(2)], vec![json!("y"), json!(1)]];
        assert_eq!(
            coordinates(&plan, &rows).unwrap(),
            json!({"header": ["k", "count"], "data": [["x", 2], ["y", 1]]})
        );
        plan.format = Format::Cube;
        let out = coordinates(&plan, &rows).unwrap();
        assert_eq!(out["data"], json!({"count": [2, 1]}));
        assert_eq!(out["edges"][0]["domain"], json!({"type": "default", "partitions": ["x", "y"]}));
    }

    #[test]
    fn test_plain_aggregate() {
        let plan = QueryPlan {
            shape: Shape::Aggregate,
            format: Format::List,
            columns: vec![ColumnMapping::new("count", 0, "", Pull::Number)],
            edges: vec![],
            width: 1,
            ..cube_plan(Format::List)
        };
        assert_eq!(aggregate(&plan, Some(&vec![json!(7)])), json!({"count": 7}));
    }
}
