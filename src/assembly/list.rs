//! Rebuild nested records from the rows of a list plan.
//!
//! Rows arrive ordered so each base row is followed by its nested rows, parents before
//! children. A stack of open rows, one per nesting depth, gives every nested row the
//! element position it fills in each enclosing array.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{field_steps, pull, slot, AssemblyError, Step};
use crate::expressions::literal::values_equal;
use crate::planner::{Placement, QueryPlan, ID_COLUMN, LEVEL_COLUMN, PARENT_COLUMN};

struct Open {
    uid: Value,
    /// Position among the rows of its table under the same parent.
    ordinal: usize,
    /// Rows seen so far per child level.
    children: HashMap<usize, usize>,
}

pub fn records(plan: &QueryPlan, rows: &[Vec<Value>]) -> Result<Vec<Value>, AssemblyError> {
    let mut records: Vec<Value> = Vec::new();
    let mut open: Vec<Open> = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        let level = match row[LEVEL_COLUMN].as_u64() {
            Some(level) if (level as usize) < plan.levels.len() => level as usize,
            _ => {
                return Err(AssemblyError::UnexpectedCell {
                    row: r,
                    column: LEVEL_COLUMN,
                    reason: format!("`{}` is not a level of this plan", row[LEVEL_COLUMN]),
                })
            }
        };
        let depth = plan.levels[level].depth;

        if level == 0 {
            open.clear();
            open.push(Open {
                uid: row[ID_COLUMN].clone(),
                ordinal: records.len(),
                children: HashMap::new(),
            });
            records.push(if plan.select_is_list {
                Value::Object(Map::new())
            } else {
                Value::Null
            });
        } else {
            open.truncate(depth);
            let enclosing = if open.len() == depth { open.last_mut() } else { None };
            let parent = match enclosing {
                Some(parent) if values_equal(&parent.uid, &row[PARENT_COLUMN]) => parent,
                _ => {
                    return Err(AssemblyError::OrphanRow {
                        row: r,
                        level,
                        parent: row[PARENT_COLUMN].to_string(),
                    })
                }
            };
            let seen = parent.children.entry(level).or_insert(0);
            let ordinal = *seen;
            *seen += 1;
            open.push(Open {
                uid: row[ID_COLUMN].clone(),
                ordinal,
                children: HashMap::new(),
            });
        }

        let ordinals: Vec<usize> = open.iter().skip(1).map(|o| o.ordinal).collect();
        let Some(record) = records.last_mut() else {
            continue;
        };
        for (placement, bare) in &plan.levels[level].elements {
            let element = slot(record, &steps(placement, &ordinals));
            if !bare && element.is_null() {
                *element = Value::Object(Map::new());
            }
        }
        for column in plan.columns.iter().filter(|c| c.level == level) {
            let value = pull(column.pull, &row[column.index]);
            if value.is_null() {
                continue;
            }
            *slot(record, &steps(&column.placement, &ordinals)) = value;
        }
    }
    Ok(records)
}

/// Placement route to concrete steps, taking array positions from the open rows.
fn steps(placement: &[Placement], ordinals: &[usize]) -> Vec<Step> {
    let mut out = Vec::new();
    let mut element = 0;
    for step in placement {
        match step {
            Placement::Field(path) => out.extend(field_steps(path)),
            Placement::Element { unwrap } => {
                if !unwrap {
                    out.push(Step::Index(ordinals.get(element).copied().unwrap_or(0)));
                }
                element += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ColumnMapping, Level, Pull};
    use crate::query::{Format, Shape};
    use serde_json::json;

    fn field(p: &str) -> Placement {
        Placement::Field(p.to_string())
    }

    /// Plan for `select: ["a", "b.c"]` over `t` with nested `b`.
    fn plan() -> QueryPlan {
        let mut a = ColumnMapping::new("a", 6, "", Pull::Number);
        a.placement = vec![field("a")];
        let mut c = ColumnMapping::new("b.c", 7, "", Pull::Number).with_sub_path("c");
        c.level = 1;
        c.placement = vec![field("b"), Placement::Element { unwrap: false }, field("c")];
        QueryPlan {
            sql: String::new(),
            shape: Shape::List,
            format: Format::List,
            select_names: vec!["a".into(), "b.c".into()],
            select_is_list: true,
            columns: vec![a, c],
            levels: vec![
                Level { query_path: ".".into(), depth: 0, elements: vec![] },
                Level {
                    query_path: "b".into(),
                    depth: 1,
                    elements: vec![(vec![field("b"), Placement::Element { unwrap: false }], false)],
                },
            ],
            edges: vec![],
            width: 8,
        }
    }

    #[test]
    fn test_nested_records() {
        let rows = vec![
            vec![json!(0), json!(1), json!(1), Value::Null, Value::Null, Value::Null, json!(1), Value::Null],
            vec![json!(1), json!(1), json!(1), json!(1), json!(1), json!(0), Value::Null, json!(10)],
            vec![json!(1), json!(1), json!(2), json!(1), json!(1), json!(1), Value::Null, json!(20)],
            vec![json!(0), json!(2), json!(2), Value::Null, Value::Null, Value::Null, json!(2), Value::Null],
        ];
        assert_eq!(
            records(&plan(), &rows).unwrap(),
            vec![json!({"a": 1, "b": [{"c": 10}, {"c": 20}]}), json!({"a": 2})]
        );
    }

    #[test]
    fn test_filtered_elements_are_compacted() {
        let rows = vec![
            vec![json!(0), json!(1), json!(1), Value::Null, Value::Null, Value::Null, json!(1), Value::Null],
            vec![json!(1), json!(1), json!(2), json!(1), json!(1), json!(1), Value::Null, json!(20)],
        ];
        assert_eq!(records(&plan(), &rows).unwrap(), vec![json!({"a": 1, "b": [{"c": 20}]})]);
    }

    #[test]
    fn test_orphan_row() {
        let rows = vec![
            vec![json!(0), json!(1), json!(1), Value::Null, Value::Null, Value::Null, json!(1), Value::Null],
            vec![json!(1), json!(1), json!(5), json!(9), json!(1), json!(0), Value::Null, json!(10)],
        ];
        assert!(matches!(records(&plan(), &rows), Err(AssemblyError::OrphanRow { .. })));
    }
}
