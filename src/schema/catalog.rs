//! Serialized form of a snowflake, for rebuilding the model against existing storage.
//!
//! ```yaml
//! fact: orders
//! query_paths: [".", "lines"]
//! tables:
//!   - nested_path: ["."]
//!     next_uid: 3
//!     columns:
//!       - { name: customer, es_column: customer.$string, json_type: string }
//!   - nested_path: ["lines", "."]
//!     next_uid: 5
//!     multi: 3
//!     columns:
//!       - { name: lines.qty, es_column: qty.$number, json_type: integer }
//! ```
//!
//! Tables missing from `query_paths` exist in storage but are attached only when a query
//! first reaches them.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::errors::SchemaError;
use super::snowflake::{Snowflake, SnowflakeState, TableInfo};
use crate::jx_type::JsonType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnowflakeCatalog {
    pub fact: String,
    #[serde(default)]
    pub query_paths: Vec<String>,
    pub tables: Vec<TableCatalog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCatalog {
    /// Deepest first, ending in `"."`.
    pub nested_path: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "first_uid")]
    pub next_uid: i64,
    #[serde(default = "single")]
    pub multi: usize,
    #[serde(default)]
    pub columns: Vec<ColumnCatalog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCatalog {
    pub name: String,
    pub es_column: String,
    pub json_type: JsonType,
    #[serde(default)]
    pub hidden: bool,
}

fn first_uid() -> i64 {
    1
}

fn single() -> usize {
    1
}

impl SnowflakeCatalog {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            SchemaError::catalog(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(yaml).map_err(|e| SchemaError::catalog(e.to_string()))
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value).map_err(|e| SchemaError::catalog(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, SchemaError> {
        serde_yaml::to_string(self).map_err(|e| SchemaError::catalog(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.fact.is_empty() {
            return Err(SchemaError::catalog("fact name is empty"));
        }
        let mut seen = std::collections::HashSet::new();
        let mut has_root = false;
        for table in &self.tables {
            match table.nested_path.last() {
                Some(root) if root == "." => {}
                _ => {
                    return Err(SchemaError::catalog(format!(
                        "nested path {:?} does not end at the fact table",
                        table.nested_path
                    )))
                }
            }
            let query_path = &table.nested_path[0];
            if query_path == "." {
                has_root = true;
            }
            if !seen.insert(query_path.clone()) {
                return Err(SchemaError::catalog(format!(
                    "table `{}` is listed twice",
                    query_path
                )));
            }
        }
        if !has_root {
            return Err(SchemaError::catalog("no fact table (nested path `.`)"));
        }
        for table in &self.tables {
            for ancestor in table.nested_path.iter().skip(1) {
                if !seen.contains(ancestor) {
                    return Err(SchemaError::catalog(format!(
                        "table `{}` refers to unknown ancestor `{}`",
                        table.nested_path[0], ancestor
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Snowflake {
    pub fn from_catalog(catalog: SnowflakeCatalog) -> Result<Snowflake, SchemaError> {
        catalog.validate()?;
        let snowflake = Snowflake::new(catalog.fact.clone());
        let mut state = SnowflakeState::default();
        for table in catalog.tables {
            let query_path = table.nested_path[0].clone();
            let name = table
                .name
                .clone()
                .unwrap_or_else(|| snowflake.table_name(&query_path));
            let multi = if query_path == "." { 1 } else { table.multi };
            let columns: Vec<Column> = table
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    es_column: c.es_column.clone(),
                    es_index: name.clone(),
                    json_type: c.json_type,
                    nested_path: table.nested_path.clone(),
                    multi,
                    hidden: c.hidden,
                })
                .collect();
            let info = TableInfo {
                query_path: query_path.clone(),
                name,
                nested_path: table.nested_path,
                next_uid: table.next_uid,
                multi,
            };
            // the fact table is always attached
            if query_path == "." || catalog.query_paths.contains(&query_path) {
                state.tables.insert(query_path, info);
                state.columns.extend(columns);
            } else {
                state.detached.insert(query_path, (info, columns));
            }
        }
        Ok(Snowflake::with_state(catalog.fact, state))
    }

    /// Catalog of every table, attached or not.
    pub fn to_catalog(&self) -> SnowflakeCatalog {
        let state = self.snapshot();
        let mut tables: Vec<(&TableInfo, Vec<&Column>)> = state
            .tables
            .values()
            .map(|t| {
                let columns = state
                    .columns
                    .iter()
                    .filter(|c| c.es_index == t.name)
                    .collect();
                (t, columns)
            })
            .collect();
        tables.extend(
            state
                .detached
                .values()
                .map(|(t, columns)| (t, columns.iter().collect())),
        );
        tables.sort_by(|a, b| {
            a.0.depth()
                .cmp(&b.0.depth())
                .then_with(|| a.0.query_path.cmp(&b.0.query_path))
        });

        let mut query_paths: Vec<String> = state.tables.keys().cloned().collect();
        query_paths.sort_by_key(|qp| crate::utils::field_path::pre_order_key(qp));

        SnowflakeCatalog {
            fact: self.table_name("."),
            query_paths,
            tables: tables
                .into_iter()
                .map(|(t, columns)| TableCatalog {
                    nested_path: t.nested_path.clone(),
                    name: Some(t.name.clone()),
                    next_uid: t.next_uid,
                    multi: t.multi,
                    columns: columns
                        .into_iter()
                        .map(|c| ColumnCatalog {
                            name: c.name.clone(),
                            es_column: c.es_column.clone(),
                            json_type: c.json_type,
                            hidden: c.hidden,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    const ORDERS: &str = r#"
fact: orders
query_paths: ["."]
tables:
  - nested_path: ["."]
    next_uid: 3
    columns:
      - { name: customer, es_column: customer.$string, json_type: string }
  - nested_path: ["lines", "."]
    next_uid: 5
    multi: 3
    columns:
      - { name: lines.qty, es_column: qty.$number, json_type: integer }
"#;

    #[test]
    fn test_detached_table_attaches_on_demand() {
        let catalog = SnowflakeCatalog::from_yaml_str(ORDERS).unwrap();
        let snowflake = Snowflake::from_catalog(catalog).unwrap();
        assert_eq!(snowflake.query_paths(), vec![".".to_string()]);

        let table = snowflake.get_table("lines").unwrap();
        assert_eq!(table.name, "orders.lines");
        assert_eq!(table.multi, 3);
        assert_eq!(snowflake.query_paths(), vec!["lines".to_string(), ".".to_string()]);
        assert_eq!(snowflake.leaves("lines.qty")[0].es_index, "orders.lines");
    }

    #[test]
    fn test_wildcard_leaves_attach_everything() {
        let snowflake = Snowflake::from_catalog(SnowflakeCatalog::from_yaml_str(ORDERS).unwrap()).unwrap();
        let names: Vec<String> = snowflake.leaves(".").into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["customer".to_string(), "lines.qty".to_string()]);
    }

    #[test]
    fn test_catalog_after_insert_reloads() {
        let snowflake = Snowflake::new("t");
        snowflake
            .insert(&[json!({"a": 1, "b": [{"c": "x"}]})])
            .unwrap();
        let yaml = snowflake.to_catalog().to_yaml().unwrap();
        let reloaded = Snowflake::from_catalog(SnowflakeCatalog::from_yaml_str(&yaml).unwrap()).unwrap();
        assert_eq!(reloaded.query_paths(), snowflake.query_paths());
        assert_eq!(reloaded.columns(), snowflake.columns());
        // new rows continue after the stored ones
        let plan = reloaded.insert(&[json!({"a": 2})]).unwrap();
        assert!(plan.inserts[0].contains("VALUES (2, 2)"));
    }

    #[test]
    fn test_invalid_catalogs() {
        let no_root = json!({"fact": "t", "tables": [{"nested_path": ["b", "."]}]});
        assert!(matches!(
            SnowflakeCatalog::from_json(no_root).unwrap().validate(),
            Err(SchemaError::Catalog { .. })
        ));
        let bad_path = json!({"fact": "t", "tables": [{"nested_path": ["."]}, {"nested_path": ["b"]}]});
        assert!(Snowflake::from_catalog(SnowflakeCatalog::from_json(bad_path).unwrap()).is_err());
    }
}
