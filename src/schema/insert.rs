//! Document insertion: schema evolution followed by row generation.
//!
//! Evolution runs over the whole batch first, so a nest promotion triggered by a late
//! document also governs how earlier documents of the same batch are stored.

use std::collections::BTreeMap;

use log::{debug, info};
use serde_json::Value;

use super::column::{es_column_name, is_reserved, Column, ORDER, PARENT, UID};
use super::errors::SchemaError;
use super::snowflake::{Snowflake, SnowflakeState, TableInfo};
use crate::expressions::literal::is_null_value;
use crate::jx_type::{JsonType, JxType};
use crate::utils::field_path::{concat_field, escape_key, startswith_field};
use crate::utils::sql_quote::{quote_column, quote_value};

const ROWS_PER_STATEMENT: usize = 500;

/// Statements that bring storage in line with the evolved schema, then store the batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertPlan {
    pub ddl: Vec<String>,
    pub inserts: Vec<String>,
    pub documents: usize,
}

impl InsertPlan {
    /// DDL first, then inserts in parent-before-child order.
    pub fn statements(&self) -> impl Iterator<Item = &String> {
        self.ddl.iter().chain(self.inserts.iter())
    }
}

impl Snowflake {
    pub fn insert(&self, documents: &[Value]) -> Result<InsertPlan, SchemaError> {
        let _guard = self.lock_evolution();
        let mut evolution = Evolution {
            snowflake: self,
            state: (*self.snapshot()).clone(),
            ddl: Vec::new(),
        };
        evolution.ensure_root();
        for (i, doc) in documents.iter().enumerate() {
            if !doc.is_object() {
                return Err(SchemaError::conflict_with_context(
                    ".",
                    "document is not an object",
                    format!("insert into `{}`, document {}", self.table_name("."), i),
                ));
            }
            evolution.scan(doc, ".", ".")?;
        }

        let Evolution { state, ddl, .. } = evolution;
        let mut rows = RowWriter {
            state,
            rows: BTreeMap::new(),
        };
        for doc in documents {
            rows.emit_document(doc)?;
        }
        let inserts = rows.statements(self);
        debug!(
            "Insert into `{}`: {} documents, {} DDL, {} INSERT statements",
            self.table_name("."),
            documents.len(),
            ddl.len(),
            inserts.len()
        );
        self.publish(rows.state);
        Ok(InsertPlan {
            ddl,
            inserts,
            documents: documents.len(),
        })
    }
}

struct Evolution<'a> {
    snowflake: &'a Snowflake,
    state: SnowflakeState,
    ddl: Vec<String>,
}

impl Evolution<'_> {
    fn ensure_root(&mut self) {
        if self.state.tables.contains_key(".") {
            return;
        }
        let name = self.snowflake.table_name(".");
        self.ddl.push(format!(
            "CREATE TABLE {} ({} INTEGER PRIMARY KEY)",
            quote_column(&name),
            quote_column(UID)
        ));
        info!("Created fact table `{}`", name);
        self.state.tables.insert(
            ".".to_string(),
            TableInfo {
                query_path: ".".to_string(),
                name,
                nested_path: vec![".".to_string()],
                next_uid: 1,
                multi: 1,
            },
        );
    }

    fn scan(&mut self, value: &Value, name: &str, query_path: &str) -> Result<(), SchemaError> {
        if is_null_value(value) {
            return Ok(());
        }
        // a single value written where an array is stored counts as a one-element array
        if name != query_path && self.state.tables.contains_key(name) && !value.is_array() {
            return self.scan_array(std::slice::from_ref(value), name, query_path);
        }
        match value {
            Value::Object(map) => {
                for (key, item) in map {
                    check_key(key, name)?;
                    self.scan(item, &concat_field(name, &escape_key(key)), query_path)?;
                }
                Ok(())
            }
            Value::Array(items) => self.scan_array(items, name, query_path),
            primitive => self.ensure_column(name, query_path, JsonType::of_value(primitive)),
        }
    }

    fn scan_array(&mut self, items: &[Value], name: &str, query_path: &str) -> Result<(), SchemaError> {
        let items: Vec<&Value> = items.iter().filter(|v| !is_null_value(v)).collect();
        if items.iter().any(|v| v.is_array()) {
            return Err(SchemaError::UnsupportedNesting {
                path: name.to_string(),
                reason: "arrays of arrays cannot be stored".to_string(),
            });
        }
        if items.is_empty() {
            return Ok(());
        }
        if name == query_path {
            return Err(SchemaError::UnsupportedNesting {
                path: name.to_string(),
                reason: "array element is itself an array".to_string(),
            });
        }
        self.ensure_table(name, query_path)?;
        self.state.set_multi(name, items.len());
        for item in items {
            self.scan(item, name, name)?;
        }
        Ok(())
    }

    fn ensure_table(&mut self, query_path: &str, parent_path: &str) -> Result<(), SchemaError> {
        if self.state.tables.contains_key(query_path) {
            return Ok(());
        }
        if self.state.attach(query_path) {
            return Ok(());
        }
        let parent = self
            .state
            .tables
            .get(parent_path)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTable {
                fact: self.snowflake.table_name("."),
                path: parent_path.to_string(),
            })?;
        if let Some(deeper) = self
            .state
            .tables
            .keys()
            .find(|qp| *qp != query_path && startswith_field(qp, query_path))
        {
            return Err(SchemaError::Conflict {
                path: query_path.to_string(),
                reason: format!("an array here would enclose the existing nested path `{}`", deeper),
            });
        }

        let mut nested_path = vec![query_path.to_string()];
        nested_path.extend(parent.nested_path.iter().cloned());
        let depth = nested_path.len() - 1;
        let max = self.snowflake.max_nesting_depth();
        if depth > max {
            return Err(SchemaError::TooDeep {
                path: query_path.to_string(),
                depth,
                max,
            });
        }

        let name = self.snowflake.table_name(query_path);
        self.ddl.push(format!(
            "CREATE TABLE {} ({} INTEGER PRIMARY KEY, {} INTEGER NOT NULL, {} INTEGER NOT NULL)",
            quote_column(&name),
            quote_column(UID),
            quote_column(PARENT),
            quote_column(ORDER)
        ));
        info!("Created nested table `{}`", name);
        self.state.tables.insert(
            query_path.to_string(),
            TableInfo {
                query_path: query_path.to_string(),
                name,
                nested_path,
                next_uid: 1,
                multi: 0,
            },
        );
        self.promote(query_path, &parent)
    }

    /// Move the parent's columns under `query_path` into the new child table, one element
    /// per parent row.
    fn promote(&mut self, query_path: &str, parent: &TableInfo) -> Result<(), SchemaError> {
        let moving: Vec<Column> = self
            .state
            .columns
            .iter()
            .filter(|c| {
                !c.hidden
                    && c.query_path() == parent.query_path
                    && startswith_field(&c.name, query_path)
            })
            .cloned()
            .collect();
        if moving.is_empty() {
            return Ok(());
        }

        let mut targets = Vec::with_capacity(moving.len());
        for old in &moving {
            self.ensure_column(&old.name, query_path, old.json_type)?;
            let new_column = es_column_name(&old.name, query_path, old.json_type);
            targets.push((quote_column(&old.es_column), quote_column(&new_column)));
        }
        let child_name = self.snowflake.table_name(query_path);
        let new_columns: Vec<&str> = targets.iter().map(|(_, new)| new.as_str()).collect();
        let old_columns: Vec<&str> = targets.iter().map(|(old, _)| old.as_str()).collect();
        let present: Vec<String> = old_columns
            .iter()
            .map(|c| format!("{} IS NOT NULL", c))
            .collect();
        self.ddl.push(format!(
            "INSERT INTO {child} ({uid}, {parent_col}, {order}, {new}) SELECT {uid}, {uid}, 0, {old} FROM {parent} WHERE {present}",
            child = quote_column(&child_name),
            uid = quote_column(UID),
            parent_col = quote_column(PARENT),
            order = quote_column(ORDER),
            new = new_columns.join(", "),
            old = old_columns.join(", "),
            parent = quote_column(&parent.name),
            present = present.join(" OR "),
        ));

        for column in self.state.columns.iter_mut() {
            if moving.iter().any(|m| m.es_column == column.es_column && m.es_index == column.es_index) {
                column.hidden = true;
            }
        }
        let parent_next = self
            .state
            .tables
            .get(&parent.query_path)
            .map(|t| t.next_uid)
            .unwrap_or(1);
        if let Some(child) = self.state.tables.get_mut(query_path) {
            child.next_uid = child.next_uid.max(parent_next);
        }
        self.state.set_multi(query_path, 1);
        info!(
            "Nested `{}` into its own table ({} columns moved out of `{}`)",
            query_path,
            moving.len(),
            parent.name
        );
        Ok(())
    }

    fn ensure_column(&mut self, name: &str, query_path: &str, json_type: JsonType) -> Result<(), SchemaError> {
        if json_type == JsonType::IsNull {
            return Ok(());
        }
        let existing = self.state.columns.iter_mut().find(|c| {
            !c.hidden
                && c.name == name
                && c.query_path() == query_path
                && c.json_type.type_key() == json_type.type_key()
        });
        if let Some(column) = existing {
            if let JxType::Primitive(widened) = JxType::from(column.json_type) | JxType::from(json_type) {
                if widened != column.json_type {
                    info!("Widened `{}` from {} to {}", name, column.json_type, widened);
                    column.json_type = widened;
                }
            }
            return Ok(());
        }

        let table = self
            .state
            .tables
            .get(query_path)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTable {
                fact: self.snowflake.table_name("."),
                path: query_path.to_string(),
            })?;
        let es_column = es_column_name(name, query_path, json_type);
        if self
            .state
            .columns
            .iter()
            .any(|c| c.es_index == table.name && c.es_column == es_column)
        {
            return Err(SchemaError::Conflict {
                path: name.to_string(),
                reason: format!("physical column `{}` of `{}` is retired", es_column, table.name),
            });
        }
        self.ddl.push(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_column(&table.name),
            quote_column(&es_column),
            json_type.sql_type()
        ));
        info!("Added column `{}` ({}) to `{}`", name, json_type, table.name);
        self.state.columns.push(Column {
            name: name.to_string(),
            es_column,
            es_index: table.name.clone(),
            json_type,
            nested_path: table.nested_path.clone(),
            multi: table.multi.max(1),
            hidden: false,
        });
        Ok(())
    }
}

fn check_key(key: &str, parent: &str) -> Result<(), SchemaError> {
    if is_reserved(key) {
        return Err(SchemaError::ReservedName {
            name: concat_field(parent, key),
        });
    }
    if key.starts_with('$') {
        return Err(SchemaError::ReservedName {
            name: concat_field(parent, key),
        });
    }
    Ok(())
}

type Row = Vec<(String, String)>;

struct RowWriter {
    state: SnowflakeState,
    rows: BTreeMap<String, Vec<Row>>,
}

impl RowWriter {
    fn next_uid(&mut self, query_path: &str) -> i64 {
        match self.state.tables.get_mut(query_path) {
            Some(table) => {
                let uid = table.next_uid;
                table.next_uid += 1;
                uid
            }
            None => 0,
        }
    }

    fn emit_document(&mut self, doc: &Value) -> Result<(), SchemaError> {
        let uid = self.next_uid(".");
        let mut row: Row = vec![(UID.to_string(), uid.to_string())];
        self.fill(doc, ".", ".", &mut row, uid)?;
        self.rows.entry(".".to_string()).or_default().push(row);
        Ok(())
    }

    fn fill(
        &mut self,
        value: &Value,
        name: &str,
        query_path: &str,
        row: &mut Row,
        uid: i64,
    ) -> Result<(), SchemaError> {
        if is_null_value(value) {
            return Ok(());
        }
        if name != query_path && self.state.tables.contains_key(name) {
            let items: Vec<&Value> = match value {
                Value::Array(items) => items.iter().filter(|v| !is_null_value(v)).collect(),
                single => vec![single],
            };
            for (order, item) in items.into_iter().enumerate() {
                let child_uid = self.next_uid(name);
                let mut child: Row = vec![
                    (UID.to_string(), child_uid.to_string()),
                    (PARENT.to_string(), uid.to_string()),
                    (ORDER.to_string(), order.to_string()),
                ];
                self.fill(item, name, name, &mut child, child_uid)?;
                self.rows.entry(name.to_string()).or_default().push(child);
            }
            return Ok(());
        }
        match value {
            Value::Object(map) => {
                for (key, item) in map {
                    self.fill(item, &concat_field(name, &escape_key(key)), query_path, row, uid)?;
                }
                Ok(())
            }
            Value::Array(_) => Err(SchemaError::UnsupportedNesting {
                path: name.to_string(),
                reason: "array element is itself an array".to_string(),
            }),
            primitive => {
                let json_type = JsonType::of_value(primitive);
                let column = self
                    .state
                    .columns
                    .iter()
                    .find(|c| {
                        !c.hidden
                            && c.name == name
                            && c.query_path() == query_path
                            && c.json_type.type_key() == json_type.type_key()
                    })
                    .ok_or_else(|| SchemaError::Conflict {
                        path: name.to_string(),
                        reason: format!("no {} column at `{}`", json_type, query_path),
                    })?;
                row.push((column.es_column.clone(), quote_value(primitive)));
                Ok(())
            }
        }
    }

    /// One multi-row INSERT per table (chunked), parents before children.
    fn statements(&self, snowflake: &Snowflake) -> Vec<String> {
        let mut paths: Vec<&TableInfo> = self
            .state
            .tables
            .values()
            .filter(|t| self.rows.contains_key(&t.query_path))
            .collect();
        paths.sort_by(|a, b| a.depth().cmp(&b.depth()).then_with(|| a.query_path.cmp(&b.query_path)));

        let mut out = Vec::new();
        for table in paths {
            let Some(rows) = self.rows.get(&table.query_path) else {
                continue;
            };
            let mut columns: Vec<String> = Vec::new();
            for row in rows {
                for (column, _) in row {
                    if !columns.contains(column) {
                        columns.push(column.clone());
                    }
                }
            }
            let header: Vec<String> = columns.iter().map(|c| quote_column(c)).collect();
            for chunk in rows.chunks(ROWS_PER_STATEMENT) {
                let values: Vec<String> = chunk
                    .iter()
                    .map(|row| {
                        let cells: Vec<&str> = columns
                            .iter()
                            .map(|c| {
                                row.iter()
                                    .find(|(name, _)| name == c)
                                    .map(|(_, v)| v.as_str())
                                    .unwrap_or("NULL")
                            })
                            .collect();
                        format!("({})", cells.join(", "))
                    })
                    .collect();
                out.push(format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    quote_column(&snowflake.table_name(&table.query_path)),
                    header.join(", "),
                    values.join(", ")
                ));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    #[test]
    fn test_first_insert_creates_tables_and_columns() {
        let snowflake = Snowflake::new("t");
        let plan = snowflake
            .insert(&[json!({"a": 1, "b": [{"c": 10}, {"c": 20}]}), json!({"a": 2, "b": []})])
            .unwrap();
        assert_eq!(plan.documents, 2);
        assert!(plan.ddl[0].starts_with("CREATE TABLE \"t\""));
        assert!(plan.ddl.iter().any(|s| s.starts_with("CREATE TABLE \"t.b\"")));
        assert_eq!(snowflake.query_paths(), vec!["b".to_string(), ".".to_string()]);

        let c = snowflake.leaves("b.c");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].es_column, "c.$number");
        assert_eq!(c[0].nested_path, vec!["b".to_string(), ".".to_string()]);
        assert_eq!(c[0].multi, 2);

        assert_eq!(
            plan.inserts[1],
            "INSERT INTO \"t.b\" (\"__id__\", \"__parent__\", \"__order__\", \"c.$number\") VALUES (1, 1, 0, 10), (2, 1, 1, 20)"
        );
    }

    #[test]
    fn test_type_widening_and_second_type() {
        let snowflake = Snowflake::new("t");
        snowflake.insert(&[json!({"a": 1})]).unwrap();
        let plan = snowflake.insert(&[json!({"a": 1.5}), json!({"a": "x"})]).unwrap();
        let columns = snowflake.leaves("a");
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].json_type, JsonType::Number);
        assert_eq!(columns[1].es_column, "a.$string");
        assert_eq!(plan.ddl.len(), 1);
    }

    #[test]
    fn test_nest_promotion_moves_existing_values() {
        let snowflake = Snowflake::new("t");
        snowflake.insert(&[json!({"b": {"c": 1}})]).unwrap();
        let plan = snowflake.insert(&[json!({"b": [{"c": 2}, {"c": 3}]})]).unwrap();
        assert!(plan
            .ddl
            .iter()
            .any(|s| s.contains("SELECT \"__id__\", \"__id__\", 0, \"b.c.$number\" FROM \"t\"")));
        let c = snowflake.leaves("b.c");
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].es_index, "t.b");
        // the copied row took uid 1; new rows continue after the parent's uids
        assert!(plan.inserts.iter().any(|s| s.contains("(2, 2, 0, 2), (3, 2, 1, 3)")));
    }

    #[test]
    fn test_scalar_at_nested_path_is_one_element_array() {
        let snowflake = Snowflake::new("t");
        snowflake.insert(&[json!({"b": [1, 2]})]).unwrap();
        let plan = snowflake.insert(&[json!({"b": 3})]).unwrap();
        assert!(plan.ddl.is_empty());
        assert!(plan.inserts.iter().any(|s| s.contains("\"$number\") VALUES (3, 2, 0, 3)")));
    }

    #[test]
    fn test_rejected_documents() {
        let snowflake = Snowflake::new("t");
        assert!(matches!(
            snowflake.insert(&[json!({"a": [[1, 2]]})]),
            Err(SchemaError::UnsupportedNesting { .. })
        ));
        assert!(matches!(
            snowflake.insert(&[json!({"__id__": 1})]),
            Err(SchemaError::ReservedName { .. })
        ));
        assert!(matches!(
            snowflake.insert(&[json!([1, 2])]),
            Err(SchemaError::Conflict { .. })
        ));
        let shallow = Snowflake::new("s").with_max_nesting_depth(1);
        assert!(matches!(
            shallow.insert(&[json!({"a": [{"b": [1]}]})]),
            Err(SchemaError::TooDeep { depth: 2, max: 1, .. })
        ));
        // failed inserts leave no tables behind
        assert!(shallow.query_paths().is_empty());
    }
}
