//! The snowflake: every physical table of one fact.
//!
//! Readers work against an immutable snapshot (`Arc<SnowflakeState>`) taken under a short
//! read lock. Evolution (insert, lazy attach) is serialized by a per-snowflake mutex,
//! builds a new state from a clone, and publishes it when complete.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use log::info;

use super::column::Column;
use super::errors::SchemaError;
use super::Schema;
use crate::utils::field_path::startswith_field;

pub const DEFAULT_MAX_NESTING_DEPTH: usize = 8;

/// One physical table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    /// Logical path of the array this table stores; `"."` for the fact table.
    pub query_path: String,
    pub name: String,
    /// This table's path and its ancestors' paths, deepest first, ending in `"."`.
    pub nested_path: Vec<String>,
    pub next_uid: i64,
    /// Largest array stored in this table so far.
    pub multi: usize,
}

impl TableInfo {
    pub fn depth(&self) -> usize {
        self.nested_path.len().saturating_sub(1)
    }

    /// Query path of the enclosing table; `None` for the fact table.
    pub fn parent(&self) -> Option<&str> {
        self.nested_path.get(1).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SnowflakeState {
    pub(crate) tables: BTreeMap<String, TableInfo>,
    /// Tables known to storage that no query has needed yet.
    pub(crate) detached: BTreeMap<String, (TableInfo, Vec<Column>)>,
    pub(crate) columns: Vec<Column>,
}

impl SnowflakeState {
    pub(crate) fn set_multi(&mut self, query_path: &str, multi: usize) {
        if let Some(table) = self.tables.get_mut(query_path) {
            if multi <= table.multi {
                return;
            }
            table.multi = multi;
        }
        for column in self.columns.iter_mut().filter(|c| c.query_path() == query_path) {
            column.multi = multi;
        }
    }

    pub(crate) fn attach(&mut self, query_path: &str) -> bool {
        match self.detached.remove(query_path) {
            Some((table, columns)) => {
                self.tables.insert(query_path.to_string(), table);
                self.columns.extend(columns);
                true
            }
            None => false,
        }
    }

    fn visible(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.hidden)
    }
}

pub struct Snowflake {
    fact: String,
    max_nesting_depth: usize,
    snapshot: RwLock<Arc<SnowflakeState>>,
    evolution: Mutex<()>,
}

impl std::fmt::Debug for Snowflake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snowflake")
            .field("fact", &self.fact)
            .field("query_paths", &self.query_paths())
            .finish()
    }
}

impl Snowflake {
    /// A fact with no tables yet; the first insert creates them.
    pub fn new(fact: impl Into<String>) -> Self {
        Snowflake::with_state(fact.into(), SnowflakeState::default())
    }

    pub(crate) fn with_state(fact: String, state: SnowflakeState) -> Self {
        Snowflake {
            fact,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            snapshot: RwLock::new(Arc::new(state)),
            evolution: Mutex::new(()),
        }
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    pub fn max_nesting_depth(&self) -> usize {
        self.max_nesting_depth
    }

    /// Physical table name for a query path.
    pub fn table_name(&self, query_path: &str) -> String {
        if query_path == "." {
            self.fact.clone()
        } else {
            format!("{}.{}", self.fact, query_path)
        }
    }

    pub fn snapshot(&self) -> Arc<SnowflakeState> {
        self.snapshot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub(crate) fn lock_evolution(&self) -> MutexGuard<'_, ()> {
        self.evolution
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn publish(&self, state: SnowflakeState) {
        let mut current = self
            .snapshot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::new(state);
    }

    /// Attach every detached table overlapping `path` (above or below it).
    fn attach_overlapping(&self, path: &str) {
        let snapshot = self.snapshot();
        let wanted: Vec<String> = snapshot
            .detached
            .keys()
            .filter(|qp| startswith_field(qp, path) || startswith_field(path, qp))
            .cloned()
            .collect();
        if wanted.is_empty() {
            return;
        }
        let _guard = self.lock_evolution();
        let mut state = (*self.snapshot()).clone();
        for query_path in &wanted {
            if state.attach(query_path) {
                info!("Attached table `{}` of fact `{}`", query_path, self.fact);
            }
        }
        self.publish(state);
    }
}

impl Schema for Snowflake {
    fn fact(&self) -> &str {
        &self.fact
    }

    fn query_paths(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut tables: Vec<&TableInfo> = snapshot.tables.values().collect();
        tables.sort_by(|a, b| {
            b.depth()
                .cmp(&a.depth())
                .then_with(|| a.query_path.cmp(&b.query_path))
        });
        tables.iter().map(|t| t.query_path.clone()).collect()
    }

    fn columns(&self) -> Vec<Column> {
        self.snapshot().visible().cloned().collect()
    }

    fn leaves(&self, prefix: &str) -> Vec<Column> {
        self.attach_overlapping(prefix);
        let snapshot = self.snapshot();
        let mut out: Vec<Column> = snapshot
            .visible()
            .filter(|c| startswith_field(&c.name, prefix))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.es_column.cmp(&b.es_column)));
        out
    }

    fn split_values(&self, var: &str) -> Vec<(String, Vec<Column>)> {
        let mut groups: BTreeMap<(std::cmp::Reverse<usize>, String), Vec<Column>> = BTreeMap::new();
        for column in self.leaves(var) {
            groups
                .entry((std::cmp::Reverse(column.depth()), column.query_path().to_string()))
                .or_default()
                .push(column);
        }
        groups
            .into_iter()
            .map(|((_, query_path), columns)| (query_path, columns))
            .collect()
    }

    fn get_table(&self, query_path: &str) -> Result<TableInfo, SchemaError> {
        if let Some(table) = self.snapshot().tables.get(query_path) {
            return Ok(table.clone());
        }
        self.attach_overlapping(query_path);
        self.snapshot()
            .tables
            .get(query_path)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownTable {
                fact: self.fact.clone(),
                path: query_path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_values_deepest_first() {
        let snowflake = Snowflake::new("t");
        snowflake
            .insert(&[json!({"a": 1, "b": [{"c": 10, "d": [{"e": 1}, {"e": "x"}]}]})])
            .unwrap();
        let groups = snowflake.split_values(".");
        let paths: Vec<&str> = groups.iter().map(|(qp, _)| qp.as_str()).collect();
        assert_eq!(paths, vec!["b.d", "b", "."]);
        assert_eq!(groups[0].1.len(), 2);
        assert!(groups[0].1.iter().all(|c| c.name == "b.d.e"));

        let groups = snowflake.split_values("b.c");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, "b");
        assert!(snowflake.split_values("nope").is_empty());
    }
}
