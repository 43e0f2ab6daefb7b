//! Per-output-column descriptors: where a result cell lands in the reassembled document.

use serde::Serialize;
use serde_json::Value;

use crate::jx_type::JsonType;

/// How a raw SQLite cell becomes a JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pull {
    /// Text as is; the empty string is missing.
    Text,
    /// Whole numbers come back as integers.
    Number,
    /// SQLite stores booleans as 0/1.
    Boolean,
    /// Square root of the cell (standard deviation from variance).
    Sqrt,
    /// Whatever the cell holds.
    Raw,
}

impl Pull {
    pub fn for_type(json_type: JsonType) -> Pull {
        match json_type {
            JsonType::Boolean => Pull::Boolean,
            JsonType::String => Pull::Text,
            JsonType::IsNull => Pull::Raw,
            _ => Pull::Number,
        }
    }
}

/// One step from a record down to where a nested value lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    /// Descend into a field (a dotted path; `"."` stays put).
    Field(String),
    /// Descend into the element of the current row at this nesting level. Tables that
    /// never held more than one element are unwrapped.
    Element { unwrap: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMapping {
    /// Select (or edge) name this column contributes to.
    pub name: String,
    /// Path inside that select's value; `"."` when the column is the whole value.
    pub sub_path: String,
    /// Position in the result row.
    pub index: usize,
    pub pull: Pull,
    pub sql: String,
    /// Tables from this column's table up to the queried table, deepest first.
    pub nested_path: Vec<String>,
    pub is_edge: bool,
    /// Statement level, for list queries spanning several tables.
    pub level: usize,
    /// Route from the output record to the value, for list queries.
    pub placement: Vec<Placement>,
    /// Value of an empty cube cell.
    pub empty: Value,
}

impl ColumnMapping {
    pub fn new(name: impl Into<String>, index: usize, sql: impl Into<String>, pull: Pull) -> Self {
        ColumnMapping {
            name: name.into(),
            sub_path: ".".to_string(),
            index,
            pull,
            sql: sql.into(),
            nested_path: vec![".".to_string()],
            is_edge: false,
            level: 0,
            placement: Vec::new(),
            empty: Value::Null,
        }
    }

    pub fn with_sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.sub_path = sub_path.into();
        self
    }

    pub fn edge(mut self) -> Self {
        self.is_edge = true;
        self
    }

    /// Number of nested levels below the queried table.
    pub fn depth(&self) -> usize {
        self.nested_path.len().saturating_sub(1)
    }
}
