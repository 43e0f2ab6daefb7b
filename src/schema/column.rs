//! Physical column descriptors and the structural column names every table carries.

use serde::{Deserialize, Serialize};

use crate::jx_type::JsonType;
use crate::utils::field_path::{concat_field, relative_field};

/// Row key of every table.
pub const UID: &str = "__id__";
/// Row key of the enclosing element, in child tables.
pub const PARENT: &str = "__parent__";
/// Position inside the enclosing array, in child tables; 0 is the first element.
pub const ORDER: &str = "__order__";

pub fn is_reserved(name: &str) -> bool {
    matches!(name, UID | PARENT | ORDER)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Full logical path, e.g. `b.c`.
    pub name: String,
    /// Physical column name inside its table, e.g. `c.$number`.
    pub es_column: String,
    /// Physical table name.
    pub es_index: String,
    pub json_type: JsonType,
    /// Array boundaries from this column up to the root, deepest first, ending in `"."`.
    pub nested_path: Vec<String>,
    /// Largest array seen at this column's table (1 for the root table).
    pub multi: usize,
    /// Superseded by a nest promotion; kept so physical column order never changes.
    #[serde(default)]
    pub hidden: bool,
}

impl Column {
    /// Logical path of the table holding this column.
    pub fn query_path(&self) -> &str {
        self.nested_path.first().map(String::as_str).unwrap_or(".")
    }

    pub fn depth(&self) -> usize {
        self.nested_path.len().saturating_sub(1)
    }
}

/// Physical name for a logical column stored in the table at `query_path`.
pub fn es_column_name(name: &str, query_path: &str, json_type: JsonType) -> String {
    let key = json_type.type_key().unwrap_or("$string");
    concat_field(&relative_field(name, query_path), key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_es_column_name() {
        assert_eq!(es_column_name("a", ".", JsonType::Integer), "a.$number");
        assert_eq!(es_column_name("b.c", "b", JsonType::String), "c.$string");
        assert_eq!(es_column_name("b", "b", JsonType::Number), "$number");
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved(UID));
        assert!(is_reserved(PARENT));
        assert!(!is_reserved("id"));
    }
}
