//! # Snowflake schema model
//!
//! One logical fact is stored as a tree of physical tables: the fact table holds the
//! top-level fields, and every array of objects (or of primitives) found in the documents
//! gets a child table keyed by `__id__`, pointing at its enclosing row through
//! `__parent__` and keeping element order in `__order__`.
//!
//! The planner only sees the [`Schema`] trait; [`Snowflake`] is the implementation that
//! evolves with inserted documents and can be saved to, or rebuilt from, a catalog.

pub mod catalog;
pub mod column;
pub mod errors;
pub mod insert;
pub mod snowflake;

pub use catalog::{ColumnCatalog, SnowflakeCatalog, TableCatalog};
pub use column::{Column, ORDER, PARENT, UID};
pub use errors::SchemaError;
pub use insert::InsertPlan;
pub use snowflake::{Snowflake, TableInfo};

/// Read access to the physical layout of one fact.
pub trait Schema {
    fn fact(&self) -> &str;

    /// Query path of every table, deepest first.
    fn query_paths(&self) -> Vec<String>;

    /// Every visible column.
    fn columns(&self) -> Vec<Column>;

    /// Visible columns whose logical name is `prefix` or lies underneath it.
    fn leaves(&self, prefix: &str) -> Vec<Column>;

    /// `leaves(var)` grouped by the table holding them, deepest table first.
    fn split_values(&self, var: &str) -> Vec<(String, Vec<Column>)>;

    fn get_table(&self, query_path: &str) -> Result<TableInfo, SchemaError>;
}
