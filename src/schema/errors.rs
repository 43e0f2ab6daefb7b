//! # Schema Error Types
//!
//! Raised while evolving a snowflake from inserted documents or loading it from a catalog.
//! Evolution errors are surfaced to the inserting caller; the snapshot in place before the
//! failed insert stays current.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Conflicting shape at `{path}`: {reason}")]
    Conflict { path: String, reason: String },

    #[error("`{name}` is reserved for structural columns")]
    ReservedName { name: String },

    #[error("Unsupported nesting at `{path}`: {reason}")]
    UnsupportedNesting { path: String, reason: String },

    #[error("Nesting at `{path}` is {depth} levels deep, the limit is {max}")]
    TooDeep {
        path: String,
        depth: usize,
        max: usize,
    },

    #[error("No table for nested path `{path}` in fact `{fact}`")]
    UnknownTable { fact: String, path: String },

    #[error("Invalid catalog: {reason}")]
    Catalog { reason: String },
}

/// Helper methods for creating errors with context information
impl SchemaError {
    /// Create a Conflict error carrying where the conflicting document came from
    ///
    /// # Example
    /// ```ignore
    /// SchemaError::conflict_with_context("a", "document is not an object", "insert into `orders`, document 3")
    /// ```
    pub fn conflict_with_context(
        path: impl Into<String>,
        reason: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        SchemaError::Conflict {
            path: path.into(),
            reason: format!("{}\n  Context: {}", reason.into(), context.into()),
        }
    }

    pub fn catalog(reason: impl Into<String>) -> Self {
        SchemaError::Catalog {
            reason: reason.into(),
        }
    }
}
