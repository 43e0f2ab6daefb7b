//! # Assembly Error Types
//!
//! Raised when result rows do not fit the plan they were produced for. These indicate an
//! executor returning rows for a different statement, never bad user input.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssemblyError {
    #[error("Result row {row} has {found} columns, the plan expects {expected}")]
    RowArity {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Result row {row} places edge `{edge}` at partition {index}, the domain has {size}")]
    CoordinateOutOfRange {
        row: usize,
        edge: String,
        index: i64,
        size: usize,
    },

    #[error("Result row {row} holds an unexpected value in column {column}: {reason}")]
    UnexpectedCell {
        row: usize,
        column: usize,
        reason: String,
    },

    #[error("Result row {row} at level {level} has no enclosing row (parent {parent})")]
    OrphanRow {
        row: usize,
        level: usize,
        parent: String,
    },
}
