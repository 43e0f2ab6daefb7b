//! Compile errors raised while parsing, simplifying or planning jx expressions.
//!
//! Every variant that concerns a single expression carries its serialized jx form so the
//! caller can report exactly what failed to compile.

use thiserror::Error;

use crate::schema::errors::SchemaError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CompileError {
    #[error("Unknown operator `{op}` in {expr}")]
    UnknownOperator { op: String, expr: String },

    #[error("Operator `{op}` expects {expected} operand(s), found {found}: {expr}")]
    WrongArity {
        op: String,
        expected: String,
        found: usize,
        expr: String,
    },

    #[error("Malformed `{op}` expression ({reason}): {expr}")]
    Malformed {
        op: String,
        reason: String,
        expr: String,
    },

    #[error("Unknown variable `{var}` in {expr}")]
    UnknownVariable { var: String, expr: String },

    #[error("Expression reaches nesting levels {levels:?} that cannot be joined together: {expr}")]
    SpansNestingLevels { levels: Vec<String>, expr: String },

    #[error("Expression is not supported by the {dialect} dialect: {expr}")]
    Unsupported { dialect: String, expr: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid domain for edge `{edge}`: {reason}")]
    InvalidDomain { edge: String, reason: String },

    #[error("Unknown nested path `{path}` in fact `{fact}`")]
    UnknownNestedPath { fact: String, path: String },

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl CompileError {
    pub fn wrong_arity(
        op: impl Into<String>,
        expected: impl Into<String>,
        found: usize,
        expr: &serde_json::Value,
    ) -> Self {
        CompileError::WrongArity {
            op: op.into(),
            expected: expected.into(),
            found,
            expr: expr.to_string(),
        }
    }

    pub fn malformed(
        op: impl Into<String>,
        reason: impl Into<String>,
        expr: &serde_json::Value,
    ) -> Self {
        CompileError::Malformed {
            op: op.into(),
            reason: reason.into(),
            expr: expr.to_string(),
        }
    }

    /// Create an InvalidQuery error with context about where it was found
    pub fn invalid_query_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        CompileError::InvalidQuery(format!("{}\n  Context: {}", message.into(), context.into()))
    }
}
