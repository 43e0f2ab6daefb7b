//! jxsql - jx query expressions over nested JSON, compiled to SQL
//!
//! This crate lets callers query arrays-of-objects nested inside JSON documents as if
//! they were one logical table, while storage stays relational:
//! - Structural type algebra over JSON shapes (`jx_type`)
//! - The jx expression AST and its partial evaluator (`expressions`)
//! - Per-dialect compilation: SQLite text (`sql`) and in-process closures (`native`)
//! - The snowflake schema model that maps nested paths onto child tables (`schema`)
//! - Query planning for list, cube and group-by shapes (`planner`)
//! - Reassembly of flat result rows into nested documents (`assembly`)
//!
//! `engine::Container` ties these together behind the `SqlExecutor` seam.

pub mod utils;

pub mod assembly;
pub mod config;
pub mod engine;
pub mod expressions;
pub mod jx_type;
pub mod native;
pub mod planner;
pub mod query;
pub mod schema;
pub mod sql;

pub use config::CompilerConfig;
pub use engine::{Container, JxError, SqlExecutor};
pub use expressions::{CompileError, Expression};
pub use jx_type::{JsonType, JxType};
