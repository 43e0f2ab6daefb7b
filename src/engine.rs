//! The container: registered facts, the executor, and the query pipeline
//! `parse → plan → execute → assemble`.
//!
//! SQL is never executed here directly. Callers supply a [`SqlExecutor`] for their SQLite
//! connection; the integration tests use `rusqlite`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::{debug, info, warn};
use serde_json::Value;
use thiserror::Error;
use validator::Validate;

use crate::assembly::{assemble, AssemblyError};
use crate::config::{CompilerConfig, ConfigError};
use crate::expressions::literal::truthy;
use crate::expressions::{CompileError, Expression};
use crate::planner::{compile, QueryPlan};
use crate::query::Query;
use crate::schema::{Schema, SchemaError, Snowflake, SnowflakeCatalog};
use crate::utils::field_path::startswith_field;

/// Runs generated SQL. Cells come back as JSON scalars: `INTEGER` and `REAL` as numbers,
/// `TEXT` as strings, `NULL` as null.
pub trait SqlExecutor {
    type Error: std::fmt::Display;

    fn execute(&self, sql: &str) -> Result<(), Self::Error>;

    fn query(&self, sql: &str) -> Result<Vec<Vec<Value>>, Self::Error>;
}

#[derive(Debug, Error)]
pub enum JxError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No fact is registered for `{0}`")]
    UnknownFact(String),

    #[error("SQL execution failed: {message}\n  Statement: {sql}")]
    Executor { message: String, sql: String },
}

pub struct Container<E: SqlExecutor> {
    config: CompilerConfig,
    executor: E,
    snowflakes: RwLock<HashMap<String, Arc<Snowflake>>>,
}

impl<E: SqlExecutor> Container<E> {
    pub fn new(config: CompilerConfig, executor: E) -> Result<Self, JxError> {
        config.validate().map_err(ConfigError::from)?;
        Ok(Container {
            config,
            executor,
            snowflakes: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The fact named `fact`, created empty when unknown.
    pub fn get_or_create_fact(&self, fact: &str) -> Arc<Snowflake> {
        if let Some(existing) = self.snowflake(fact) {
            return existing;
        }
        let mut facts = self
            .snowflakes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        facts
            .entry(fact.to_string())
            .or_insert_with(|| {
                info!("Created fact `{}`", fact);
                Arc::new(Snowflake::new(fact).with_max_nesting_depth(self.config.max_nesting_depth))
            })
            .clone()
    }

    /// Register a fact whose tables already exist, described by a saved catalog.
    pub fn register_catalog(&self, catalog: SnowflakeCatalog) -> Result<Arc<Snowflake>, JxError> {
        let snowflake = Arc::new(
            Snowflake::from_catalog(catalog)?.with_max_nesting_depth(self.config.max_nesting_depth),
        );
        let fact = snowflake.fact().to_string();
        let mut facts = self
            .snowflakes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if facts.insert(fact.clone(), snowflake.clone()).is_some() {
            warn!("Catalog for `{}` replaced the registered fact", fact);
        }
        info!("Registered fact `{}` with {} tables", fact, snowflake.query_paths().len());
        Ok(snowflake)
    }

    pub fn snowflake(&self, fact: &str) -> Option<Arc<Snowflake>> {
        self.snowflakes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(fact)
            .cloned()
    }

    pub fn catalog(&self, fact: &str) -> Option<SnowflakeCatalog> {
        self.snowflake(fact).map(|s| s.to_catalog())
    }

    /// The registered fact `from` belongs to: the longest one it starts with.
    fn fact_for(&self, from: &str) -> Result<Arc<Snowflake>, JxError> {
        let facts = self
            .snowflakes
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        facts
            .iter()
            .filter(|(name, _)| startswith_field(from, name))
            .max_by_key(|(name, _)| name.len())
            .map(|(_, snowflake)| snowflake.clone())
            .ok_or_else(|| JxError::UnknownFact(from.to_string()))
    }

    /// Add documents to a fact, evolving its tables first. Returns the number of
    /// documents stored.
    pub fn insert(&self, fact: &str, documents: &[Value]) -> Result<usize, JxError> {
        let snowflake = self.get_or_create_fact(fact);
        let plan = snowflake.insert(documents)?;
        for statement in plan.statements() {
            self.run(statement)?;
        }
        debug!(
            "Inserted {} documents into `{}` ({} schema changes)",
            plan.documents,
            fact,
            plan.ddl.len()
        );
        Ok(plan.documents)
    }

    /// Insert only the documents the jx `filter` holds for, evaluated in process.
    pub fn insert_where(&self, fact: &str, documents: &[Value], filter: &Value) -> Result<usize, JxError> {
        let keep = Expression::from_json(filter)?.to_native()?;
        let matching: Vec<Value> = documents
            .iter()
            .filter(|doc| truthy(&keep(doc)) == Some(true))
            .cloned()
            .collect();
        debug!(
            "{} of {} documents for `{}` pass the insert filter",
            matching.len(),
            documents.len(),
            fact
        );
        if matching.is_empty() {
            return Ok(0);
        }
        self.insert(fact, &matching)
    }

    pub fn compile(&self, query: &Value) -> Result<QueryPlan, JxError> {
        let query = Query::from_json(query)?;
        let snowflake = self.fact_for(&query.from)?;
        Ok(compile(&query, snowflake.as_ref(), &self.config)?)
    }

    pub fn assemble(&self, plan: &QueryPlan, rows: &[Vec<Value>]) -> Result<Value, JxError> {
        Ok(assemble(plan, rows)?)
    }

    /// Run a jx query and return the result in its requested format.
    pub fn query(&self, query: &Value) -> Result<Value, JxError> {
        let plan = self.compile(query)?;
        let rows = self
            .executor
            .query(&plan.sql)
            .map_err(|e| JxError::Executor {
                message: e.to_string(),
                sql: plan.sql.clone(),
            })?;
        debug!("Query returned {} rows", rows.len());
        self.assemble(&plan, &rows)
    }

    fn run(&self, sql: &str) -> Result<(), JxError> {
        self.executor.execute(sql).map_err(|e| JxError::Executor {
            message: e.to_string(),
            sql: sql.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    /// Records statements; answers every query with no rows.
    #[derive(Default)]
    struct Recorder {
        statements: RefCell<Vec<String>>,
    }

    impl SqlExecutor for Recorder {
        type Error = String;

        fn execute(&self, sql: &str) -> Result<(), String> {
            self.statements.borrow_mut().push(sql.to_string());
            Ok(())
        }

        fn query(&self, sql: &str) -> Result<Vec<Vec<Value>>, String> {
            self.statements.borrow_mut().push(sql.to_string());
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_insert_runs_ddl_then_rows() {
        let container = Container::new(CompilerConfig::default(), Recorder::default()).unwrap();
        let stored = container.insert("t", &[json!({"a": 1})]).unwrap();
        assert_eq!(stored, 1);
        let statements = container.executor().statements.borrow();
        assert!(statements[0].starts_with("CREATE TABLE \"t\""));
        assert!(statements.last().unwrap().starts_with("INSERT INTO \"t\""));
    }

    #[test]
    fn test_insert_where_filters_documents() {
        let container = Container::new(CompilerConfig::default(), Recorder::default()).unwrap();
        let docs = [json!({"a": 1}), json!({"a": 5}), json!({"b": 2})];
        let stored = container.insert_where("t", &docs, &json!({"gt": {"a": 2}})).unwrap();
        assert_eq!(stored, 1);
        assert_eq!(
            container.insert_where("t", &docs, &json!({"eq": {"a": 9}})).unwrap(),
            0
        );
        // `b` was never stored
        assert!(container.snowflake("t").unwrap().leaves("b").is_empty());
        assert!(matches!(
            container.insert_where("t", &docs, &json!({"nope": "a"})),
            Err(JxError::Compile(CompileError::UnknownOperator { .. }))
        ));
    }

    #[test]
    fn test_nested_from_finds_fact() {
        let container = Container::new(CompilerConfig::default(), Recorder::default()).unwrap();
        container
            .insert("t", &[json!({"a": 1, "b": [{"c": 1}, {"c": 2}]})])
            .unwrap();
        let plan = container.compile(&json!({"from": "t.b", "select": "c"})).unwrap();
        assert!(plan.sql.contains("FROM \"t.b\" t1"));
        assert!(matches!(
            container.compile(&json!({"from": "other", "select": "c"})),
            Err(JxError::UnknownFact(_))
        ));
    }

    #[test]
    fn test_empty_result_is_an_empty_list() {
        let container = Container::new(CompilerConfig::default(), Recorder::default()).unwrap();
        container.insert("t", &[json!({"a": 1})]).unwrap();
        assert_eq!(container.query(&json!({"from": "t", "select": "a"})).unwrap(), json!([]));
    }

    #[test]
    fn test_unknown_variable_in_where() {
        let container = Container::new(CompilerConfig::default(), Recorder::default()).unwrap();
        container.insert("t", &[json!({"a": 1})]).unwrap();
        assert!(matches!(
            container.compile(&json!({"from": "t", "select": "a", "where": {"gt": {"nope": 1}}})),
            Err(JxError::Compile(CompileError::UnknownVariable { .. }))
        ));
        // a select of a field no document has is null, not an error
        assert!(container.compile(&json!({"from": "t", "select": ["a", "nope"]})).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = CompilerConfig {
            max_nesting_depth: 0,
            ..Default::default()
        };
        assert!(matches!(
            Container::new(config, Recorder::default()),
            Err(JxError::Config(_))
        ));
    }
}
