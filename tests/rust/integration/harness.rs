//! SQLite executor for the integration tests.

use std::path::Path;

use jxsql::{CompilerConfig, Container, SqlExecutor};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;

pub struct SqliteExecutor {
    conn: Connection,
}

impl SqliteExecutor {
    pub fn in_memory() -> rusqlite::Result<Self> {
        Self::wrap(Connection::open_in_memory()?)
    }

    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        Self::wrap(Connection::open(path)?)
    }

    fn wrap(conn: Connection) -> rusqlite::Result<Self> {
        // `X REGEXP Y` calls regexp(Y, X)
        conn.create_scalar_function(
            "regexp",
            2,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let pattern = ctx.get::<String>(0)?;
                let re = regex::Regex::new(&pattern)
                    .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
                Ok(match ctx.get_raw(1) {
                    ValueRef::Text(text) => Some(re.is_match(&String::from_utf8_lossy(text))),
                    _ => None,
                })
            },
        )?;
        Ok(SqliteExecutor { conn })
    }
}

fn cell(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}

impl SqlExecutor for SqliteExecutor {
    type Error = rusqlite::Error;

    fn execute(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.execute_batch(sql)
    }

    fn query(&self, sql: &str) -> rusqlite::Result<Vec<Vec<Value>>> {
        let mut statement = self.conn.prepare(sql)?;
        let width = statement.column_count();
        let rows = statement.query_map([], |row| {
            (0..width)
                .map(|i| row.get_ref(i).map(cell))
                .collect::<rusqlite::Result<Vec<Value>>>()
        })?;
        let out = rows.collect::<rusqlite::Result<Vec<_>>>();
        out
    }
}

pub fn container() -> anyhow::Result<Container<SqliteExecutor>> {
    let _ = env_logger::builder().is_test(true).try_init();
    Ok(Container::new(CompilerConfig::default(), SqliteExecutor::in_memory()?)?)
}

/// A container with `documents` already inserted into fact `t`.
pub fn with_documents(documents: &[Value]) -> anyhow::Result<Container<SqliteExecutor>> {
    let container = container()?;
    container.insert("t", documents)?;
    Ok(container)
}
