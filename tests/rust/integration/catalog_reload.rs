//! A saved catalog reattaches a second container to tables already on disk.

use jxsql::schema::SnowflakeCatalog;
use jxsql::{CompilerConfig, Container};
use serde_json::json;

use super::harness::SqliteExecutor;

#[test]
fn test_catalog_reattaches_existing_tables() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("facts.sqlite");
    let query = json!({"from": "t", "select": ["a", "b.c"]});

    let yaml = {
        let first = Container::new(CompilerConfig::default(), SqliteExecutor::open(&db)?)?;
        first.insert("t", &[json!({"a": 1, "b": [{"c": 1}, {"c": 2}]}), json!({"a": 2})])?;
        assert_eq!(
            first.query(&query)?,
            json!([{"a": 1, "b": [{"c": 1}, {"c": 2}]}, {"a": 2}])
        );
        first
            .catalog("t")
            .ok_or_else(|| anyhow::anyhow!("fact `t` is not registered"))?
            .to_yaml()?
    };

    let second = Container::new(CompilerConfig::default(), SqliteExecutor::open(&db)?)?;
    second.register_catalog(SnowflakeCatalog::from_yaml_str(&yaml)?)?;
    assert_eq!(
        second.query(&query)?,
        json!([{"a": 1, "b": [{"c": 1}, {"c": 2}]}, {"a": 2}])
    );

    // new rows continue the stored uids
    second.insert("t", &[json!({"a": 3, "b": [{"c": 3}]})])?;
    assert_eq!(
        second.query(&query)?,
        json!([
            {"a": 1, "b": [{"c": 1}, {"c": 2}]},
            {"a": 2},
            {"a": 3, "b": [{"c": 3}]}
        ])
    );
    Ok(())
}

#[test]
fn test_unknown_fact() -> anyhow::Result<()> {
    let container = super::harness::container()?;
    let err = container
        .query(&json!({"from": "missing", "select": "a"}))
        .unwrap_err();
    assert!(matches!(err, jxsql::JxError::UnknownFact(_)));
    Ok(())
}
