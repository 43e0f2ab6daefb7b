//! Aggregates, group-by and cubes against SQLite.

use serde_json::{json, Value};

use super::harness::with_documents;

fn numbers() -> Vec<Value> {
    vec![
        json!({"a": 1, "k": "x"}),
        json!({"a": 1, "k": "x"}),
        json!({"a": 1, "k": "y"}),
        json!({"a": 2}),
        json!({"a": 7}),
        json!({"k": "x"}),
        json!({}),
    ]
}

#[test]
fn test_count_all_rows() -> anyhow::Result<()> {
    let container = with_documents(&numbers())?;
    let result = container.query(&json!({"from": "t", "select": {"aggregate": "count"}}))?;
    assert_eq!(result, json!({"count": 7}));
    Ok(())
}

#[test]
fn test_set_domain_cube() -> anyhow::Result<()> {
    let container = with_documents(&numbers())?;
    let result = container.query(&json!({
        "from": "t",
        "edges": [{"name": "a", "value": "a", "domain": {"type": "set", "partitions": [1, 2, 3]}}],
        "select": {"aggregate": "count"}
    }))?;
    assert_eq!(result["data"]["count"], json!([3, 1, 0]));
    assert_eq!(result["edges"][0]["domain"]["partitions"], json!([1, 2, 3]));
    Ok(())
}

#[test]
fn test_null_partition() -> anyhow::Result<()> {
    let container = with_documents(&numbers())?;
    let result = container.query(&json!({
        "from": "t",
        "edges": [{
            "name": "a",
            "value": "a",
            "allowNulls": true,
            "domain": {"type": "set", "partitions": [1, 2, 3]}
        }],
        "select": {"aggregate": "count"}
    }))?;
    // 7 and the two documents without `a` fall outside the partitions
    assert_eq!(result["data"]["count"], json!([3, 1, 0, 3]));
    Ok(())
}

#[test]
fn test_range_domain() -> anyhow::Result<()> {
    let container = with_documents(&[json!({"a": 1}), json!({"a": 2}), json!({"a": 3}), json!({"a": 4})])?;
    let result = container.query(&json!({
        "from": "t",
        "edges": [{"name": "a", "value": "a", "domain": {"type": "range", "min": 0, "max": 10, "interval": 5}}],
        "select": {"aggregate": "count"}
    }))?;
    assert_eq!(result["data"]["count"], json!([4, 0]));
    assert_eq!(result["edges"][0]["domain"]["partitions"], json!([0, 5]));
    Ok(())
}

#[test]
fn test_discovered_domain() -> anyhow::Result<()> {
    let container = with_documents(&numbers())?;
    let result = container.query(&json!({
        "from": "t",
        "edges": ["k"],
        "select": {"aggregate": "count"}
    }))?;
    assert_eq!(result["data"]["count"], json!([3, 1]));
    assert_eq!(result["edges"][0]["domain"]["partitions"], json!(["x", "y"]));
    Ok(())
}

#[test]
fn test_groupby_table() -> anyhow::Result<()> {
    let container = with_documents(&[
        json!({"k": "x", "a": 1}),
        json!({"k": "y", "a": 2}),
        json!({"k": "x", "a": 3}),
        json!({"a": 9}),
    ])?;
    let query = json!({
        "from": "t",
        "groupby": "k",
        "select": [{"name": "total", "value": "a", "aggregate": "sum"}]
    });
    assert_eq!(
        container.query(&query)?,
        json!({"header": ["k", "total"], "data": [["x", 4], ["y", 2]]})
    );

    let mut as_list = query.clone();
    as_list["format"] = json!("list");
    assert_eq!(
        container.query(&as_list)?,
        json!([{"k": "x", "total": 4}, {"k": "y", "total": 2}])
    );
    Ok(())
}

#[test]
fn test_fractional_interval_boundaries() -> anyhow::Result<()> {
    let container = with_documents(&[json!({"a": 0.3}), json!({"a": 0.7})])?;
    let result = container.query(&json!({
        "from": "t",
        "edges": [{"name": "a", "value": "a", "domain": {"type": "range", "min": 0, "max": 1, "interval": 0.1}}],
        "select": {"aggregate": "count"}
    }))?;
    assert_eq!(result["data"]["count"], json!([0, 0, 0, 1, 0, 0, 0, 1, 0, 0]));
    Ok(())
}

#[test]
fn test_time_domain_cube() -> anyhow::Result<()> {
    let container = with_documents(&[
        json!({"ts": 43200}),
        json!({"ts": 103680}),
        json!({"ts": 164160}),
        json!({"ts": 432000}),
    ])?;
    let result = container.query(&json!({
        "from": "t",
        "edges": [{
            "name": "day",
            "value": "ts",
            "domain": {"type": "time", "min": "1970-01-01", "max": "1970-01-04", "interval": "day"}
        }],
        "select": {"aggregate": "count"}
    }))?;
    assert_eq!(result["data"]["count"], json!([1, 2, 0]));
    assert_eq!(result["edges"][0]["domain"]["partitions"], json!([0, 86400, 172800]));
    Ok(())
}

#[test]
fn test_duration_domain_cube() -> anyhow::Result<()> {
    let container = with_documents(&[json!({"d": 600}), json!({"d": 1800}), json!({"d": 3000})])?;
    let result = container.query(&json!({
        "from": "t",
        "edges": [{
            "name": "d",
            "value": "d",
            "domain": {"type": "duration", "min": 0, "max": "1hour", "interval": "30minute"}
        }],
        "select": {"aggregate": "count"}
    }))?;
    assert_eq!(result["data"]["count"], json!([1, 2]));
    Ok(())
}

#[test]
fn test_stats_per_group() -> anyhow::Result<()> {
    let container = with_documents(&[
        json!({"k": "x", "a": 1}),
        json!({"k": "y", "a": 2}),
        json!({"k": "x", "a": 3}),
    ])?;
    let result = container.query(&json!({
        "from": "t",
        "groupby": "k",
        "select": [{"name": "s", "value": "a", "aggregate": "stats"}],
        "format": "list"
    }))?;
    assert_eq!(
        result,
        json!([
            {"k": "x", "s": {"count": 2, "min": 1, "max": 3, "sum": 4, "avg": 2, "sos": 10, "variance": 1, "std": 1}},
            {"k": "y", "s": {"count": 1, "min": 2, "max": 2, "sum": 2, "avg": 2, "sos": 4, "variance": 0, "std": 0}}
        ])
    );
    Ok(())
}

#[test]
fn test_count_with_nested_filter() -> anyhow::Result<()> {
    let container = with_documents(&[
        json!({"a": 1, "b": [{"c": 1}, {"c": 2}]}),
        json!({"a": 2}),
        json!({"a": 3, "b": [{"c": 3}]}),
    ])?;
    let result = container.query(&json!({
        "from": "t",
        "select": {"aggregate": "count"},
        "where": {"gt": {"b.c": 1}}
    }))?;
    assert_eq!(result, json!({"count": 2}));
    Ok(())
}
