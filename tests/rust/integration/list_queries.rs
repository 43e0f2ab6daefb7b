//! List-shaped queries: flat values, nested arrays and their filters.

use serde_json::json;

use super::harness::{container, with_documents};

fn parents() -> Vec<serde_json::Value> {
    vec![
        json!({"a": 1, "b": [{"c": 1}, {"c": 2}]}),
        json!({"a": 2}),
        json!({"a": 3, "b": [{"c": 3}]}),
    ]
}

#[test]
fn test_nested_select_rebuilds_arrays() -> anyhow::Result<()> {
    let container = with_documents(&[
        json!({"a": 1, "b": [{"c": 10}, {"c": 20}]}),
        json!({"a": 2, "b": []}),
    ])?;
    let result = container.query(&json!({"from": "t", "select": ["a", "b.c"]}))?;
    assert_eq!(result, json!([{"a": 1, "b": [{"c": 10}, {"c": 20}]}, {"a": 2}]));
    Ok(())
}

#[test]
fn test_single_value_round_trip_keeps_order_and_nulls() -> anyhow::Result<()> {
    let container = with_documents(&[json!({"a": 1}), json!({"x": 5}), json!({"a": 3})])?;
    let result = container.query(&json!({"from": "t", "select": {"value": "a"}}))?;
    assert_eq!(result, json!([1, null, 3]));
    Ok(())
}

#[test]
fn test_parents_without_children() -> anyhow::Result<()> {
    let container = with_documents(&parents())?;
    let result = container.query(&json!({"from": "t", "select": ["a", "b.c"]}))?;
    assert_eq!(
        result,
        json!([
            {"a": 1, "b": [{"c": 1}, {"c": 2}]},
            {"a": 2},
            {"a": 3, "b": [{"c": 3}]}
        ])
    );
    Ok(())
}

#[test]
fn test_nested_filter_keeps_parents() -> anyhow::Result<()> {
    let container = with_documents(&parents())?;
    let result = container.query(&json!({
        "from": "t",
        "select": ["a", "b.c"],
        "where": {"gt": {"b.c": 1}}
    }))?;
    assert_eq!(
        result,
        json!([
            {"a": 1, "b": [{"c": 2}]},
            {"a": 2},
            {"a": 3, "b": [{"c": 3}]}
        ])
    );
    Ok(())
}

#[test]
fn test_nested_filter_without_nested_select() -> anyhow::Result<()> {
    let container = with_documents(&parents())?;
    let result = container.query(&json!({"from": "t", "select": "a", "where": {"gt": {"b.c": 2}}}))?;
    assert_eq!(result, json!([3]));

    let result = container.query(&json!({"from": "t", "select": "a", "where": {"eq": {"b.c": 2}}}))?;
    assert_eq!(result, json!([1]));
    Ok(())
}

#[test]
fn test_sort_and_limit() -> anyhow::Result<()> {
    let container = with_documents(&parents())?;
    let result = container.query(&json!({
        "from": "t",
        "select": "a",
        "sort": {"value": "a", "sort": "desc"},
        "limit": 2
    }))?;
    assert_eq!(result, json!([3, 2]));
    Ok(())
}

#[test]
fn test_query_from_nested_path() -> anyhow::Result<()> {
    let container = with_documents(&parents())?;
    let result = container.query(&json!({"from": "t.b", "select": "b.c"}))?;
    assert_eq!(result, json!([1, 2, 3]));
    Ok(())
}

#[test]
fn test_table_format() -> anyhow::Result<()> {
    let container = with_documents(&parents())?;
    let result = container.query(&json!({"from": "t", "select": ["a", "b.c"], "format": "table"}))?;
    assert_eq!(
        result,
        json!({"header": ["a", "b.c"], "data": [[1, [1, 2]], [2, null], [3, [3]]]})
    );
    Ok(())
}

#[test]
fn test_regexp_filter() -> anyhow::Result<()> {
    let container = with_documents(&[json!({"k": "xa"}), json!({"k": "yb"}), json!({"k": "xc"}), json!({})])?;
    let result = container.query(&json!({
        "from": "t",
        "select": "k",
        "where": {"regexp": {"k": "x."}}
    }))?;
    assert_eq!(result, json!(["xa", "xc"]));
    Ok(())
}

#[test]
fn test_computed_select_with_default() -> anyhow::Result<()> {
    let container = with_documents(&[json!({"a": 1}), json!({}), json!({"a": 4})])?;
    let result = container.query(&json!({
        "from": "t",
        "select": [{"name": "twice", "value": {"mul": ["a", 2]}, "default": 0}]
    }))?;
    assert_eq!(result, json!([{"twice": 2}, {"twice": 0}, {"twice": 8}]));
    Ok(())
}

#[test]
fn test_two_level_nesting_round_trip() -> anyhow::Result<()> {
    let documents = vec![
        json!({"a": 1, "b": [{"c": 1, "d": [{"e": 1}, {"e": 2}]}, {"c": 2}]}),
        json!({"a": 2, "b": [{"c": 3, "d": [{"e": 3}]}]}),
    ];
    let container = with_documents(&documents)?;
    let result = container.query(&json!({"from": "t", "select": ["a", "b.c", "b.d.e"]}))?;
    assert_eq!(result, json!(documents));
    Ok(())
}

#[test]
fn test_query_after_nest_promotion() -> anyhow::Result<()> {
    let container = container()?;
    container.insert("t", &[json!({"a": 1, "b": {"c": 1}})])?;
    container.insert("t", &[json!({"a": 2, "b": [{"c": 2}, {"c": 3}]})])?;
    let result = container.query(&json!({"from": "t", "select": ["a", "b.c"]}))?;
    assert_eq!(
        result,
        json!([
            {"a": 1, "b": [{"c": 1}]},
            {"a": 2, "b": [{"c": 2}, {"c": 3}]}
        ])
    );
    Ok(())
}

#[test]
fn test_insert_where_keeps_matching_documents() -> anyhow::Result<()> {
    let container = container()?;
    let stored = container.insert_where(
        "t",
        &[json!({"a": 1}), json!({"a": 5}), json!({"a": 7, "k": "skip"})],
        &json!({"and": [{"gt": {"a": 2}}, {"missing": "k"}]}),
    )?;
    assert_eq!(stored, 1);
    assert_eq!(container.query(&json!({"from": "t", "select": "a"}))?, json!([5]));
    Ok(())
}
