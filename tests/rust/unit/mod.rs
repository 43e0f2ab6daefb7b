//! Algebraic properties of types and expressions, checked over small case tables.

use std::collections::BTreeMap;

use jxsql::expressions::JxLang;
use jxsql::jx_type::to_type;
use jxsql::{Expression, JsonType, JxType};
use serde_json::{json, Value};
use test_case::test_case;

fn samples() -> Vec<JxType> {
    vec![
        JxType::IS_NULL,
        JsonType::Boolean.into(),
        JsonType::Integer.into(),
        JsonType::Number.into(),
        JsonType::String.into(),
        to_type(&json!({"a": 1})),
        to_type(&json!({"a": "x", "b": [{"c": 1.5}]})),
        to_type(&json!({"a": true, "b": [{"c": 2}, {"d": "y"}]})),
    ]
}

#[test]
fn test_union_is_commutative_and_associative() {
    let types = samples();
    for a in &types {
        for b in &types {
            assert_eq!(a | b, b | a, "{:?} | {:?}", a, b);
            for c in &types {
                assert_eq!(&(a | b) | c, a | &(b | c));
            }
        }
    }
}

#[test]
fn test_union_identity_and_idempotence() {
    for a in samples() {
        assert_eq!(&JxType::IS_NULL | &a, a);
        assert_eq!(&a | &a, a);
        assert!(a.is_in(&(&a | &JxType::from(JsonType::String))));
    }
}

#[test_case(json!([1, 2.5]), JsonType::Number ; "integers widen to numbers")]
#[test_case(json!(["x", ""]), JsonType::String ; "empty strings add nothing")]
#[test_case(json!([true, null]), JsonType::Boolean ; "nulls add nothing")]
fn test_array_element_type(value: Value, element: JsonType) {
    assert_eq!(to_type(&value), JxType::array_of(element.into()));
}

fn parse(value: Value) -> Expression {
    Expression::from_json(&value).unwrap()
}

#[test_case(json!({"add": [1, 2]}) ; "constant sum")]
#[test_case(json!({"and": [true, {"gt": {"a": 1}}]}) ; "true conjunct")]
#[test_case(json!({"or": [false, {"eq": {"a": 1}}]}) ; "false disjunct")]
#[test_case(json!({"add": ["a", {"mul": [2, 3]}]}) ; "nested constant")]
#[test_case(json!({"missing": "a"}) ; "missing variable")]
fn test_partial_eval_is_idempotent(value: Value) {
    let once = parse(value).partial_eval::<JxLang>();
    let twice = parse(once.to_json()).partial_eval::<JxLang>();
    assert_eq!(once, twice);
}

fn bind(expr: &Expression, doc: &Value) -> Expression {
    let bindings: BTreeMap<String, Expression> = expr
        .vars()
        .into_iter()
        .map(|v| {
            let value = doc.get(&v).cloned().unwrap_or(Value::Null);
            (v, Expression::literal(value))
        })
        .collect();
    expr.substitute(&bindings)
}

#[test_case(json!({"add": ["a", "b"]}), json!({"a": 1, "b": 2}) ; "sum")]
#[test_case(json!({"mul": ["a", 4]}), json!({"a": 3}) ; "product")]
#[test_case(json!({"sub": ["a", "b"]}), json!({"a": 10, "b": 4}) ; "difference")]
#[test_case(json!({"concat": ["a", "b"]}), json!({"a": "x", "b": "y"}) ; "concatenation")]
#[test_case(json!({"upper": "a"}), json!({"a": "abc"}) ; "upper case")]
#[test_case(json!({"length": "a"}), json!({"a": "hello"}) ; "string length")]
#[test_case(json!({"number": "a"}), json!({"a": "12"}) ; "number cast")]
#[test_case(json!({"when": {"gt": {"a": 1}}, "then": "b", "else": 0}), json!({"a": 2, "b": 5}) ; "conditional")]
fn test_bound_terms_are_never_missing(value: Value, doc: Value) {
    let expr = parse(value);
    assert!(!expr.missing_simplified::<JxLang>().is_false());
    let bound = bind(&expr, &doc);
    assert!(bound.missing_simplified::<JxLang>().is_false());
    assert_eq!(
        bound.partial_eval::<JxLang>().as_literal(),
        Some(&expr.evaluate(&doc).unwrap())
    );
}

#[test_case(json!({"gt": {"a": 1}}), json!({"a": 2}) ; "comparison")]
#[test_case(json!({"and": [true, {"eq": {"a": "x"}}]}), json!({"a": "x"}) ; "conjunction")]
#[test_case(json!({"add": ["a", {"mul": [2, 3]}]}), json!({"a": 1}) ; "arithmetic")]
#[test_case(json!({"missing": "b"}), json!({"a": 1}) ; "missing")]
fn test_native_agrees_with_simplified(value: Value, doc: Value) {
    let expr = parse(value);
    let simplified = parse(expr.partial_eval::<JxLang>().to_json());
    assert_eq!(expr.evaluate(&doc).unwrap(), simplified.evaluate(&doc).unwrap());
}
