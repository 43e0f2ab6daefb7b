//! jx JSON syntax.
//!
//! - a bare string is a variable (`"a.b"`); `"a.*"` is every leaf under `a`
//! - numbers, booleans and `null` are literals; `{"literal": v}` quotes anything
//! - an array is a tuple
//! - an object names one operator: `{"op": [operands...]}` or the binary shorthand
//!   `{"op": {"var": literal}}`, plus optional parameters (`default`, `nulls`, `separator`,
//!   `start`, `then`, `else`)
//!
//! Operators are looked up in a static registry; unknown names are rejected.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use super::errors::CompileError;
use super::*;
use crate::utils::dates::parse_date;

/// Keys that parameterize an operator rather than name one.
const PARAM_KEYS: [&str; 6] = ["default", "nulls", "separator", "start", "then", "else"];

struct Call<'a> {
    op: &'a str,
    operand: &'a Value,
    params: &'a Map<String, Value>,
    source: &'a Value,
}

type ParseFn = fn(&Call) -> Result<Expression, CompileError>;

lazy_static::lazy_static! {
    static ref OPERATORS: HashMap<&'static str, ParseFn> = {
        let mut m: HashMap<&'static str, ParseFn> = HashMap::new();

        // ===== LITERALS =====
        m.insert("literal", |c| Ok(Expression::literal(c.operand.clone())));
        m.insert("date", parse_date_literal);
        m.insert("tuple", |c| Ok(Expression::new(Expr::Tuple(TupleOp { terms: operands(c)? }))));
        m.insert("leaves", |c| match c.operand {
            Value::String(prefix) => Ok(Expression::new(Expr::Leaves(Leaves { prefix: prefix.clone() }))),
            _ => Err(CompileError::malformed(c.op, "expected a path", c.source)),
        });

        // ===== BOOLEAN =====
        m.insert("not", |c| {
            let [term] = exactly::<1>(c)?;
            Ok(Expression::negate(term))
        });
        m.insert("and", |c| Ok(Expression::all(operands(c)?)));
        m.insert("or", |c| Ok(Expression::any(operands(c)?)));
        m.insert("missing", |c| {
            let [term] = exactly::<1>(c)?;
            Ok(Expression::is_missing(term))
        });
        m.insert("exists", |c| {
            let [term] = exactly::<1>(c)?;
            Ok(Expression::new(Expr::Exists(ExistsOp { term })))
        });
        m.insert("in", parse_in);
        m.insert("terms", parse_in);

        // ===== COMPARISON =====
        m.insert("eq", parse_eq);
        m.insert("term", parse_eq);
        m.insert("ne", |c| compare(c, CompareOp::Ne));
        m.insert("neq", |c| compare(c, CompareOp::Ne));
        m.insert("gt", |c| compare(c, CompareOp::Gt));
        m.insert("gte", |c| compare(c, CompareOp::Gte));
        m.insert("lt", |c| compare(c, CompareOp::Lt));
        m.insert("lte", |c| compare(c, CompareOp::Lte));

        // ===== ARITHMETIC =====
        m.insert("sub", |c| binary(c, BinaryOp::Sub));
        m.insert("subtract", |c| binary(c, BinaryOp::Sub));
        m.insert("minus", |c| binary(c, BinaryOp::Sub));
        m.insert("div", |c| binary(c, BinaryOp::Div));
        m.insert("divide", |c| binary(c, BinaryOp::Div));
        m.insert("exp", |c| binary(c, BinaryOp::Exp));
        m.insert("mod", |c| binary(c, BinaryOp::Mod));
        m.insert("floor", |c| binary(c, BinaryOp::Floor));
        m.insert("add", |c| multi(c, MultiOp::Add, false));
        m.insert("sum", |c| multi(c, MultiOp::Add, true));
        m.insert("mul", |c| multi(c, MultiOp::Mul, false));
        m.insert("mult", |c| multi(c, MultiOp::Mul, false));
        m.insert("multiply", |c| multi(c, MultiOp::Mul, false));
        m.insert("abs", |c| unary(c, UnaryOp::Abs));
        m.insert("neg", |c| unary(c, UnaryOp::Neg));
        m.insert("count", |c| reduce(c, ReduceOp::Count));
        m.insert("max", |c| reduce(c, ReduceOp::Max));
        m.insert("min", |c| reduce(c, ReduceOp::Min));

        // ===== SELECTION =====
        m.insert("coalesce", |c| Ok(Expression::new(Expr::Coalesce(CoalesceOp { terms: operands(c)? }))));
        m.insert("first", |c| pick(c, PickOp::First));
        m.insert("last", |c| pick(c, PickOp::Last));
        m.insert("when", parse_when);
        m.insert("case", parse_case);

        // ===== CASTS =====
        m.insert("string", |c| cast(c, CastOp::String));
        m.insert("number", |c| cast(c, CastOp::Number));
        m.insert("integer", |c| cast(c, CastOp::Integer));
        m.insert("boolean", |c| cast(c, CastOp::Boolean));

        // ===== STRINGS =====
        m.insert("concat", parse_concat);
        m.insert("length", |c| string_unary(c, StringUnaryOp::Length));
        m.insert("lower", |c| string_unary(c, StringUnaryOp::Lower));
        m.insert("upper", |c| string_unary(c, StringUnaryOp::Upper));
        m.insert("trim", |c| string_unary(c, StringUnaryOp::Trim));
        m.insert("left", |c| slice(c, SliceOp::Left));
        m.insert("right", |c| slice(c, SliceOp::Right));
        m.insert("not_left", |c| slice(c, SliceOp::NotLeft));
        m.insert("not_right", |c| slice(c, SliceOp::NotRight));
        m.insert("prefix", |c| affix(c, AffixOp::Prefix));
        m.insert("suffix", |c| affix(c, AffixOp::Suffix));
        m.insert("find", parse_find);
        m.insert("between", parse_between);
        m.insert("regexp", parse_regexp);
        m.insert("regex", parse_regexp);

        m
    };
}

pub fn is_operator(name: &str) -> bool {
    OPERATORS.contains_key(name)
}

impl Expression {
    pub fn from_json(value: &Value) -> Result<Expression, CompileError> {
        match value {
            Value::String(s) => Ok(parse_path(s)),
            Value::Array(items) => {
                let terms = items
                    .iter()
                    .map(Expression::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expression::new(Expr::Tuple(TupleOp { terms })))
            }
            Value::Object(map) => parse_object(map, value),
            other => Ok(Expression::literal(other.clone())),
        }
    }

    pub fn to_json(&self) -> Value {
        to_json(self)
    }
}

fn parse_path(path: &str) -> Expression {
    if path == "*" {
        return Expression::new(Expr::Leaves(Leaves {
            prefix: ".".to_string(),
        }));
    }
    match path.strip_suffix(".*") {
        Some(prefix) => Expression::new(Expr::Leaves(Leaves {
            prefix: prefix.to_string(),
        })),
        None => Expression::variable(path),
    }
}

fn parse_object(map: &Map<String, Value>, source: &Value) -> Result<Expression, CompileError> {
    let mut found: Option<(&str, ParseFn)> = None;
    for key in map.keys() {
        if let Some(parse) = OPERATORS.get(key.as_str()) {
            if found.is_some() {
                return Err(CompileError::malformed(
                    key.as_str(),
                    "more than one operator in one object",
                    source,
                ));
            }
            found = Some((key.as_str(), *parse));
        } else if !PARAM_KEYS.contains(&key.as_str()) {
            return Err(CompileError::UnknownOperator {
                op: key.clone(),
                expr: source.to_string(),
            });
        }
    }
    let Some((op, parse)) = found else {
        return Err(CompileError::malformed("{}", "no operator given", source));
    };
    let call = Call {
        op,
        operand: &map[op],
        params: map,
        source,
    };
    parse(&call)
}

// ------------------------------------------------------------------ operands

fn is_expression_object(map: &Map<String, Value>) -> bool {
    map.keys().any(|k| OPERATORS.contains_key(k.as_str()))
}

/// Operands in list form, the `{"var": literal}` shorthand, or a single expression.
fn operands(c: &Call) -> Result<Vec<Expression>, CompileError> {
    match c.operand {
        Value::Array(items) => items.iter().map(Expression::from_json).collect(),
        Value::Object(map) if !is_expression_object(map) => {
            if map.len() != 1 {
                return Err(CompileError::malformed(
                    c.op,
                    "shorthand takes exactly one variable",
                    c.source,
                ));
            }
            let (var, value) = map.iter().next().ok_or_else(|| {
                CompileError::malformed(c.op, "shorthand takes exactly one variable", c.source)
            })?;
            Ok(vec![parse_path(var), Expression::literal(value.clone())])
        }
        other => Ok(vec![Expression::from_json(other)?]),
    }
}

fn exactly<const N: usize>(c: &Call) -> Result<[Expression; N], CompileError> {
    let terms = operands(c)?;
    let found = terms.len();
    terms
        .try_into()
        .map_err(|_| CompileError::wrong_arity(c.op, N.to_string(), found, c.source))
}

fn param(c: &Call, key: &str) -> Result<Expression, CompileError> {
    match c.params.get(key) {
        Some(v) => Expression::from_json(v),
        None => Ok(Expression::null()),
    }
}

// ------------------------------------------------------------------ parsers

fn parse_date_literal(c: &Call) -> Result<Expression, CompileError> {
    let seconds = match c.operand {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(
            parse_date(s).map_err(|e| CompileError::malformed(c.op, e.to_string(), c.source))?,
        ),
        _ => None,
    }
    .ok_or_else(|| CompileError::malformed(c.op, "expected a date string or seconds", c.source))?;
    Ok(Expression::new(Expr::Date(DateLiteral { seconds })))
}

fn parse_eq(c: &Call) -> Result<Expression, CompileError> {
    if let Value::Object(map) = c.operand {
        if map.len() > 1 && !is_expression_object(map) {
            let terms = map
                .iter()
                .map(|(var, value)| Expression::eq(parse_path(var), Expression::literal(value.clone())))
                .collect();
            return Ok(Expression::all(terms));
        }
    }
    compare(c, CompareOp::Eq)
}

fn compare(c: &Call, op: CompareOp) -> Result<Expression, CompileError> {
    let [lhs, rhs] = exactly::<2>(c)?;
    Ok(Expression::new(Expr::Compare(CompareExpr { op, lhs, rhs })))
}

fn parse_in(c: &Call) -> Result<Expression, CompileError> {
    let [value, superset] = exactly::<2>(c)?;
    Ok(Expression::new(Expr::In(InOp { value, superset })))
}

fn binary(c: &Call, op: BinaryOp) -> Result<Expression, CompileError> {
    let mut terms = operands(c)?;
    if op == BinaryOp::Floor && terms.len() == 1 {
        terms.push(Expression::literal(Value::from(1)));
    }
    let found = terms.len();
    let [lhs, rhs]: [Expression; 2] = terms
        .try_into()
        .map_err(|_| CompileError::wrong_arity(c.op, "2", found, c.source))?;
    Ok(Expression::new(Expr::Binary(BinaryExpr {
        op,
        lhs,
        rhs,
        default: param(c, "default")?,
    })))
}

fn multi(c: &Call, op: MultiOp, nulls_by_default: bool) -> Result<Expression, CompileError> {
    let terms = operands(c)?;
    if terms.is_empty() {
        return Err(CompileError::wrong_arity(c.op, "at least 1", 0, c.source));
    }
    let nulls = match c.params.get("nulls") {
        Some(Value::Bool(b)) => *b,
        Some(_) => {
            return Err(CompileError::malformed(c.op, "`nulls` must be a boolean", c.source))
        }
        None => nulls_by_default,
    };
    Ok(Expression::new(Expr::Multi(MultiExpr {
        op,
        terms,
        nulls,
        default: param(c, "default")?,
    })))
}

fn unary(c: &Call, op: UnaryOp) -> Result<Expression, CompileError> {
    let [term] = exactly::<1>(c)?;
    Ok(Expression::new(Expr::Unary(UnaryExpr { op, term })))
}

fn reduce(c: &Call, op: ReduceOp) -> Result<Expression, CompileError> {
    Ok(Expression::new(Expr::Reduce(ReduceExpr {
        op,
        terms: operands(c)?,
    })))
}

fn pick(c: &Call, op: PickOp) -> Result<Expression, CompileError> {
    let [term] = exactly::<1>(c)?;
    Ok(Expression::new(Expr::Pick(PickExpr { op, term })))
}

fn parse_when(c: &Call) -> Result<Expression, CompileError> {
    Ok(Expression::new(Expr::When(WhenOp {
        when: Expression::from_json(c.operand)?,
        then: param(c, "then")?,
        els: param(c, "else")?,
    })))
}

fn parse_case(c: &Call) -> Result<Expression, CompileError> {
    let Value::Array(items) = c.operand else {
        return Err(CompileError::malformed(c.op, "expected a list of clauses", c.source));
    };
    let mut whens = Vec::new();
    let mut els = Expression::null();
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::Object(clause) if clause.contains_key("when") && clause.contains_key("then") => {
                whens.push((
                    Expression::from_json(&clause["when"])?,
                    Expression::from_json(&clause["then"])?,
                ));
            }
            other if i + 1 == items.len() => els = Expression::from_json(other)?,
            _ => {
                return Err(CompileError::malformed(
                    c.op,
                    "only the last entry may be a default",
                    c.source,
                ))
            }
        }
    }
    Ok(Expression::new(Expr::Case(CaseOp { whens, els })))
}

fn cast(c: &Call, op: CastOp) -> Result<Expression, CompileError> {
    let [term] = exactly::<1>(c)?;
    Ok(Expression::new(Expr::Cast(CastExpr { op, term })))
}

fn parse_concat(c: &Call) -> Result<Expression, CompileError> {
    let separator = match c.params.get("separator") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(_) => {
            return Err(CompileError::malformed(c.op, "`separator` must be a string", c.source))
        }
    };
    Ok(Expression::new(Expr::Concat(ConcatOp {
        terms: operands(c)?,
        separator,
        default: param(c, "default")?,
    })))
}

fn string_unary(c: &Call, op: StringUnaryOp) -> Result<Expression, CompileError> {
    let [term] = exactly::<1>(c)?;
    Ok(Expression::new(Expr::StringUnary(StringUnaryExpr { op, term })))
}

fn slice(c: &Call, op: SliceOp) -> Result<Expression, CompileError> {
    let [value, length] = exactly::<2>(c)?;
    Ok(Expression::new(Expr::Slice(SliceExpr { op, value, length })))
}

fn affix(c: &Call, op: AffixOp) -> Result<Expression, CompileError> {
    let [value, affix] = exactly::<2>(c)?;
    Ok(Expression::new(Expr::Affix(AffixExpr { op, value, affix })))
}

fn parse_find(c: &Call) -> Result<Expression, CompileError> {
    let [value, find] = exactly::<2>(c)?;
    let start = match c.params.get("start") {
        Some(v) => Expression::from_json(v)?,
        None => Expression::literal(Value::from(0)),
    };
    Ok(Expression::new(Expr::Find(FindOp {
        value,
        find,
        start,
        default: param(c, "default")?,
    })))
}

fn parse_between(c: &Call) -> Result<Expression, CompileError> {
    let (value, prefix, suffix) = match c.operand {
        Value::Object(map) if map.len() == 1 && !is_expression_object(map) => {
            let (var, bounds) = map.iter().next().ok_or_else(|| {
                CompileError::malformed(c.op, "expected {var: [prefix, suffix]}", c.source)
            })?;
            match bounds {
                Value::Array(pair) if pair.len() == 2 => (
                    parse_path(var),
                    Expression::literal(pair[0].clone()),
                    Expression::literal(pair[1].clone()),
                ),
                _ => {
                    return Err(CompileError::malformed(
                        c.op,
                        "expected {var: [prefix, suffix]}",
                        c.source,
                    ))
                }
            }
        }
        _ => {
            let [value, prefix, suffix] = exactly::<3>(c)?;
            (value, prefix, suffix)
        }
    };
    let start = match c.params.get("start") {
        Some(v) => Expression::from_json(v)?,
        None => Expression::literal(Value::from(0)),
    };
    Ok(Expression::new(Expr::Between(BetweenOp {
        value,
        prefix,
        suffix,
        start,
        default: param(c, "default")?,
    })))
}

fn parse_regexp(c: &Call) -> Result<Expression, CompileError> {
    let [value, pattern] = exactly::<2>(c)?;
    if let Some(Value::String(p)) = pattern.as_literal() {
        RegExpOp::compile(p).map_err(|e| CompileError::malformed(c.op, e.to_string(), c.source))?;
    }
    Ok(Expression::new(Expr::RegExp(RegExpOp { value, pattern })))
}

// ------------------------------------------------------------------ serialization

fn with_default(mut out: Value, default: &Expression) -> Value {
    if !default.is_null() {
        if let Value::Object(map) = &mut out {
            map.insert("default".to_string(), default.to_json());
        }
    }
    out
}

fn list(terms: &[Expression]) -> Value {
    Value::Array(terms.iter().map(|t| t.to_json()).collect())
}

fn to_json(e: &Expression) -> Value {
    match e.node() {
        Expr::Literal(lit) => match &lit.value {
            Value::String(_) | Value::Array(_) | Value::Object(_) => json!({"literal": lit.value}),
            other => other.clone(),
        },
        Expr::Variable(v) => Value::String(v.var.clone()),
        Expr::Leaves(l) if l.prefix == "." => Value::String("*".to_string()),
        Expr::Leaves(l) => Value::String(format!("{}.*", l.prefix)),
        Expr::Date(d) => json!({"date": d.seconds}),
        Expr::Tuple(t) => json!({"tuple": list(&t.terms)}),
        Expr::Not(n) => json!({"not": n.term.to_json()}),
        Expr::And(a) => json!({"and": list(&a.terms)}),
        Expr::Or(o) => json!({"or": list(&o.terms)}),
        Expr::Missing(m) => json!({"missing": m.term.to_json()}),
        Expr::Exists(x) => json!({"exists": x.term.to_json()}),
        Expr::In(i) => json!({"in": [i.value.to_json(), i.superset.to_json()]}),
        Expr::Compare(c) => {
            let mut map = Map::new();
            map.insert(c.op.name().to_string(), json!([c.lhs.to_json(), c.rhs.to_json()]));
            Value::Object(map)
        }
        Expr::Binary(b) => {
            let mut map = Map::new();
            map.insert(b.op.name().to_string(), json!([b.lhs.to_json(), b.rhs.to_json()]));
            with_default(Value::Object(map), &b.default)
        }
        Expr::Multi(m) => {
            let mut map = Map::new();
            map.insert(m.op.name().to_string(), list(&m.terms));
            if m.nulls {
                map.insert("nulls".to_string(), Value::Bool(true));
            }
            with_default(Value::Object(map), &m.default)
        }
        Expr::Unary(u) => match u.op {
            UnaryOp::Abs => json!({"abs": u.term.to_json()}),
            UnaryOp::Neg => json!({"neg": u.term.to_json()}),
        },
        Expr::Reduce(r) => {
            let mut map = Map::new();
            map.insert(r.op.name().to_string(), list(&r.terms));
            Value::Object(map)
        }
        Expr::Coalesce(c) => json!({"coalesce": list(&c.terms)}),
        Expr::Pick(p) => match p.op {
            PickOp::First => json!({"first": p.term.to_json()}),
            PickOp::Last => json!({"last": p.term.to_json()}),
        },
        Expr::When(w) => {
            json!({"when": w.when.to_json(), "then": w.then.to_json(), "else": w.els.to_json()})
        }
        Expr::Case(c) => {
            let mut clauses: Vec<Value> = c
                .whens
                .iter()
                .map(|(w, t)| json!({"when": w.to_json(), "then": t.to_json()}))
                .collect();
            clauses.push(c.els.to_json());
            json!({ "case": clauses })
        }
        Expr::Cast(c) => {
            let name = match c.op {
                CastOp::String => "string",
                CastOp::Number => "number",
                CastOp::Integer => "integer",
                CastOp::Boolean => "boolean",
            };
            let mut map = Map::new();
            map.insert(name.to_string(), c.term.to_json());
            Value::Object(map)
        }
        Expr::Concat(c) => {
            let mut out = json!({"concat": list(&c.terms)});
            if !c.separator.is_empty() {
                out["separator"] = Value::String(c.separator.clone());
            }
            with_default(out, &c.default)
        }
        Expr::StringUnary(s) => {
            let mut map = Map::new();
            map.insert(s.op.name().to_string(), s.term.to_json());
            Value::Object(map)
        }
        Expr::Slice(s) => {
            let mut map = Map::new();
            map.insert(
                s.op.name().to_string(),
                json!([s.value.to_json(), s.length.to_json()]),
            );
            Value::Object(map)
        }
        Expr::Affix(a) => {
            let name = match a.op {
                AffixOp::Prefix => "prefix",
                AffixOp::Suffix => "suffix",
            };
            let mut map = Map::new();
            map.insert(name.to_string(), json!([a.value.to_json(), a.affix.to_json()]));
            Value::Object(map)
        }
        Expr::Find(f) => with_default(
            json!({"find": [f.value.to_json(), f.find.to_json()], "start": f.start.to_json()}),
            &f.default,
        ),
        Expr::Between(b) => with_default(
            json!({
                "between": [b.value.to_json(), b.prefix.to_json(), b.suffix.to_json()],
                "start": b.start.to_json()
            }),
            &b.default,
        ),
        Expr::RegExp(r) => json!({"regexp": [r.value.to_json(), r.pattern.to_json()]}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorthand_and_list_forms_agree() {
        let short = Expression::from_json(&json!({"gt": {"a": 3}})).unwrap();
        let long = Expression::from_json(&json!({"gt": ["a", 3]})).unwrap();
        assert_eq!(short, long);
    }

    #[test]
    fn test_shorthand_value_is_literal() {
        let e = Expression::from_json(&json!({"eq": {"a": "b"}})).unwrap();
        match e.node() {
            Expr::Compare(c) => {
                assert_eq!(c.lhs.as_variable(), Some("a"));
                assert_eq!(c.rhs.as_literal(), Some(&json!("b")));
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_key_eq_is_conjunction() {
        let e = Expression::from_json(&json!({"eq": {"a": 1, "b": 2}})).unwrap();
        assert!(matches!(e.node(), Expr::And(a) if a.terms.len() == 2));
    }

    #[test]
    fn test_unknown_operator() {
        let err = Expression::from_json(&json!({"frobnicate": ["a"]})).unwrap_err();
        assert!(matches!(err, CompileError::UnknownOperator { ref op, .. } if op == "frobnicate"));
    }

    #[test]
    fn test_wrong_arity() {
        let err = Expression::from_json(&json!({"gt": ["a", 1, 2]})).unwrap_err();
        assert!(matches!(err, CompileError::WrongArity { found: 3, .. }));
        let err = Expression::from_json(&json!({"not": ["a", "b"]})).unwrap_err();
        assert!(matches!(err, CompileError::WrongArity { found: 2, .. }));
    }

    #[test]
    fn test_bad_regexp_is_rejected() {
        let err = Expression::from_json(&json!({"regexp": {"a": "(unclosed"}})).unwrap_err();
        assert!(matches!(err, CompileError::Malformed { .. }));
    }

    #[test]
    fn test_serialization_parses_back() {
        let sources = vec![
            json!({"and": [{"eq": {"a": "x"}}, {"gt": ["b.c", 2]}]}),
            json!({"when": {"missing": "a"}, "then": 0, "else": {"div": ["a", "b"], "default": -1}}),
            json!({"case": [{"when": {"lt": {"a": 0}}, "then": {"literal": "neg"}}, {"literal": "pos"}]}),
            json!({"concat": ["a", "b"], "separator": "-"}),
            json!({"between": {"a": ["<", ">"]}, "start": 1}),
            json!({"sum": ["a", "b"], "default": 0}),
            json!({"in": {"a": [1, 2, 3]}}),
            json!("a.*"),
        ];
        for source in sources {
            let e = Expression::from_json(&source).unwrap();
            let again = Expression::from_json(&e.to_json()).unwrap();
            assert_eq!(e, again, "serialization of {} did not parse back", source);
        }
    }

    #[test]
    fn test_date_literal() {
        let e = Expression::from_json(&json!({"date": "1970-01-02"})).unwrap();
        assert_eq!(e.node(), &Expr::Date(DateLiteral { seconds: 86_400.0 }));
        assert!(Expression::from_json(&json!({"date": "not a date"})).is_err());
    }
}
