//! String operators. Positions are zero-based and count characters, not bytes.

use regex::Regex;
use serde_json::Value;

use super::literal::{as_f64, value_to_string};
use super::{simplify_all, Dialect, Expr, Expression, Operator};
use crate::jx_type::JsonType;

fn literal_string(e: &Expression) -> Option<String> {
    e.as_literal().and_then(value_to_string)
}

fn literal_count(e: &Expression) -> Option<usize> {
    e.as_literal()
        .and_then(as_f64)
        .map(|f| if f <= 0.0 { 0 } else { f as usize })
}

fn text(s: String) -> Expression {
    Expression::literal(Value::String(s))
}

/// Join present terms with `separator`; `default` when every term is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatOp {
    pub terms: Vec<Expression>,
    pub separator: String,
    pub default: Expression,
}

impl Operator for ConcatOp {
    fn children(&self) -> Vec<&Expression> {
        self.terms.iter().chain([&self.default]).collect()
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Concat(ConcatOp {
            terms: self.terms.iter().map(|t| f(t)).collect(),
            separator: self.separator.clone(),
            default: f(&self.default),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let default = self.default.partial_eval::<D>();
        let terms: Vec<Expression> = simplify_all::<D>(&self.terms)
            .into_iter()
            .filter(|t| !t.is_null())
            .collect();
        if terms.is_empty() {
            return default;
        }
        let literals: Option<Vec<String>> = terms.iter().map(literal_string).collect();
        if let Some(parts) = literals {
            return text(parts.join(&self.separator));
        }
        Expression::new(Expr::Concat(ConcatOp {
            terms,
            separator: self.separator.clone(),
            default,
        }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::all(vec![
            Expression::all(self.terms.iter().map(|t| t.missing::<D>()).collect()),
            self.default.missing::<D>(),
        ])
    }

    fn type_hint(&self) -> JsonType {
        JsonType::String
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringUnaryOp {
    Length,
    Lower,
    Upper,
    Trim,
}

impl StringUnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            StringUnaryOp::Length => "length",
            StringUnaryOp::Lower => "lower",
            StringUnaryOp::Upper => "upper",
            StringUnaryOp::Trim => "trim",
        }
    }

    pub fn apply(self, s: &str) -> Value {
        match self {
            StringUnaryOp::Length => Value::from(s.chars().count()),
            StringUnaryOp::Lower => Value::String(s.to_lowercase()),
            StringUnaryOp::Upper => Value::String(s.to_uppercase()),
            StringUnaryOp::Trim => Value::String(s.trim().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringUnaryExpr {
    pub op: StringUnaryOp,
    pub term: Expression,
}

impl Operator for StringUnaryExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.term]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::StringUnary(StringUnaryExpr {
            op: self.op,
            term: f(&self.term),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let term = self.term.partial_eval::<D>();
        if term.is_null() {
            return Expression::null();
        }
        if let Some(s) = literal_string(&term) {
            return Expression::literal(self.op.apply(&s));
        }
        Expression::new(Expr::StringUnary(StringUnaryExpr { op: self.op, term }))
    }

    fn missing<D: Dialect>(&self, this: &Expression) -> Expression {
        match self.op {
            // an all-blank string trims to nothing
            StringUnaryOp::Trim => Expression::is_missing(this.clone()),
            _ => self.term.missing::<D>(),
        }
    }

    fn type_hint(&self) -> JsonType {
        match self.op {
            StringUnaryOp::Length => JsonType::Integer,
            _ => JsonType::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceOp {
    Left,
    Right,
    NotLeft,
    NotRight,
}

impl SliceOp {
    pub fn name(self) -> &'static str {
        match self {
            SliceOp::Left => "left",
            SliceOp::Right => "right",
            SliceOp::NotLeft => "not_left",
            SliceOp::NotRight => "not_right",
        }
    }

    pub fn apply(self, s: &str, n: usize) -> String {
        let chars: Vec<char> = s.chars().collect();
        let n = n.min(chars.len());
        let kept = match self {
            SliceOp::Left => &chars[..n],
            SliceOp::Right => &chars[chars.len() - n..],
            SliceOp::NotLeft => &chars[n..],
            SliceOp::NotRight => &chars[..chars.len() - n],
        };
        kept.iter().collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SliceExpr {
    pub op: SliceOp,
    pub value: Expression,
    pub length: Expression,
}

impl Operator for SliceExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.value, &self.length]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Slice(SliceExpr {
            op: self.op,
            value: f(&self.value),
            length: f(&self.length),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let value = self.value.partial_eval::<D>();
        let length = self.length.partial_eval::<D>();
        if value.is_null() || length.is_null() {
            return Expression::null();
        }
        if let (Some(s), Some(n)) = (literal_string(&value), literal_count(&length)) {
            return text(self.op.apply(&s, n));
        }
        Expression::new(Expr::Slice(SliceExpr {
            op: self.op,
            value,
            length,
        }))
    }

    fn missing<D: Dialect>(&self, this: &Expression) -> Expression {
        Expression::is_missing(this.clone())
    }

    fn type_hint(&self) -> JsonType {
        JsonType::String
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffixOp {
    Prefix,
    Suffix,
}

/// `value` starts (or ends) with `affix`. Missing values never match; a missing affix always does.
#[derive(Debug, Clone, PartialEq)]
pub struct AffixExpr {
    pub op: AffixOp,
    pub value: Expression,
    pub affix: Expression,
}

impl Operator for AffixExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.value, &self.affix]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Affix(AffixExpr {
            op: self.op,
            value: f(&self.value),
            affix: f(&self.affix),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let value = self.value.partial_eval::<D>();
        let affix = self.affix.partial_eval::<D>();
        if affix.is_null() {
            return Expression::boolean(true);
        }
        if value.is_null() {
            return Expression::boolean(false);
        }
        if let (Some(s), Some(a)) = (literal_string(&value), literal_string(&affix)) {
            return Expression::boolean(match self.op {
                AffixOp::Prefix => s.starts_with(&a),
                AffixOp::Suffix => s.ends_with(&a),
            });
        }
        Expression::new(Expr::Affix(AffixExpr {
            op: self.op,
            value,
            affix,
        }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}

/// Position of `find` in `value`, searching from `start`; `default` when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOp {
    pub value: Expression,
    pub find: Expression,
    pub start: Expression,
    pub default: Expression,
}

impl FindOp {
    pub fn apply(s: &str, find: &str, start: usize) -> Option<usize> {
        let tail: String = s.chars().skip(start).collect();
        tail.find(find)
            .map(|byte_offset| tail[..byte_offset].chars().count() + start)
    }
}

impl Operator for FindOp {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.value, &self.find, &self.start, &self.default]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Find(FindOp {
            value: f(&self.value),
            find: f(&self.find),
            start: f(&self.start),
            default: f(&self.default),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let value = self.value.partial_eval::<D>();
        let find = self.find.partial_eval::<D>();
        let start = self.start.partial_eval::<D>();
        let default = self.default.partial_eval::<D>();
        if value.is_null() || find.is_null() {
            return default;
        }
        if let (Some(s), Some(f), Some(n)) = (
            literal_string(&value),
            literal_string(&find),
            literal_count(&start),
        ) {
            return match FindOp::apply(&s, &f, n) {
                Some(index) => Expression::literal(Value::from(index)),
                None => default,
            };
        }
        Expression::new(Expr::Find(FindOp {
            value,
            find,
            start,
            default,
        }))
    }

    fn missing<D: Dialect>(&self, this: &Expression) -> Expression {
        Expression::is_missing(this.clone())
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Integer
    }
}

/// Text between the first `prefix` (at or after `start`) and the next `suffix`.
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenOp {
    pub value: Expression,
    pub prefix: Expression,
    pub suffix: Expression,
    pub start: Expression,
    pub default: Expression,
}

impl BetweenOp {
    pub fn apply(s: &str, prefix: &str, suffix: &str, start: usize) -> Option<String> {
        let tail: String = s.chars().skip(start).collect();
        let begin = tail.find(prefix)? + prefix.len();
        let rest = &tail[begin..];
        let end = rest.find(suffix)?;
        let found = &rest[..end];
        (!found.is_empty()).then(|| found.to_string())
    }
}

impl Operator for BetweenOp {
    fn children(&self) -> Vec<&Expression> {
        vec![
            &self.value,
            &self.prefix,
            &self.suffix,
            &self.start,
            &self.default,
        ]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Between(BetweenOp {
            value: f(&self.value),
            prefix: f(&self.prefix),
            suffix: f(&self.suffix),
            start: f(&self.start),
            default: f(&self.default),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let value = self.value.partial_eval::<D>();
        let prefix = self.prefix.partial_eval::<D>();
        let suffix = self.suffix.partial_eval::<D>();
        let start = self.start.partial_eval::<D>();
        let default = self.default.partial_eval::<D>();
        if value.is_null() || prefix.is_null() || suffix.is_null() {
            return default;
        }
        if let (Some(s), Some(p), Some(x), Some(n)) = (
            literal_string(&value),
            literal_string(&prefix),
            literal_string(&suffix),
            literal_count(&start),
        ) {
            return match BetweenOp::apply(&s, &p, &x, n) {
                Some(found) => text(found),
                None => default,
            };
        }
        Expression::new(Expr::Between(BetweenOp {
            value,
            prefix,
            suffix,
            start,
            default,
        }))
    }

    fn missing<D: Dialect>(&self, this: &Expression) -> Expression {
        Expression::is_missing(this.clone())
    }

    fn type_hint(&self) -> JsonType {
        JsonType::String
    }
}

/// Whole-string regular expression match.
#[derive(Debug, Clone, PartialEq)]
pub struct RegExpOp {
    pub value: Expression,
    pub pattern: Expression,
}

impl RegExpOp {
    pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
        Regex::new(&format!("^(?:{})$", pattern))
    }
}

impl Operator for RegExpOp {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.value, &self.pattern]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::RegExp(RegExpOp {
            value: f(&self.value),
            pattern: f(&self.pattern),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let value = self.value.partial_eval::<D>();
        let pattern = self.pattern.partial_eval::<D>();
        if value.is_null() || pattern.is_null() {
            return Expression::boolean(false);
        }
        if let (Some(s), Some(p)) = (literal_string(&value), literal_string(&pattern)) {
            let matched = RegExpOp::compile(&p)
                .map(|re| re.is_match(&s))
                .unwrap_or(false);
            return Expression::boolean(matched);
        }
        Expression::new(Expr::RegExp(RegExpOp { value, pattern }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}
