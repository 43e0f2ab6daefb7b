//! Leaves of the tree and the conditional/selection operators.

use serde_json::Value;

use super::literal::{as_f64, is_null_value, number_value, truthy, value_to_string};
use super::{simplify_all, Dialect, Expr, Expression, Operator};
use crate::jx_type::JsonType;

#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub value: Value,
}

impl Operator for Literal {
    fn children(&self) -> Vec<&Expression> {
        Vec::new()
    }

    fn rebuild(&self, _f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Literal(self.clone())
    }

    fn simplify<D: Dialect>(&self, this: &Expression) -> Expression {
        this.clone()
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(is_null_value(&self.value))
    }

    fn type_hint(&self) -> JsonType {
        JsonType::of_value(&self.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub var: String,
}

impl Operator for Variable {
    fn children(&self) -> Vec<&Expression> {
        Vec::new()
    }

    fn rebuild(&self, _f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Variable(self.clone())
    }

    fn simplify<D: Dialect>(&self, this: &Expression) -> Expression {
        this.clone()
    }

    fn missing<D: Dialect>(&self, this: &Expression) -> Expression {
        Expression::is_missing(this.clone())
    }

    fn type_hint(&self) -> JsonType {
        JsonType::IsNull
    }
}

/// Every leaf column under a prefix (`a.*`).
#[derive(Debug, Clone, PartialEq)]
pub struct Leaves {
    pub prefix: String,
}

impl Operator for Leaves {
    fn children(&self) -> Vec<&Expression> {
        Vec::new()
    }

    fn rebuild(&self, _f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Leaves(self.clone())
    }

    fn simplify<D: Dialect>(&self, this: &Expression) -> Expression {
        this.clone()
    }

    fn missing<D: Dialect>(&self, this: &Expression) -> Expression {
        Expression::is_missing(this.clone())
    }

    fn type_hint(&self) -> JsonType {
        JsonType::IsNull
    }
}

/// A point in time, in Unix seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct DateLiteral {
    pub seconds: f64,
}

impl Operator for DateLiteral {
    fn children(&self) -> Vec<&Expression> {
        Vec::new()
    }

    fn rebuild(&self, _f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Date(self.clone())
    }

    fn simplify<D: Dialect>(&self, this: &Expression) -> Expression {
        this.clone()
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TupleOp {
    pub terms: Vec<Expression>,
}

impl Operator for TupleOp {
    fn children(&self) -> Vec<&Expression> {
        self.terms.iter().collect()
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Tuple(TupleOp {
            terms: self.terms.iter().map(|t| f(t)).collect(),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::new(Expr::Tuple(TupleOp {
            terms: simplify_all::<D>(&self.terms),
        }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(self.terms.is_empty())
    }

    fn type_hint(&self) -> JsonType {
        JsonType::IsNull
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoalesceOp {
    pub terms: Vec<Expression>,
}

impl Operator for CoalesceOp {
    fn children(&self) -> Vec<&Expression> {
        self.terms.iter().collect()
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Coalesce(CoalesceOp {
            terms: self.terms.iter().map(|t| f(t)).collect(),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let mut terms = Vec::new();
        for term in simplify_all::<D>(&self.terms) {
            if term.is_null() || terms.contains(&term) {
                continue;
            }
            let always_present = term.missing_simplified::<D>().is_false();
            terms.push(term);
            if always_present {
                break;
            }
        }
        match terms.len() {
            0 => Expression::null(),
            1 => terms.remove(0),
            _ => Expression::new(Expr::Coalesce(CoalesceOp { terms })),
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::all(self.terms.iter().map(|t| t.missing::<D>()).collect())
    }

    fn type_hint(&self) -> JsonType {
        first_known_type(self.terms.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOp {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickExpr {
    pub op: PickOp,
    pub term: Expression,
}

impl Operator for PickExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.term]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Pick(PickExpr {
            op: self.op,
            term: f(&self.term),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let term = self.term.partial_eval::<D>();
        let picked = match term.node() {
            Expr::Tuple(tuple) => Some(match self.op {
                PickOp::First => tuple.terms.first().cloned().unwrap_or_else(Expression::null),
                PickOp::Last => tuple.terms.last().cloned().unwrap_or_else(Expression::null),
            }),
            Expr::Literal(lit) => Some(match &lit.value {
                Value::Array(items) => Expression::literal(
                    match self.op {
                        PickOp::First => items.first(),
                        PickOp::Last => items.last(),
                    }
                    .cloned()
                    .unwrap_or(Value::Null),
                ),
                _ => term.clone(),
            }),
            _ => None,
        };
        match picked {
            Some(p) => p.partial_eval::<D>(),
            None => Expression::new(Expr::Pick(PickExpr { op: self.op, term })),
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        self.term.missing::<D>()
    }

    fn type_hint(&self) -> JsonType {
        self.term.type_hint()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhenOp {
    pub when: Expression,
    pub then: Expression,
    pub els: Expression,
}

impl Operator for WhenOp {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.when, &self.then, &self.els]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::When(WhenOp {
            when: f(&self.when),
            then: f(&self.then),
            els: f(&self.els),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let when = self.when.partial_eval::<D>();
        if when.is_true() {
            return self.then.partial_eval::<D>();
        }
        if when.is_false() || when.is_null() {
            return self.els.partial_eval::<D>();
        }
        let then = self.then.partial_eval::<D>();
        let els = self.els.partial_eval::<D>();

        if then.missing_simplified::<D>().is_true() {
            if els.missing_simplified::<D>().is_true() {
                return Expression::null();
            }
            // the else branch still applies only when the condition fails
            let inverted = Expression::negate(Expression::all(vec![when]));
            return Expression::new(Expr::When(WhenOp {
                when: inverted,
                then: els,
                els: Expression::null(),
            }))
            .partial_eval::<D>();
        }
        if then == els {
            return then;
        }
        Expression::new(Expr::When(WhenOp { when, then, els }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::new(Expr::When(WhenOp {
            when: self.when.clone(),
            then: self.then.missing::<D>(),
            els: self.els.missing::<D>(),
        }))
    }

    fn type_hint(&self) -> JsonType {
        first_known_type([&self.then, &self.els].into_iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseOp {
    pub whens: Vec<(Expression, Expression)>,
    pub els: Expression,
}

impl Operator for CaseOp {
    fn children(&self) -> Vec<&Expression> {
        let mut out = Vec::with_capacity(self.whens.len() * 2 + 1);
        for (when, then) in &self.whens {
            out.push(when);
            out.push(then);
        }
        out.push(&self.els);
        out
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Case(CaseOp {
            whens: self.whens.iter().map(|(w, t)| (f(w), f(t))).collect(),
            els: f(&self.els),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let mut whens = Vec::new();
        let mut els = self.els.clone();
        for (when, then) in &self.whens {
            let when = when.partial_eval::<D>();
            if when.is_false() || when.is_null() {
                continue;
            }
            if when.is_true() {
                els = then.clone();
                break;
            }
            whens.push((when, then.partial_eval::<D>()));
        }
        let els = els.partial_eval::<D>();
        match whens.len() {
            0 => els,
            1 => {
                let (when, then) = whens.remove(0);
                Expression::new(Expr::When(WhenOp { when, then, els })).partial_eval::<D>()
            }
            _ => Expression::new(Expr::Case(CaseOp { whens, els })),
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::new(Expr::Case(CaseOp {
            whens: self
                .whens
                .iter()
                .map(|(w, t)| (w.clone(), t.missing::<D>()))
                .collect(),
            els: self.els.missing::<D>(),
        }))
    }

    fn type_hint(&self) -> JsonType {
        first_known_type(self.whens.iter().map(|(_, t)| t).chain([&self.els]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    String,
    Number,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CastExpr {
    pub op: CastOp,
    pub term: Expression,
}

impl CastExpr {
    pub fn cast_value(op: CastOp, value: &Value) -> Value {
        match op {
            CastOp::String => value_to_string(value).map(Value::String).unwrap_or(Value::Null),
            CastOp::Number => parse_number(value).map(number_value).unwrap_or(Value::Null),
            CastOp::Integer => parse_number(value)
                .map(|f| number_value(f.trunc()))
                .unwrap_or(Value::Null),
            CastOp::Boolean => truthy(value).map(Value::Bool).unwrap_or(Value::Null),
        }
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => as_f64(other),
    }
}

impl Operator for CastExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.term]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Cast(CastExpr {
            op: self.op,
            term: f(&self.term),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let term = self.term.partial_eval::<D>();
        if let Some(value) = term.as_literal() {
            return Expression::literal(CastExpr::cast_value(self.op, value));
        }
        Expression::new(Expr::Cast(CastExpr { op: self.op, term }))
    }

    fn missing<D: Dialect>(&self, this: &Expression) -> Expression {
        match self.op {
            CastOp::String | CastOp::Boolean => self.term.missing::<D>(),
            // unparseable text has no number
            CastOp::Number | CastOp::Integer => Expression::is_missing(this.clone()),
        }
    }

    fn type_hint(&self) -> JsonType {
        match self.op {
            CastOp::String => JsonType::String,
            CastOp::Number => JsonType::Number,
            CastOp::Integer => JsonType::Integer,
            CastOp::Boolean => JsonType::Boolean,
        }
    }
}

fn first_known_type<'a>(terms: impl Iterator<Item = &'a Expression>) -> JsonType {
    terms
        .map(|t| t.type_hint())
        .find(|t| *t != JsonType::IsNull)
        .unwrap_or(JsonType::IsNull)
}
