//! Arithmetic.
//!
//! Binary operators carry a `default` returned when an operand is missing or the operation
//! is undefined (division by zero). Multi-term operators either propagate missing terms or,
//! with `nulls`, skip them.

use serde_json::Value;

use super::literal::{as_f64, number_value};
use super::{simplify_all, Dialect, Expr, Expression, Operator};
use crate::jx_type::JsonType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Sub,
    Div,
    Exp,
    Mod,
    Floor,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Sub => "sub",
            BinaryOp::Div => "div",
            BinaryOp::Exp => "exp",
            BinaryOp::Mod => "mod",
            BinaryOp::Floor => "floor",
        }
    }

    /// Undefined results (zero divisors, NaN) come back as `None`.
    pub fn apply(self, lhs: f64, rhs: f64) -> Option<f64> {
        let result = match self {
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Div if rhs == 0.0 => return None,
            BinaryOp::Div => lhs / rhs,
            BinaryOp::Exp => lhs.powf(rhs),
            BinaryOp::Mod if rhs == 0.0 => return None,
            BinaryOp::Mod => lhs - rhs * (lhs / rhs).floor(),
            BinaryOp::Floor if rhs == 0.0 => return None,
            BinaryOp::Floor => (lhs / rhs).floor() * rhs,
        };
        result.is_finite().then_some(result)
    }

    fn has_zero_divisor(self) -> bool {
        matches!(self, BinaryOp::Div | BinaryOp::Mod | BinaryOp::Floor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub lhs: Expression,
    pub rhs: Expression,
    pub default: Expression,
}

impl Operator for BinaryExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.lhs, &self.rhs, &self.default]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Binary(BinaryExpr {
            op: self.op,
            lhs: f(&self.lhs),
            rhs: f(&self.rhs),
            default: f(&self.default),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let lhs = self.lhs.partial_eval::<D>();
        let rhs = self.rhs.partial_eval::<D>();
        let default = self.default.partial_eval::<D>();

        if lhs.is_null() || rhs.is_null() {
            return default;
        }
        if let (Some(l), Some(r)) = (
            lhs.as_literal().and_then(as_f64),
            rhs.as_literal().and_then(as_f64),
        ) {
            return match self.op.apply(l, r) {
                Some(v) => Expression::literal(number_value(v)),
                None => default,
            };
        }
        if self.op.has_zero_divisor() && rhs.as_literal().and_then(as_f64) == Some(0.0) {
            return default;
        }
        Expression::new(Expr::Binary(BinaryExpr {
            op: self.op,
            lhs,
            rhs,
            default,
        }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        let mut undefined = vec![self.lhs.missing::<D>(), self.rhs.missing::<D>()];
        if self.op.has_zero_divisor() {
            undefined.push(Expression::eq(
                self.rhs.clone(),
                Expression::literal(Value::from(0)),
            ));
        }
        Expression::all(vec![
            Expression::any(undefined),
            self.default.missing::<D>(),
        ])
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiOp {
    Add,
    Mul,
}

impl MultiOp {
    pub fn name(self) -> &'static str {
        match self {
            MultiOp::Add => "add",
            MultiOp::Mul => "mul",
        }
    }

    pub fn identity(self) -> f64 {
        match self {
            MultiOp::Add => 0.0,
            MultiOp::Mul => 1.0,
        }
    }

    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            MultiOp::Add => a + b,
            MultiOp::Mul => a * b,
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            MultiOp::Add => "+",
            MultiOp::Mul => "*",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiExpr {
    pub op: MultiOp,
    pub terms: Vec<Expression>,
    /// Skip missing terms instead of propagating them.
    pub nulls: bool,
    pub default: Expression,
}

impl Operator for MultiExpr {
    fn children(&self) -> Vec<&Expression> {
        self.terms.iter().chain([&self.default]).collect()
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Multi(MultiExpr {
            op: self.op,
            terms: self.terms.iter().map(|t| f(t)).collect(),
            nulls: self.nulls,
            default: f(&self.default),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let default = self.default.partial_eval::<D>();
        let mut folded: Option<f64> = None;
        let mut rest = Vec::new();
        for term in simplify_all::<D>(&self.terms) {
            match term.as_literal() {
                Some(value) => match as_f64(value) {
                    Some(f) => {
                        folded = Some(folded.map_or(f, |acc| self.op.combine(acc, f)));
                    }
                    None if self.nulls => continue,
                    None => return default,
                },
                None => rest.push(term),
            }
        }
        if rest.is_empty() {
            return match folded {
                Some(f) => Expression::literal(number_value(f)),
                None => default,
            };
        }
        if let Some(f) = folded {
            // with `nulls`, the constant keeps an all-missing row from becoming missing
            if self.nulls || f != self.op.identity() {
                rest.push(Expression::literal(number_value(f)));
            }
        }
        if rest.len() == 1 && default.is_null() {
            return rest.remove(0);
        }
        Expression::new(Expr::Multi(MultiExpr {
            op: self.op,
            terms: rest,
            nulls: self.nulls,
            default,
        }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        let term_missing: Vec<Expression> = self.terms.iter().map(|t| t.missing::<D>()).collect();
        let undefined = if self.nulls {
            Expression::all(term_missing)
        } else {
            Expression::any(term_missing)
        };
        Expression::all(vec![undefined, self.default.missing::<D>()])
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Abs,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub term: Expression,
}

impl Operator for UnaryExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.term]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Unary(UnaryExpr {
            op: self.op,
            term: f(&self.term),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let term = self.term.partial_eval::<D>();
        if let Some(value) = term.as_literal() {
            return match as_f64(value) {
                Some(f) => Expression::literal(number_value(match self.op {
                    UnaryOp::Abs => f.abs(),
                    UnaryOp::Neg => -f,
                })),
                None => Expression::null(),
            };
        }
        if let Expr::Unary(inner) = term.node() {
            if self.op == UnaryOp::Neg && inner.op == UnaryOp::Neg {
                return inner.term.clone();
            }
            if self.op == UnaryOp::Abs && inner.op == UnaryOp::Abs {
                return term;
            }
        }
        Expression::new(Expr::Unary(UnaryExpr { op: self.op, term }))
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        self.term.missing::<D>()
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Number
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Count,
    Max,
    Min,
}

impl ReduceOp {
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Count => "count",
            ReduceOp::Max => "max",
            ReduceOp::Min => "min",
        }
    }
}

/// Row-level reduction across several terms (not an aggregate over rows).
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceExpr {
    pub op: ReduceOp,
    pub terms: Vec<Expression>,
}

impl Operator for ReduceExpr {
    fn children(&self) -> Vec<&Expression> {
        self.terms.iter().collect()
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Reduce(ReduceExpr {
            op: self.op,
            terms: self.terms.iter().map(|t| f(t)).collect(),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let terms: Vec<Expression> = simplify_all::<D>(&self.terms)
            .into_iter()
            .filter(|t| !t.is_null())
            .collect();
        match self.op {
            ReduceOp::Count => {
                if terms.iter().all(|t| t.as_literal().is_some()) {
                    return Expression::literal(Value::from(terms.len()));
                }
                Expression::new(Expr::Reduce(ReduceExpr {
                    op: self.op,
                    terms,
                }))
            }
            ReduceOp::Max | ReduceOp::Min => {
                let mut folded: Option<f64> = None;
                let mut rest = Vec::new();
                for term in terms {
                    match term.as_literal().and_then(as_f64) {
                        Some(f) => {
                            folded = Some(match (folded, self.op) {
                                (None, _) => f,
                                (Some(acc), ReduceOp::Max) => acc.max(f),
                                (Some(acc), _) => acc.min(f),
                            });
                        }
                        None => rest.push(term),
                    }
                }
                if let Some(f) = folded {
                    rest.push(Expression::literal(number_value(f)));
                }
                match rest.len() {
                    0 => Expression::null(),
                    1 => rest.remove(0),
                    _ => Expression::new(Expr::Reduce(ReduceExpr {
                        op: self.op,
                        terms: rest,
                    })),
                }
            }
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        match self.op {
            ReduceOp::Count => Expression::boolean(false),
            _ => Expression::all(self.terms.iter().map(|t| t.missing::<D>()).collect()),
        }
    }

    fn type_hint(&self) -> JsonType {
        match self.op {
            ReduceOp::Count => JsonType::Integer,
            _ => JsonType::Number,
        }
    }
}
