//! Comparison operators.
//!
//! `eq` follows null semantics (two missing values are equal) and is never missing itself;
//! `ne` is `not(eq)`. The inequalities are missing whenever either side is.

use std::cmp::Ordering;

use serde_json::Value;

use super::boolean_ops::AndOp;
use super::literal::{compare_values, values_equal};
use super::{Dialect, Expr, Expression, Operator};
use crate::jx_type::JsonType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn is_inequality(self) -> bool {
        matches!(self, CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte)
    }

    /// `not(a op b)` as `a op' b`, valid for the inequalities.
    pub fn negated(self) -> CompareOp {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Gt => CompareOp::Lte,
            CompareOp::Gte => CompareOp::Lt,
            CompareOp::Lt => CompareOp::Gte,
            CompareOp::Lte => CompareOp::Gt,
        }
    }

    /// `a op b` as `b op' a`.
    pub fn flipped(self) -> CompareOp {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Gte => CompareOp::Lte,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Lte => CompareOp::Gte,
            other => other,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        }
    }

    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Gte => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Lte => ordering != Ordering::Greater,
        }
    }

    /// Evaluate on two values: `None` means missing.
    pub fn apply(self, lhs: &Value, rhs: &Value) -> Option<bool> {
        match self {
            CompareOp::Eq => Some(values_equal(lhs, rhs)),
            CompareOp::Ne => Some(!values_equal(lhs, rhs)),
            op => compare_values(lhs, rhs).map(|ordering| op.accepts(ordering)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompareExpr {
    pub op: CompareOp,
    pub lhs: Expression,
    pub rhs: Expression,
}

impl CompareExpr {
    fn simplify_eq<D: Dialect>(lhs: Expression, rhs: Expression) -> Expression {
        if let (Some(l), Some(r)) = (lhs.as_literal(), rhs.as_literal()) {
            return Expression::boolean(values_equal(l, r));
        }
        if rhs.is_null() {
            return Expression::is_missing(lhs).partial_eval::<D>();
        }
        if lhs.is_null() {
            return Expression::is_missing(rhs).partial_eval::<D>();
        }
        if lhs == rhs {
            return Expression::boolean(true);
        }
        let (lhs, rhs) = if lhs.as_literal().is_some() {
            (rhs, lhs)
        } else {
            (lhs, rhs)
        };
        if lhs.type_hint() == JsonType::Boolean {
            match rhs.as_literal() {
                Some(Value::Bool(false)) => {
                    return two_valued(Expression::negate(lhs)).partial_eval::<D>();
                }
                Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {
                    return two_valued(Expression::negate(lhs)).partial_eval::<D>();
                }
                Some(Value::Bool(true)) => return two_valued(lhs).partial_eval::<D>(),
                Some(Value::Number(n)) if n.as_f64() == Some(1.0) => {
                    return two_valued(lhs).partial_eval::<D>();
                }
                _ => {}
            }
        }
        Expression::new(Expr::Compare(CompareExpr {
            op: CompareOp::Eq,
            lhs,
            rhs,
        }))
    }
}

/// Wrap in a one-term `and` so a missing value reads as false.
fn two_valued(term: Expression) -> Expression {
    Expression::new(Expr::And(AndOp { terms: vec![term] }))
}

impl Operator for CompareExpr {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.lhs, &self.rhs]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Compare(CompareExpr {
            op: self.op,
            lhs: f(&self.lhs),
            rhs: f(&self.rhs),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let lhs = self.lhs.partial_eval::<D>();
        let rhs = self.rhs.partial_eval::<D>();
        match self.op {
            CompareOp::Eq => CompareExpr::simplify_eq::<D>(lhs, rhs),
            CompareOp::Ne => {
                Expression::negate(CompareExpr::simplify_eq::<D>(lhs, rhs)).partial_eval::<D>()
            }
            op => {
                if lhs.is_null() || rhs.is_null() {
                    return Expression::null();
                }
                if let (Some(l), Some(r)) = (lhs.as_literal(), rhs.as_literal()) {
                    return match op.apply(l, r) {
                        Some(b) => Expression::boolean(b),
                        None => Expression::null(),
                    };
                }
                let (op, lhs, rhs) = if lhs.as_literal().is_some() {
                    (op.flipped(), rhs, lhs)
                } else {
                    (op, lhs, rhs)
                };
                Expression::new(Expr::Compare(CompareExpr { op, lhs, rhs }))
            }
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        match self.op {
            CompareOp::Eq | CompareOp::Ne => Expression::boolean(false),
            _ => Expression::any(vec![self.lhs.missing::<D>(), self.rhs.missing::<D>()]),
        }
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}
