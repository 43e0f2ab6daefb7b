//! Boolean connectives and the missing/exists/in predicates.
//!
//! `and`/`or` are two-valued: a missing term counts as false and the connective itself is
//! never missing. `not` is three-valued.

use serde_json::Value;

use super::compare_ops::{CompareExpr, CompareOp};
use super::literal::{truthy, values_equal};
use super::{simplify_all, Dialect, Expr, Expression, Operator};
use crate::jx_type::JsonType;

#[derive(Debug, Clone, PartialEq)]
pub struct NotOp {
    pub term: Expression,
}

impl Operator for NotOp {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.term]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Not(NotOp {
            term: f(&self.term),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let term = self.term.partial_eval::<D>();
        match term.node() {
            Expr::Literal(lit) => match truthy(&lit.value) {
                Some(b) => Expression::boolean(!b),
                None => Expression::null(),
            },
            Expr::Not(inner) => inner.term.clone(),
            Expr::Compare(cmp) if cmp.op.is_inequality() => {
                Expression::new(Expr::Compare(CompareExpr {
                    op: cmp.op.negated(),
                    lhs: cmp.lhs.clone(),
                    rhs: cmp.rhs.clone(),
                }))
                .partial_eval::<D>()
            }
            _ => Expression::negate(term),
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        self.term.missing::<D>()
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AndOp {
    pub terms: Vec<Expression>,
}

impl Operator for AndOp {
    fn children(&self) -> Vec<&Expression> {
        self.terms.iter().collect()
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::And(AndOp {
            terms: self.terms.iter().map(|t| f(t)).collect(),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let mut flat = Vec::new();
        for term in simplify_all::<D>(&self.terms) {
            match term.node() {
                Expr::And(inner) => flat.extend(inner.terms.iter().cloned()),
                _ => flat.push(term),
            }
        }
        let mut terms: Vec<Expression> = Vec::new();
        for term in flat {
            if term.is_true() {
                continue;
            }
            if term.is_false() || term.is_null() {
                return Expression::boolean(false);
            }
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        single_or_connective::<D>(terms, true)
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrOp {
    pub terms: Vec<Expression>,
}

impl Operator for OrOp {
    fn children(&self) -> Vec<&Expression> {
        self.terms.iter().collect()
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Or(OrOp {
            terms: self.terms.iter().map(|t| f(t)).collect(),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let mut flat = Vec::new();
        for term in simplify_all::<D>(&self.terms) {
            match term.node() {
                Expr::Or(inner) => flat.extend(inner.terms.iter().cloned()),
                _ => flat.push(term),
            }
        }
        let mut terms: Vec<Expression> = Vec::new();
        for term in flat {
            if term.is_false() || term.is_null() {
                continue;
            }
            if term.is_true() {
                return Expression::boolean(true);
            }
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        single_or_connective::<D>(terms, false)
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}

/// Empty `and` is true, empty `or` is false. A lone term is kept bare only when it can
/// never be missing; otherwise it stays wrapped in a one-term `and`.
fn single_or_connective<D: Dialect>(mut terms: Vec<Expression>, is_and: bool) -> Expression {
    match terms.len() {
        0 => Expression::boolean(is_and),
        1 => {
            let term = terms.remove(0);
            if term.missing_simplified::<D>().is_false() {
                term
            } else {
                Expression::new(Expr::And(AndOp { terms: vec![term] }))
            }
        }
        _ if is_and => Expression::new(Expr::And(AndOp { terms })),
        _ => Expression::new(Expr::Or(OrOp { terms })),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissingOp {
    pub term: Expression,
}

impl Operator for MissingOp {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.term]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Missing(MissingOp {
            term: f(&self.term),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let term = self.term.partial_eval::<D>();
        let missing = term.missing::<D>();
        if let Expr::Missing(inner) = missing.node() {
            if inner.term == term {
                return Expression::is_missing(term);
            }
        }
        missing.partial_eval::<D>()
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExistsOp {
    pub term: Expression,
}

impl Operator for ExistsOp {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.term]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::Exists(ExistsOp {
            term: f(&self.term),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let missing = Expression::is_missing(self.term.clone()).partial_eval::<D>();
        if missing.is_true() {
            return Expression::boolean(false);
        }
        if missing.is_false() {
            return Expression::boolean(true);
        }
        match missing.node() {
            Expr::Missing(inner) => Expression::new(Expr::Exists(ExistsOp {
                term: inner.term.clone(),
            })),
            _ => Expression::negate(missing).partial_eval::<D>(),
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}

/// Membership in a literal set; never missing.
#[derive(Debug, Clone, PartialEq)]
pub struct InOp {
    pub value: Expression,
    pub superset: Expression,
}

impl Operator for InOp {
    fn children(&self) -> Vec<&Expression> {
        vec![&self.value, &self.superset]
    }

    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr {
        Expr::In(InOp {
            value: f(&self.value),
            superset: f(&self.superset),
        })
    }

    fn simplify<D: Dialect>(&self, _this: &Expression) -> Expression {
        let value = self.value.partial_eval::<D>();
        let mut superset = self.superset.partial_eval::<D>();

        if let Expr::Tuple(tuple) = superset.node() {
            let literals: Option<Vec<Value>> =
                tuple.terms.iter().map(|t| t.as_literal().cloned()).collect();
            if let Some(items) = literals {
                superset = Expression::literal(Value::Array(items));
            }
        }

        match superset.as_literal() {
            Some(Value::Null) => Expression::boolean(false),
            Some(Value::Array(items)) => {
                let items: Vec<Value> = items
                    .iter()
                    .filter(|v| !v.is_null())
                    .cloned()
                    .collect();
                if items.is_empty() {
                    return Expression::boolean(false);
                }
                if let Some(v) = value.as_literal() {
                    if v.is_null() {
                        return Expression::boolean(false);
                    }
                    return Expression::boolean(items.iter().any(|item| values_equal(v, item)));
                }
                Expression::new(Expr::In(InOp {
                    value,
                    superset: Expression::literal(Value::Array(items)),
                }))
            }
            Some(_) => Expression::new(Expr::Compare(CompareExpr {
                op: CompareOp::Eq,
                lhs: value,
                rhs: superset,
            }))
            .partial_eval::<D>(),
            None => Expression::new(Expr::In(InOp { value, superset })),
        }
    }

    fn missing<D: Dialect>(&self, _this: &Expression) -> Expression {
        Expression::boolean(false)
    }

    fn type_hint(&self) -> JsonType {
        JsonType::Boolean
    }
}
