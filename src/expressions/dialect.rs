//! Target dialects.
//!
//! A dialect is chosen by type parameter when an expression is simplified
//! (`expr.partial_eval::<SqlLang>()`). The result carries a marker naming the dialect, so a
//! second simplification for the same dialect is a no-op. Dialect-specific rewrites live in
//! `Dialect::lower`, applied after the shared algebraic rules.

use serde_json::Value;

use super::boolean_ops::{MissingOp, NotOp};
use super::compare_ops::{CompareExpr, CompareOp};
use super::misc_ops::CastOp;
use super::{Expr, Expression};
use crate::jx_type::JsonType;

pub trait Dialect: 'static {
    const NAME: &'static str;

    /// Rewrite a simplified node into a form this dialect compiles directly.
    fn lower(expr: &Expression) -> Option<Expression> {
        let _ = expr;
        None
    }
}

/// Plain jx: simplification only.
pub struct JxLang;

impl Dialect for JxLang {
    const NAME: &'static str = "jx";
}

/// SQLite text.
pub struct SqlLang;

impl Dialect for SqlLang {
    const NAME: &'static str = "sql";

    fn lower(expr: &Expression) -> Option<Expression> {
        match expr.node() {
            // columns hold scalars; first/last of a scalar is the scalar
            Expr::Pick(pick) => Some(pick.term.clone()),
            Expr::In(op) => match op.superset.as_literal() {
                Some(Value::Array(items)) if items.len() == 1 => {
                    Some(Expression::new(Expr::Compare(CompareExpr {
                        op: CompareOp::Eq,
                        lhs: op.value.clone(),
                        rhs: Expression::literal(items[0].clone()),
                    })))
                }
                _ => None,
            },
            Expr::Exists(op) => Some(Expression::new(Expr::Not(NotOp {
                term: Expression::new(Expr::Missing(MissingOp {
                    term: op.term.clone(),
                })),
            }))),
            Expr::Cast(cast) => {
                let hint = cast.term.type_hint();
                let already = match cast.op {
                    CastOp::String => hint == JsonType::String,
                    CastOp::Number => matches!(hint, JsonType::Number | JsonType::Integer),
                    CastOp::Integer => hint == JsonType::Integer,
                    CastOp::Boolean => hint == JsonType::Boolean,
                };
                already.then(|| cast.term.clone())
            }
            _ => None,
        }
    }
}

/// In-process evaluation over JSON documents.
pub struct NativeLang;

impl Dialect for NativeLang {
    const NAME: &'static str = "native";
}
