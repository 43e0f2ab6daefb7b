//! # jx expression AST
//!
//! An [`Expression`] is an immutable, shareable handle to one operator node ([`Expr`]).
//! Children are owned exclusively by their parent; trees are never mutated after
//! construction.
//!
//! ## Partial evaluation
//!
//! `partial_eval::<D>()` simplifies bottom-up: constant folding, algebraic identities, and
//! missing-value short circuits. The result is a *new* node carrying a marker that names
//! the dialect it was simplified for; simplifying a marked node again returns it unchanged.
//! The marker takes no part in equality.
//!
//! ## Missing values
//!
//! `missing::<D>()` returns an expression that is true exactly when `self` has no value.
//! `null`, `""` and `[]` are all missing. Boolean connectives are two-valued (a missing term
//! counts as false), equality treats two missing values as equal, and the remaining
//! operators propagate missing inputs.

pub mod boolean_ops;
pub mod compare_ops;
pub mod dialect;
pub mod errors;
pub mod literal;
pub mod math_ops;
pub mod misc_ops;
pub mod parse;
pub mod string_ops;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use boolean_ops::{AndOp, ExistsOp, InOp, MissingOp, NotOp, OrOp};
pub use compare_ops::{CompareExpr, CompareOp};
pub use dialect::{Dialect, JxLang, NativeLang, SqlLang};
pub use errors::CompileError;
pub use math_ops::{
    BinaryExpr, BinaryOp, MultiExpr, MultiOp, ReduceExpr, ReduceOp, UnaryExpr, UnaryOp,
};
pub use misc_ops::{
    CaseOp, CastExpr, CastOp, CoalesceOp, DateLiteral, Leaves, Literal, PickExpr, PickOp,
    TupleOp, Variable, WhenOp,
};
pub use string_ops::{
    AffixExpr, AffixOp, BetweenOp, ConcatOp, FindOp, RegExpOp, SliceExpr, SliceOp,
    StringUnaryExpr, StringUnaryOp,
};

use crate::jx_type::JsonType;
use crate::utils::field_path::{concat_field, relative_field, startswith_field};

/// Every operator kind. Each variant wraps the type that implements it.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Variable(Variable),
    Leaves(Leaves),
    Date(DateLiteral),
    Tuple(TupleOp),
    Not(NotOp),
    And(AndOp),
    Or(OrOp),
    Missing(MissingOp),
    Exists(ExistsOp),
    In(InOp),
    Compare(CompareExpr),
    Binary(BinaryExpr),
    Multi(MultiExpr),
    Unary(UnaryExpr),
    Reduce(ReduceExpr),
    Coalesce(CoalesceOp),
    Pick(PickExpr),
    When(WhenOp),
    Case(CaseOp),
    Cast(CastExpr),
    Concat(ConcatOp),
    StringUnary(StringUnaryExpr),
    Slice(SliceExpr),
    Affix(AffixExpr),
    Find(FindOp),
    Between(BetweenOp),
    RegExp(RegExpOp),
}

/// Apply the same body to whichever operator type `$node` holds.
macro_rules! dispatch {
    ($node:expr, $op:ident => $body:expr) => {
        match $node {
            Expr::Literal($op) => $body,
            Expr::Variable($op) => $body,
            Expr::Leaves($op) => $body,
            Expr::Date($op) => $body,
            Expr::Tuple($op) => $body,
            Expr::Not($op) => $body,
            Expr::And($op) => $body,
            Expr::Or($op) => $body,
            Expr::Missing($op) => $body,
            Expr::Exists($op) => $body,
            Expr::In($op) => $body,
            Expr::Compare($op) => $body,
            Expr::Binary($op) => $body,
            Expr::Multi($op) => $body,
            Expr::Unary($op) => $body,
            Expr::Reduce($op) => $body,
            Expr::Coalesce($op) => $body,
            Expr::Pick($op) => $body,
            Expr::When($op) => $body,
            Expr::Case($op) => $body,
            Expr::Cast($op) => $body,
            Expr::Concat($op) => $body,
            Expr::StringUnary($op) => $body,
            Expr::Slice($op) => $body,
            Expr::Affix($op) => $body,
            Expr::Find($op) => $body,
            Expr::Between($op) => $body,
            Expr::RegExp($op) => $body,
        }
    };
}
pub(crate) use dispatch;

/// Behavior shared by every operator type.
pub trait Operator {
    fn children(&self) -> Vec<&Expression>;

    /// Same operator over children produced by `f`.
    fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expr;

    /// One simplification step; children are simplified by the implementation.
    fn simplify<D: Dialect>(&self, this: &Expression) -> Expression;

    /// Expression that is true when this operator yields no value.
    fn missing<D: Dialect>(&self, this: &Expression) -> Expression;

    fn type_hint(&self) -> JsonType;
}

#[derive(Debug, Clone)]
pub struct Expression {
    node: Arc<Expr>,
    simplified: Option<&'static str>,
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node) || self.node == other.node
    }
}

impl Expression {
    pub fn new(expr: Expr) -> Self {
        Expression {
            node: Arc::new(expr),
            simplified: None,
        }
    }

    pub fn node(&self) -> &Expr {
        &self.node
    }

    /// Dialect this node was last simplified for.
    pub fn simplified_for(&self) -> Option<&'static str> {
        self.simplified
    }

    fn marked<D: Dialect>(self) -> Expression {
        Expression {
            node: self.node,
            simplified: Some(D::NAME),
        }
    }

    // ---------------------------------------------------------------- literals

    pub fn literal(value: Value) -> Self {
        Expression::new(Expr::Literal(Literal {
            value: literal::normalize(value),
        }))
    }

    pub fn null() -> Self {
        Expression::literal(Value::Null)
    }

    pub fn boolean(value: bool) -> Self {
        Expression::literal(Value::Bool(value))
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::new(Expr::Variable(Variable { var: name.into() }))
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self.node() {
            Expr::Literal(lit) => Some(&lit.value),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&str> {
        match self.node() {
            Expr::Variable(v) => Some(&v.var),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        self.as_literal() == Some(&Value::Bool(true))
    }

    pub fn is_false(&self) -> bool {
        self.as_literal() == Some(&Value::Bool(false))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.as_literal(), Some(Value::Null))
    }

    // ---------------------------------------------------------------- builders

    pub fn negate(term: Expression) -> Self {
        Expression::new(Expr::Not(NotOp { term }))
    }

    pub fn all(terms: Vec<Expression>) -> Self {
        Expression::new(Expr::And(AndOp { terms }))
    }

    pub fn any(terms: Vec<Expression>) -> Self {
        Expression::new(Expr::Or(OrOp { terms }))
    }

    pub fn is_missing(term: Expression) -> Self {
        Expression::new(Expr::Missing(MissingOp { term }))
    }

    pub fn eq(lhs: Expression, rhs: Expression) -> Self {
        Expression::new(Expr::Compare(CompareExpr {
            op: CompareOp::Eq,
            lhs,
            rhs,
        }))
    }

    // ---------------------------------------------------------------- structure

    pub fn children(&self) -> Vec<&Expression> {
        dispatch!(self.node(), op => op.children())
    }

    pub fn rebuild(&self, f: &mut dyn FnMut(&Expression) -> Expression) -> Expression {
        Expression::new(dispatch!(self.node(), op => op.rebuild(f)))
    }

    /// Rewrite top-down: where `f` answers, its answer replaces the whole subtree.
    pub fn transform(&self, f: &dyn Fn(&Expression) -> Option<Expression>) -> Expression {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        if self.children().is_empty() {
            return self.clone();
        }
        self.rebuild(&mut |child| child.transform(f))
    }

    /// Names of all referenced variables (and wildcard prefixes).
    pub fn vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        match self.node() {
            Expr::Variable(v) => {
                out.insert(v.var.clone());
            }
            Expr::Leaves(l) => {
                out.insert(l.prefix.clone());
            }
            _ => {
                for child in self.children() {
                    child.collect_vars(out);
                }
            }
        }
    }

    /// Rename variables. A key matches the variable itself or any path beneath it; the
    /// longest matching key wins.
    pub fn map(&self, renames: &BTreeMap<String, String>) -> Expression {
        let rename = |name: &str| -> Option<String> {
            renames
                .iter()
                .filter(|(from, _)| startswith_field(name, from))
                .max_by_key(|(from, _)| from.len())
                .map(|(from, to)| concat_field(to, &relative_field(name, from)))
        };
        self.transform(&|e| match e.node() {
            Expr::Variable(v) => rename(&v.var).map(Expression::variable),
            Expr::Leaves(l) => rename(&l.prefix)
                .map(|prefix| Expression::new(Expr::Leaves(Leaves { prefix }))),
            _ => None,
        })
    }

    /// Replace variables by whole expressions (exact names only).
    pub fn substitute(&self, bindings: &BTreeMap<String, Expression>) -> Expression {
        self.transform(&|e| match e.node() {
            Expr::Variable(v) => bindings.get(&v.var).cloned(),
            _ => None,
        })
    }

    // ---------------------------------------------------------------- evaluation

    pub fn partial_eval<D: Dialect>(&self) -> Expression {
        if self.simplified == Some(D::NAME) {
            return self.clone();
        }
        let simple = dispatch!(self.node(), op => op.simplify::<D>(self));
        if simple.simplified == Some(D::NAME) {
            return simple;
        }
        match D::lower(&simple) {
            Some(lowered) => lowered.partial_eval::<D>(),
            None => simple.marked::<D>(),
        }
    }

    pub fn missing<D: Dialect>(&self) -> Expression {
        dispatch!(self.node(), op => op.missing::<D>(self))
    }

    /// Simplified missing expression; the common case for callers deciding on null handling.
    pub fn missing_simplified<D: Dialect>(&self) -> Expression {
        self.missing::<D>().partial_eval::<D>()
    }

    /// Result type when it can be told without a schema; `IsNull` when unknown.
    pub fn type_hint(&self) -> JsonType {
        dispatch!(self.node(), op => op.type_hint())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// Simplify every child of a node for dialect `D`.
pub(crate) fn simplify_all<D: Dialect>(terms: &[Expression]) -> Vec<Expression> {
    terms.iter().map(|t| t.partial_eval::<D>()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: serde_json::Value) -> Expression {
        Expression::from_json(&v).unwrap()
    }

    #[test]
    fn test_marker_is_ignored_by_equality() {
        let e = parse(json!({"gt": {"a": 1}}));
        let s = e.partial_eval::<JxLang>();
        assert_eq!(s.simplified_for(), Some("jx"));
        assert_eq!(e, s);
    }

    #[test]
    fn test_vars() {
        let e = parse(json!({"and": [{"eq": {"a": 1}}, {"gt": ["b.c", "d"]}]}));
        let vars: Vec<String> = e.vars().into_iter().collect();
        assert_eq!(vars, vec!["a", "b.c", "d"]);
    }

    #[test]
    fn test_map_renames_prefixes() {
        let e = parse(json!({"add": ["b.c", "x"]}));
        let mut renames = BTreeMap::new();
        renames.insert("b".to_string(), "t.b".to_string());
        renames.insert("x".to_string(), "y".to_string());
        let mapped = e.map(&renames);
        assert_eq!(mapped, parse(json!({"add": ["t.b.c", "y"]})));
    }

    #[test]
    fn test_substitute_binds_literals() {
        let e = parse(json!({"add": ["a", 1]}));
        let mut bindings = BTreeMap::new();
        bindings.insert("a".to_string(), Expression::literal(json!(2)));
        let bound = e.substitute(&bindings).partial_eval::<JxLang>();
        assert_eq!(bound.as_literal(), Some(&json!(3)));
    }
}
