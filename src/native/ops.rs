use std::sync::Arc;

use serde_json::Value;

use super::{get_path, NativeFn, ToNative};
use crate::expressions::literal::{
    as_f64, is_null_value, normalize, number_value, truthy, value_to_string, values_equal,
};
use crate::expressions::{
    AffixExpr, AffixOp, AndOp, BetweenOp, BinaryExpr, CaseOp, CastExpr, CoalesceOp, CompareExpr,
    CompileError, ConcatOp, DateLiteral, ExistsOp, Expression, FindOp, InOp, Leaves, Literal,
    MissingOp, MultiExpr, NotOp, OrOp, PickExpr, PickOp, ReduceExpr, ReduceOp, RegExpOp,
    SliceExpr, StringUnaryExpr, TupleOp, UnaryExpr, UnaryOp, Variable, WhenOp,
};

fn all(terms: &[Expression]) -> Result<Vec<NativeFn>, CompileError> {
    terms.iter().map(|t| t.to_native()).collect()
}

fn count_of(value: &Value) -> Option<usize> {
    as_f64(value).map(|f| if f <= 0.0 { 0 } else { f as usize })
}

impl ToNative for Literal {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let value = self.value.clone();
        Ok(Arc::new(move |_| value.clone()))
    }
}

impl ToNative for Variable {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let var = self.var.clone();
        Ok(Arc::new(move |doc| get_path(doc, &var)))
    }
}

impl ToNative for Leaves {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let prefix = self.prefix.clone();
        Ok(Arc::new(move |doc| get_path(doc, &prefix)))
    }
}

impl ToNative for DateLiteral {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let value = number_value(self.seconds);
        Ok(Arc::new(move |_| value.clone()))
    }
}

impl ToNative for TupleOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let terms = all(&self.terms)?;
        Ok(Arc::new(move |doc| {
            Value::Array(terms.iter().map(|t| t(doc)).collect())
        }))
    }
}

impl ToNative for NotOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let term = self.term.to_native()?;
        Ok(Arc::new(move |doc| match truthy(&term(doc)) {
            Some(b) => Value::Bool(!b),
            None => Value::Null,
        }))
    }
}

impl ToNative for AndOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let terms = all(&self.terms)?;
        Ok(Arc::new(move |doc| {
            Value::Bool(terms.iter().all(|t| truthy(&t(doc)) == Some(true)))
        }))
    }
}

impl ToNative for OrOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let terms = all(&self.terms)?;
        Ok(Arc::new(move |doc| {
            Value::Bool(terms.iter().any(|t| truthy(&t(doc)) == Some(true)))
        }))
    }
}

impl ToNative for MissingOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let term = self.term.to_native()?;
        Ok(Arc::new(move |doc| Value::Bool(is_null_value(&term(doc)))))
    }
}

impl ToNative for ExistsOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let term = self.term.to_native()?;
        Ok(Arc::new(move |doc| Value::Bool(!is_null_value(&term(doc)))))
    }
}

impl ToNative for InOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let value = self.value.to_native()?;
        let superset = self.superset.to_native()?;
        Ok(Arc::new(move |doc| {
            let v = value(doc);
            if is_null_value(&v) {
                return Value::Bool(false);
            }
            let found = match superset(doc) {
                Value::Array(items) => items.iter().any(|item| values_equal(&v, item)),
                other => values_equal(&v, &other),
            };
            Value::Bool(found)
        }))
    }
}

impl ToNative for CompareExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let lhs = self.lhs.to_native()?;
        let rhs = self.rhs.to_native()?;
        Ok(Arc::new(move |doc| match op.apply(&lhs(doc), &rhs(doc)) {
            Some(b) => Value::Bool(b),
            None => Value::Null,
        }))
    }
}

impl ToNative for BinaryExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let lhs = self.lhs.to_native()?;
        let rhs = self.rhs.to_native()?;
        let default = self.default.to_native()?;
        Ok(Arc::new(move |doc| {
            let result = match (as_f64(&lhs(doc)), as_f64(&rhs(doc))) {
                (Some(l), Some(r)) => op.apply(l, r),
                _ => None,
            };
            match result {
                Some(f) => number_value(f),
                None => default(doc),
            }
        }))
    }
}

impl ToNative for MultiExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let nulls = self.nulls;
        let terms = all(&self.terms)?;
        let default = self.default.to_native()?;
        Ok(Arc::new(move |doc| {
            let mut acc: Option<f64> = None;
            for term in &terms {
                match as_f64(&term(doc)) {
                    Some(f) => acc = Some(acc.map_or(f, |a| op.combine(a, f))),
                    None if nulls => continue,
                    None => return default(doc),
                }
            }
            match acc {
                Some(f) => number_value(f),
                None => default(doc),
            }
        }))
    }
}

impl ToNative for UnaryExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let term = self.term.to_native()?;
        Ok(Arc::new(move |doc| match as_f64(&term(doc)) {
            Some(f) => number_value(match op {
                UnaryOp::Abs => f.abs(),
                UnaryOp::Neg => -f,
            }),
            None => Value::Null,
        }))
    }
}

impl ToNative for ReduceExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let terms = all(&self.terms)?;
        Ok(Arc::new(move |doc| {
            let values: Vec<Value> = terms.iter().map(|t| t(doc)).collect();
            match op {
                ReduceOp::Count => Value::from(values.iter().filter(|v| !is_null_value(v)).count()),
                ReduceOp::Max | ReduceOp::Min => {
                    let numbers = values.iter().filter_map(as_f64);
                    let folded = if op == ReduceOp::Max {
                        numbers.fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a| a.max(f))))
                    } else {
                        numbers.fold(None, |acc: Option<f64>, f| Some(acc.map_or(f, |a| a.min(f))))
                    };
                    folded.map(number_value).unwrap_or(Value::Null)
                }
            }
        }))
    }
}

impl ToNative for CoalesceOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let terms = all(&self.terms)?;
        Ok(Arc::new(move |doc| {
            terms
                .iter()
                .map(|t| t(doc))
                .find(|v| !is_null_value(v))
                .unwrap_or(Value::Null)
        }))
    }
}

impl ToNative for PickExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let term = self.term.to_native()?;
        Ok(Arc::new(move |doc| match term(doc) {
            Value::Array(items) => match op {
                PickOp::First => items.first().cloned().unwrap_or(Value::Null),
                PickOp::Last => items.last().cloned().unwrap_or(Value::Null),
            },
            other => other,
        }))
    }
}

impl ToNative for WhenOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let when = self.when.to_native()?;
        let then = self.then.to_native()?;
        let els = self.els.to_native()?;
        Ok(Arc::new(move |doc| {
            if truthy(&when(doc)) == Some(true) {
                then(doc)
            } else {
                els(doc)
            }
        }))
    }
}

impl ToNative for CaseOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let whens = self
            .whens
            .iter()
            .map(|(w, t)| Ok((w.to_native()?, t.to_native()?)))
            .collect::<Result<Vec<_>, CompileError>>()?;
        let els = self.els.to_native()?;
        Ok(Arc::new(move |doc| {
            for (when, then) in &whens {
                if truthy(&when(doc)) == Some(true) {
                    return then(doc);
                }
            }
            els(doc)
        }))
    }
}

impl ToNative for CastExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let term = self.term.to_native()?;
        Ok(Arc::new(move |doc| CastExpr::cast_value(op, &term(doc))))
    }
}

impl ToNative for ConcatOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let terms = all(&self.terms)?;
        let separator = self.separator.clone();
        let default = self.default.to_native()?;
        Ok(Arc::new(move |doc| {
            let parts: Vec<String> = terms.iter().filter_map(|t| value_to_string(&t(doc))).collect();
            if parts.is_empty() {
                return default(doc);
            }
            normalize(Value::String(parts.join(&separator)))
        }))
    }
}

impl ToNative for StringUnaryExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let term = self.term.to_native()?;
        Ok(Arc::new(move |doc| match value_to_string(&term(doc)) {
            Some(s) => normalize(op.apply(&s)),
            None => Value::Null,
        }))
    }
}

impl ToNative for SliceExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let value = self.value.to_native()?;
        let length = self.length.to_native()?;
        Ok(Arc::new(move |doc| {
            match (value_to_string(&value(doc)), count_of(&length(doc))) {
                (Some(s), Some(n)) => normalize(Value::String(op.apply(&s, n))),
                _ => Value::Null,
            }
        }))
    }
}

impl ToNative for AffixExpr {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let op = self.op;
        let value = self.value.to_native()?;
        let affix = self.affix.to_native()?;
        Ok(Arc::new(move |doc| {
            let Some(a) = value_to_string(&affix(doc)) else {
                return Value::Bool(true);
            };
            let Some(s) = value_to_string(&value(doc)) else {
                return Value::Bool(false);
            };
            Value::Bool(match op {
                AffixOp::Prefix => s.starts_with(&a),
                AffixOp::Suffix => s.ends_with(&a),
            })
        }))
    }
}

impl ToNative for FindOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let value = self.value.to_native()?;
        let find = self.find.to_native()?;
        let start = self.start.to_native()?;
        let default = self.default.to_native()?;
        Ok(Arc::new(move |doc| {
            let found = match (value_to_string(&value(doc)), value_to_string(&find(doc))) {
                (Some(s), Some(f)) => FindOp::apply(&s, &f, count_of(&start(doc)).unwrap_or(0)),
                _ => None,
            };
            match found {
                Some(index) => Value::from(index),
                None => default(doc),
            }
        }))
    }
}

impl ToNative for BetweenOp {
    fn to_native(&self, _this: &Expression) -> Result<NativeFn, CompileError> {
        let value = self.value.to_native()?;
        let prefix = self.prefix.to_native()?;
        let suffix = self.suffix.to_native()?;
        let start = self.start.to_native()?;
        let default = self.default.to_native()?;
        Ok(Arc::new(move |doc| {
            let found = match (
                value_to_string(&value(doc)),
                value_to_string(&prefix(doc)),
                value_to_string(&suffix(doc)),
            ) {
                (Some(s), Some(p), Some(x)) => {
                    BetweenOp::apply(&s, &p, &x, count_of(&start(doc)).unwrap_or(0))
                }
                _ => None,
            };
            match found {
                Some(text) => Value::String(text),
                None => default(doc),
            }
        }))
    }
}

impl ToNative for RegExpOp {
    fn to_native(&self, this: &Expression) -> Result<NativeFn, CompileError> {
        let value = self.value.to_native()?;
        if let Some(Value::String(p)) = self.pattern.as_literal() {
            let re = RegExpOp::compile(p)
                .map_err(|e| CompileError::malformed("regexp", e.to_string(), &this.to_json()))?;
            return Ok(Arc::new(move |doc| {
                Value::Bool(value_to_string(&value(doc)).is_some_and(|s| re.is_match(&s)))
            }));
        }
        let pattern = self.pattern.to_native()?;
        Ok(Arc::new(move |doc| {
            let matched = match (value_to_string(&value(doc)), value_to_string(&pattern(doc))) {
                (Some(s), Some(p)) => RegExpOp::compile(&p).is_ok_and(|re| re.is_match(&s)),
                _ => false,
            };
            Value::Bool(matched)
        }))
    }
}
