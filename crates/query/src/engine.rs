//! The evaluation engine for WHERE clauses.
//!
//! Comparisons over multi-valued paths are existential: a comparison holds if
//! any pairing of a left value with a right value satisfies it. Absent values
//! and type mismatches make a comparison false; they are never errors.
use crate::ast::{CompareOp, Expr, Pattern};
use crate::resolver::PathSource;
use mql_types::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

/// Evaluates `expr` to a boolean, resolving path references through `source`.
pub fn matches_with<P, S>(expr: &Expr<P>, source: &S) -> bool
where
    S: PathSource<P>,
{
    match expr {
        Expr::BoolLiteral(b) => *b,
        Expr::Literal(v) => v.as_bool().unwrap_or(false),
        Expr::Regex(_) => false,
        Expr::FieldRef(path) => source
            .resolve(path)
            .iter()
            .any(|m| m.value.as_bool() == Some(true)),
        Expr::Compare { left, op, right } => compare(left, *op, right, source),
        Expr::And(l, r) => matches_with(l, source) && matches_with(r, source),
        Expr::Or(l, r) => matches_with(l, source) || matches_with(r, source),
        Expr::Not(inner) => !matches_with(inner, source),
    }
}

fn compare<P, S>(left: &Expr<P>, op: CompareOp, right: &Expr<P>, source: &S) -> bool
where
    S: PathSource<P>,
{
    let lhs = operand_values(left, source);
    if lhs.is_empty() {
        return false;
    }
    if op == CompareOp::RegexMatch {
        return match right {
            Expr::Regex(pattern) => lhs.iter().any(|l| regex_matches(l, pattern)),
            _ => false,
        };
    }
    let rhs = operand_values(right, source);
    lhs.iter()
        .any(|l| rhs.iter().any(|r| compare_values(l, op, r)))
}

/// The values an operand stands for: every resolved value of a path, or a
/// single value for anything else.
fn operand_values<'s, P, S>(expr: &'s Expr<P>, source: &'s S) -> Cow<'s, [Value]>
where
    S: PathSource<P>,
{
    match expr {
        Expr::Literal(v) => Cow::Borrowed(std::slice::from_ref(v)),
        Expr::FieldRef(path) => {
            Cow::Owned(source.resolve(path).iter().map(|m| m.value.clone()).collect())
        }
        Expr::Regex(pattern) => Cow::Owned(vec![Value::from(pattern.source())]),
        other => Cow::Owned(vec![Value::Bool(matches_with(other, source))]),
    }
}

fn regex_matches(value: &Value, pattern: &Pattern) -> bool {
    value.as_str().is_some_and(|s| pattern.is_match(s))
}

/// Applies a non-regex comparison operator to one pair of values.
pub fn compare_values(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Neq => !values_equal(left, right),
        CompareOp::Lt => ordering(left, right) == Some(Ordering::Less),
        CompareOp::Lte => matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal)),
        CompareOp::Gt => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(ordering(left, right), Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::RegexMatch => false,
    }
}

/// Structural equality within a type; values of different types are never equal.
fn values_equal(left: &Value, right: &Value) -> bool {
    left == right
}

/// Orders two scalars of the same type.
///
/// - Numbers: numerically, across integer and float forms
/// - Strings: lexicographically
/// - Booleans: false < true
/// - Anything else: unordered
fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
