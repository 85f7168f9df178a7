//! Direct evaluation of variable-free conditions.
//!
//! This is the first (and cheapest) proof strategy: `1 + 1 == 2` needs no
//! facts at all. Anything the evaluator cannot model precisely (unknown
//! calls, division by zero, overflow, mixed-type comparisons) yields `None`,
//! which the engine treats as "not decided here".

use crate::expr::{BinaryOp, CompareOp, Expr, LogicOp, UnaryOp};
use crate::rational::Rational;

/// Largest exponent evaluated by `**`; larger powers are left undecided.
pub const MAX_CONSTANT_EXPONENT: i128 = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Num(Rational),
    Str(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Evaluate an expression without any variable bindings.
pub fn eval_constant(expr: &Expr) -> Option<Value> {
    eval_with(expr, &|_| None)
}

/// Evaluate with numeric bindings for free variables.
///
/// Used by property tests to cross-check proofs against concrete assignments.
pub fn eval_with(expr: &Expr, lookup: &dyn Fn(&str) -> Option<Rational>) -> Option<Value> {
    match expr {
        Expr::Bool(b) => Some(Value::Bool(*b)),
        Expr::Num(n) => Some(Value::Num(*n)),
        Expr::Str(s) => Some(Value::Str(s.clone())),
        Expr::Var(name) => lookup(name).map(Value::Num),
        Expr::Branded { .. } => None,
        Expr::Member(base, field) => match (eval_with(base, lookup)?, field.as_str()) {
            (Value::Str(s), "length") => {
                Some(Value::Num(Rational::from_integer(s.chars().count() as i128)))
            }
            _ => None,
        },
        Expr::Unary(UnaryOp::Neg, e) => match eval_with(e, lookup)? {
            Value::Num(n) => Some(Value::Num(n.checked_neg()?)),
            _ => None,
        },
        Expr::Unary(UnaryOp::Not, e) => Some(Value::Bool(!eval_with(e, lookup)?.as_bool()?)),
        Expr::Binary(op, l, r) => {
            let (Value::Num(a), Value::Num(b)) = (eval_with(l, lookup)?, eval_with(r, lookup)?)
            else {
                return None;
            };
            let n = match op {
                BinaryOp::Add => a.checked_add(b)?,
                BinaryOp::Sub => a.checked_sub(b)?,
                BinaryOp::Mul => a.checked_mul(b)?,
                BinaryOp::Div => a.checked_div(b)?,
                BinaryOp::Rem => a.checked_rem(b)?,
                BinaryOp::Pow => {
                    if !b.is_integer() || b.is_negative() || b.numer() > MAX_CONSTANT_EXPONENT {
                        return None;
                    }
                    a.checked_pow(u32::try_from(b.numer()).ok()?)?
                }
            };
            Some(Value::Num(n))
        }
        Expr::Compare(op, l, r) => {
            let (a, b) = (eval_with(l, lookup)?, eval_with(r, lookup)?);
            let holds = match (&a, &b) {
                (Value::Num(x), Value::Num(y)) => match op {
                    CompareOp::Lt => x < y,
                    CompareOp::Le => x <= y,
                    CompareOp::Gt => x > y,
                    CompareOp::Ge => x >= y,
                    CompareOp::Eq => x == y,
                    CompareOp::Ne => x != y,
                },
                (Value::Str(_), Value::Str(_)) | (Value::Bool(_), Value::Bool(_)) => match op {
                    CompareOp::Eq => a == b,
                    CompareOp::Ne => a != b,
                    _ => return None,
                },
                _ => return None,
            };
            Some(Value::Bool(holds))
        }
        Expr::Logic(op, l, r) => {
            let lhs = eval_with(l, lookup)?.as_bool()?;
            match (op, lhs) {
                (LogicOp::And, false) => Some(Value::Bool(false)),
                (LogicOp::Or, true) => Some(Value::Bool(true)),
                _ => Some(Value::Bool(eval_with(r, lookup)?.as_bool()?)),
            }
        }
        Expr::Call {
            function,
            receiver,
            args,
        } => match (function.as_str(), receiver, args.as_slice()) {
            ("Number.isFinite", None, [arg]) | ("Number.isInteger", None, [arg]) => {
                match eval_with(arg, lookup)? {
                    Value::Num(n) if function == "Number.isInteger" => {
                        Some(Value::Bool(n.is_integer()))
                    }
                    Value::Num(_) => Some(Value::Bool(true)),
                    _ => Some(Value::Bool(false)),
                }
            }
            ("trim", Some(recv), []) => match eval_with(recv, lookup)? {
                Value::Str(s) => Some(Value::Str(s.trim().to_string())),
                _ => None,
            },
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;

    fn eval(text: &str) -> Option<Value> {
        eval_constant(&parse_expr(text).expect("parse"))
    }

    #[test]
    fn evaluates_arithmetic_comparisons() {
        assert_eq!(eval("1 + 2 * 3 == 7"), Some(Value::Bool(true)));
        assert_eq!(eval("2 ** 10 > 1000"), Some(Value::Bool(true)));
        assert_eq!(eval("0.1 + 0.2 == 0.3"), Some(Value::Bool(true)));
        assert_eq!(eval("5 % 3 == 2"), Some(Value::Bool(true)));
    }

    #[test]
    fn false_constants_evaluate_to_false() {
        assert_eq!(eval("1 > 2"), Some(Value::Bool(false)));
        assert_eq!(eval("true && false"), Some(Value::Bool(false)));
    }

    #[test]
    fn undecidable_constants_yield_none() {
        assert_eq!(eval("1 / 0 > 0"), None);
        assert_eq!(eval("x > 0"), None);
        assert_eq!(eval("'a' < 'b'"), None);
        assert_eq!(eval("foo(1)"), None);
    }

    #[test]
    fn evaluates_string_members() {
        assert_eq!(eval("'abc'.length == 3"), Some(Value::Bool(true)));
        assert_eq!(eval("' a '.trim() == 'a'"), Some(Value::Bool(true)));
        assert_eq!(eval("Number.isFinite(3)"), Some(Value::Bool(true)));
    }

    #[test]
    fn binds_variables() {
        let e = parse_expr("x + y > 3").expect("parse");
        let v = eval_with(&e, &|name| match name {
            "x" => Some(Rational::from_integer(2)),
            "y" => Some(Rational::from_integer(2)),
            _ => None,
        });
        assert_eq!(v, Some(Value::Bool(true)));
    }
}
