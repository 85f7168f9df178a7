//! Elide condition language
//!
//! Contract conditions (preconditions, postconditions, invariants) reach the
//! prover as canonical boolean expressions over named variables. This crate
//! defines that closed expression algebra, its parser, exact rational
//! numbers for arithmetic, direct constant evaluation, and stable digests.
//!
//! Refinement-brand predicates use `$` as the value placeholder
//! (`$ >= 0 && $ <= 255`); `Expr::instantiate` binds it to a variable.

pub mod digest;
pub mod eval;
pub mod expr;
pub mod parser;
pub mod rational;

pub use eval::{eval_constant, eval_with, Value, MAX_CONSTANT_EXPONENT};
pub use expr::{BinaryOp, CompareOp, Expr, LogicOp, UnaryOp, PLACEHOLDER};
pub use parser::{is_identifier, parse_expr, ExprParseError};
pub use rational::Rational;
