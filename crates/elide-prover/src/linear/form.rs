//! Linear forms `c + Σ aᵢ·xᵢ` and the constraints built from them.

use elide_expr::{BinaryOp, CompareOp, Expr, Rational, UnaryOp, MAX_CONSTANT_EXPONENT};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinearizeError {
    #[error("non-linear term `{0}`")]
    NonLinear(String),
    #[error("unsupported term `{0}`")]
    Unsupported(String),
    #[error("coefficient overflow")]
    Overflow,
}

/// `constant + Σ coeffs[atom] · atom`, zero coefficients never stored.
///
/// Atoms are variables (`x`) or length members (`s.length`), keyed by their
/// rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinearForm {
    pub coeffs: BTreeMap<String, Rational>,
    pub constant: Rational,
}

impl LinearForm {
    pub fn constant(c: Rational) -> Self {
        Self {
            coeffs: BTreeMap::new(),
            constant: c,
        }
    }

    pub fn atom(name: impl Into<String>) -> Self {
        let mut coeffs = BTreeMap::new();
        coeffs.insert(name.into(), Rational::ONE);
        Self {
            coeffs,
            constant: Rational::ZERO,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.coeffs.is_empty()
    }

    pub fn coeff(&self, atom: &str) -> Rational {
        self.coeffs.get(atom).copied().unwrap_or(Rational::ZERO)
    }

    pub fn add(&self, other: &Self) -> Option<Self> {
        let mut out = self.clone();
        out.constant = out.constant.checked_add(other.constant)?;
        for (atom, c) in &other.coeffs {
            let sum = out.coeff(atom).checked_add(*c)?;
            if sum.is_zero() {
                out.coeffs.remove(atom);
            } else {
                out.coeffs.insert(atom.clone(), sum);
            }
        }
        Some(out)
    }

    pub fn scale(&self, k: Rational) -> Option<Self> {
        if k.is_zero() {
            return Some(Self::default());
        }
        let mut coeffs = BTreeMap::new();
        for (atom, c) in &self.coeffs {
            coeffs.insert(atom.clone(), c.checked_mul(k)?);
        }
        Some(Self {
            coeffs,
            constant: self.constant.checked_mul(k)?,
        })
    }

    pub fn sub(&self, other: &Self) -> Option<Self> {
        self.add(&other.scale(Rational::ONE.checked_neg()?)?)
    }
}

impl fmt::Display for LinearForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (atom, c) in &self.coeffs {
            let sign = if c.is_negative() { "-" } else { "+" };
            let mag = c.abs().unwrap_or(*c);
            if first {
                if c.is_negative() {
                    f.write_str("-")?;
                }
            } else {
                write!(f, " {sign} ")?;
            }
            if mag == Rational::ONE {
                write!(f, "{atom}")?;
            } else {
                write!(f, "{mag}·{atom}")?;
            }
            first = false;
        }
        if first {
            write!(f, "{}", self.constant)
        } else if self.constant.is_zero() {
            Ok(())
        } else if self.constant.is_negative() {
            write!(f, " - {}", self.constant.abs().unwrap_or(self.constant))
        } else {
            write!(f, " + {}", self.constant)
        }
    }
}

/// Linearize an arithmetic expression.
pub fn linearize(expr: &Expr) -> Result<LinearForm, LinearizeError> {
    match expr {
        Expr::Num(n) => Ok(LinearForm::constant(*n)),
        Expr::Var(name) => Ok(LinearForm::atom(name.clone())),
        Expr::Member(base, field) if field == "length" && is_atomic_base(base) => {
            Ok(LinearForm::atom(expr.to_string()))
        }
        Expr::Unary(UnaryOp::Neg, e) => {
            let inner = linearize(e)?;
            let minus_one = Rational::ONE.checked_neg().ok_or(LinearizeError::Overflow)?;
            inner.scale(minus_one).ok_or(LinearizeError::Overflow)
        }
        Expr::Binary(op, l, r) => {
            let (a, b) = (linearize(l)?, linearize(r)?);
            let out = match op {
                BinaryOp::Add => a.add(&b),
                BinaryOp::Sub => a.sub(&b),
                BinaryOp::Mul => {
                    if a.is_constant() {
                        b.scale(a.constant)
                    } else if b.is_constant() {
                        a.scale(b.constant)
                    } else {
                        return Err(LinearizeError::NonLinear(expr.to_string()));
                    }
                }
                BinaryOp::Div => {
                    if !b.is_constant() {
                        return Err(LinearizeError::NonLinear(expr.to_string()));
                    }
                    let inv = Rational::ONE
                        .checked_div(b.constant)
                        .ok_or_else(|| LinearizeError::Unsupported(expr.to_string()))?;
                    a.scale(inv)
                }
                BinaryOp::Pow => return linearize_pow(expr, &a, &b),
                BinaryOp::Rem => {
                    if a.is_constant() && b.is_constant() {
                        a.constant.checked_rem(b.constant).map(LinearForm::constant)
                    } else {
                        return Err(LinearizeError::Unsupported(expr.to_string()));
                    }
                }
            };
            out.ok_or(LinearizeError::Overflow)
        }
        _ => Err(LinearizeError::Unsupported(expr.to_string())),
    }
}

fn is_atomic_base(base: &Expr) -> bool {
    matches!(base, Expr::Var(_) | Expr::Member(..))
}

fn linearize_pow(expr: &Expr, base: &LinearForm, exp: &LinearForm) -> Result<LinearForm, LinearizeError> {
    if !exp.is_constant() {
        return Err(LinearizeError::NonLinear(expr.to_string()));
    }
    let e = exp.constant;
    if !e.is_integer() || e.is_negative() {
        return Err(LinearizeError::Unsupported(expr.to_string()));
    }
    if base.is_constant() {
        if e.numer() > MAX_CONSTANT_EXPONENT {
            return Err(LinearizeError::Unsupported(expr.to_string()));
        }
        let power = u32::try_from(e.numer()).map_err(|_| LinearizeError::Overflow)?;
        return base
            .constant
            .checked_pow(power)
            .map(LinearForm::constant)
            .ok_or(LinearizeError::Overflow);
    }
    match e.numer() {
        0 => Ok(LinearForm::constant(Rational::ONE)),
        1 => Ok(base.clone()),
        _ => Err(LinearizeError::NonLinear(expr.to_string())),
    }
}

/// Whether every arithmetic subterm of a condition is linear.
pub fn is_linear(expr: &Expr) -> bool {
    match expr {
        Expr::Bool(_) => true,
        Expr::Compare(_, l, r) => linearize(l).is_ok() && linearize(r).is_ok(),
        Expr::Logic(_, l, r) => is_linear(l) && is_linear(r),
        Expr::Unary(UnaryOp::Not, e) => is_linear(e),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Relation {
    /// `form >= 0`
    Ge,
    /// `form > 0`
    Gt,
    /// `form == 0`
    Eq,
}

/// `form REL 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub form: LinearForm,
    pub relation: Relation,
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rel = match self.relation {
            Relation::Ge => ">=",
            Relation::Gt => ">",
            Relation::Eq => "==",
        };
        write!(f, "{} {rel} 0", self.form)
    }
}

/// Constraint equivalent to `l op r`; `!=` has no single linear constraint.
pub fn constraint_from_comparison(
    op: CompareOp,
    l: &Expr,
    r: &Expr,
) -> Result<LinearConstraint, LinearizeError> {
    let (a, b) = (linearize(l)?, linearize(r)?);
    let (form, relation) = match op {
        CompareOp::Gt => (a.sub(&b), Relation::Gt),
        CompareOp::Ge => (a.sub(&b), Relation::Ge),
        CompareOp::Lt => (b.sub(&a), Relation::Gt),
        CompareOp::Le => (b.sub(&a), Relation::Ge),
        CompareOp::Eq => (a.sub(&b), Relation::Eq),
        CompareOp::Ne => {
            return Err(LinearizeError::Unsupported(format!("{l} != {r}")));
        }
    };
    Ok(LinearConstraint {
        form: form.ok_or(LinearizeError::Overflow)?,
        relation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use elide_expr::parse_expr;

    fn lin(text: &str) -> Result<LinearForm, LinearizeError> {
        linearize(&parse_expr(text).expect("parse"))
    }

    #[test]
    fn collects_coefficients() {
        let f = lin("2 * x + 3 * (y - x) - 4").expect("linear");
        assert_eq!(f.coeff("x"), Rational::from_integer(-1));
        assert_eq!(f.coeff("y"), Rational::from_integer(3));
        assert_eq!(f.constant, Rational::from_integer(-4));
        assert_eq!(f.to_string(), "-x + 3·y - 4");
    }

    #[test]
    fn cancels_terms() {
        let f = lin("x - x + 1").expect("linear");
        assert!(f.is_constant());
        assert_eq!(f.to_string(), "1");
    }

    #[test]
    fn rejects_variable_products() {
        assert!(matches!(lin("x * y"), Err(LinearizeError::NonLinear(_))));
        assert!(matches!(lin("x / y"), Err(LinearizeError::NonLinear(_))));
        assert!(matches!(lin("x ** 2"), Err(LinearizeError::NonLinear(_))));
        assert!(lin("x / 2").is_ok());
        assert!(lin("2 ** 3 * x").is_ok());
    }

    #[test]
    fn constant_powers_are_capped() {
        let f = lin("x + 1 ** 128").expect("linear");
        assert_eq!(f.constant, Rational::ONE);
        assert!(matches!(lin("x + 1 ** 129"), Err(LinearizeError::Unsupported(_))));
        assert!(matches!(lin("1 ** 4294967295"), Err(LinearizeError::Unsupported(_))));
        assert!(!is_linear(&parse_expr("x + 1 ** 100000000 > 0").expect("parse")));
    }

    #[test]
    fn length_members_are_atoms() {
        let f = lin("s.length + 1").expect("linear");
        assert_eq!(f.coeff("s.length"), Rational::ONE);
        assert!(matches!(lin("s.trim()"), Err(LinearizeError::Unsupported(_))));
    }

    #[test]
    fn linearity_of_conditions() {
        assert!(is_linear(&parse_expr("x + y > 0 && x < 3").expect("parse")));
        assert!(!is_linear(&parse_expr("x * y > 0").expect("parse")));
    }
}
