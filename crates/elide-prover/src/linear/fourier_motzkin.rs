//! Fourier–Motzkin feasibility over the rationals.
//!
//! Each variable is eliminated by pairing every row with a positive
//! coefficient against every row with a negative one. The system is
//! infeasible exactly when a variable-free row ends up false (`-1 >= 0`).
//! Row counts can grow quadratically per step, so elimination stops with an
//! inconclusive answer once the configured row limit is exceeded.
//!
//! Rational infeasibility implies integer infeasibility, so an `Infeasible`
//! verdict is sound for integer-valued programs too. `Feasible` only means
//! "not refuted over the rationals".

use super::form::{LinearConstraint, LinearForm, Relation};
use elide_expr::Rational;
use std::collections::{BTreeMap, BTreeSet};

/// `Σ coeffs · x + constant (> | >=) 0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Row {
    coeffs: BTreeMap<String, Rational>,
    constant: Rational,
    strict: bool,
}

impl Row {
    fn from_form(form: &LinearForm, strict: bool) -> Self {
        Self {
            coeffs: form.coeffs.clone(),
            constant: form.constant,
            strict,
        }
    }

    /// Constant row that does not hold.
    fn is_contradiction(&self) -> bool {
        self.coeffs.is_empty()
            && (self.constant.is_negative() || (self.strict && self.constant.is_zero()))
    }

    /// Scale so the first coefficient (or the constant) is ±1.
    ///
    /// Positive scaling preserves the inequality and keeps i128 growth in check.
    fn normalized(self) -> Option<Self> {
        let pivot = self
            .coeffs
            .values()
            .next()
            .copied()
            .unwrap_or(self.constant);
        let mag = pivot.abs()?;
        if mag.is_zero() || mag == Rational::ONE {
            return Some(self);
        }
        let inv = Rational::ONE.checked_div(mag)?;
        let mut coeffs = BTreeMap::new();
        for (k, c) in self.coeffs {
            coeffs.insert(k, c.checked_mul(inv)?);
        }
        Some(Self {
            coeffs,
            constant: self.constant.checked_mul(inv)?,
            strict: self.strict,
        })
    }

    fn scaled(&self, k: Rational) -> Option<Self> {
        let mut coeffs = BTreeMap::new();
        for (name, c) in &self.coeffs {
            coeffs.insert(name.clone(), c.checked_mul(k)?);
        }
        Some(Self {
            coeffs,
            constant: self.constant.checked_mul(k)?,
            strict: self.strict,
        })
    }

    /// `self + other`, dropping cancelled coefficients.
    fn plus(&self, other: &Self) -> Option<Self> {
        let mut coeffs = self.coeffs.clone();
        for (name, c) in &other.coeffs {
            let sum = coeffs
                .get(name)
                .copied()
                .unwrap_or(Rational::ZERO)
                .checked_add(*c)?;
            if sum.is_zero() {
                coeffs.remove(name);
            } else {
                coeffs.insert(name.clone(), sum);
            }
        }
        Some(Self {
            coeffs,
            constant: self.constant.checked_add(other.constant)?,
            strict: self.strict || other.strict,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feasibility {
    /// A contradiction was derived; the inner string shows it.
    Infeasible(String),
    Feasible,
    /// Limits or overflow stopped the procedure.
    Inconclusive(String),
}

/// What elimination did, for certificates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EliminationTrace {
    pub eliminated: Vec<String>,
    pub peak_rows: usize,
}

pub fn check_feasibility(
    constraints: &[LinearConstraint],
    max_rows: usize,
) -> (Feasibility, EliminationTrace) {
    let mut trace = EliminationTrace::default();
    let mut rows: BTreeSet<Row> = BTreeSet::new();
    for c in constraints {
        match c.relation {
            Relation::Ge => {
                rows.insert(Row::from_form(&c.form, false));
            }
            Relation::Gt => {
                rows.insert(Row::from_form(&c.form, true));
            }
            Relation::Eq => {
                let Some(neg) = c.form.scale(minus_one()) else {
                    return (Feasibility::Inconclusive("coefficient overflow".into()), trace);
                };
                rows.insert(Row::from_form(&c.form, false));
                rows.insert(Row::from_form(&neg, false));
            }
        }
    }

    loop {
        trace.peak_rows = trace.peak_rows.max(rows.len());
        if rows.len() > max_rows {
            return (
                Feasibility::Inconclusive(format!(
                    "{} rows exceed the limit of {max_rows}",
                    rows.len()
                )),
                trace,
            );
        }
        if let Some(bad) = rows.iter().find(|r| r.is_contradiction()) {
            let rel = if bad.strict { ">" } else { ">=" };
            return (
                Feasibility::Infeasible(format!("{} {rel} 0", bad.constant)),
                trace,
            );
        }
        let Some(var) = pick_variable(&rows) else {
            return (Feasibility::Feasible, trace);
        };

        let mut pos = Vec::new();
        let mut neg = Vec::new();
        let mut next: BTreeSet<Row> = BTreeSet::new();
        for row in rows {
            let c = row.coeffs.get(&var).copied().unwrap_or(Rational::ZERO);
            if c.is_positive() {
                pos.push((c, row));
            } else if c.is_negative() {
                neg.push((c, row));
            } else if !row.coeffs.is_empty() || row.is_contradiction() {
                next.insert(row);
            }
        }
        for (a, p) in &pos {
            for (b, n) in &neg {
                // a > 0, b < 0: (-b)·p + a·n cancels `var`.
                let combined = b
                    .checked_neg()
                    .and_then(|nb| p.scaled(nb))
                    .and_then(|lhs| n.scaled(*a).and_then(|rhs| lhs.plus(&rhs)))
                    .and_then(Row::normalized);
                let Some(row) = combined else {
                    return (Feasibility::Inconclusive("coefficient overflow".into()), trace);
                };
                if row.coeffs.is_empty() && !row.is_contradiction() {
                    continue;
                }
                next.insert(row);
            }
        }
        trace.eliminated.push(var);
        rows = next;
    }
}

/// Variable minimizing the number of generated rows.
fn pick_variable(rows: &BTreeSet<Row>) -> Option<String> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        for (name, c) in &row.coeffs {
            let e = counts.entry(name.as_str()).or_default();
            if c.is_positive() {
                e.0 += 1;
            } else {
                e.1 += 1;
            }
        }
    }
    counts
        .into_iter()
        .min_by_key(|(_, (p, n))| p * n)
        .map(|(name, _)| name.to_string())
}

fn minus_one() -> Rational {
    Rational::from_integer(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linear::form::constraint_from_comparison;
    use elide_expr::{parse_expr, Expr};

    fn constraints(texts: &[&str]) -> Vec<LinearConstraint> {
        texts
            .iter()
            .map(|t| match parse_expr(t).expect("parse") {
                Expr::Compare(op, l, r) => constraint_from_comparison(op, &l, &r).expect("linear"),
                other => panic!("not a comparison: {other}"),
            })
            .collect()
    }

    #[test]
    fn detects_direct_contradiction() {
        let (f, _) = check_feasibility(&constraints(&["x > 0", "x <= 0"]), 100);
        assert!(matches!(f, Feasibility::Infeasible(_)));
    }

    #[test]
    fn chains_through_variables() {
        let (f, trace) = check_feasibility(&constraints(&["a > b", "b > c", "a <= c"]), 100);
        assert!(matches!(f, Feasibility::Infeasible(_)));
        assert!(!trace.eliminated.is_empty());
    }

    #[test]
    fn satisfiable_systems_are_feasible() {
        let (f, _) = check_feasibility(&constraints(&["x >= 0", "y >= 0", "x + y <= 10"]), 100);
        assert_eq!(f, Feasibility::Feasible);
    }

    #[test]
    fn equalities_split_into_two_rows() {
        let (f, _) = check_feasibility(&constraints(&["x == 3", "x > 3"]), 100);
        assert!(matches!(f, Feasibility::Infeasible(_)));
    }

    #[test]
    fn row_limit_is_inconclusive() {
        let (f, _) = check_feasibility(&constraints(&["x > 0", "y > 0", "x + y <= 0"]), 2);
        assert!(matches!(f, Feasibility::Inconclusive(_)));
    }

    #[test]
    fn strictness_matters_at_the_boundary() {
        let (f, _) = check_feasibility(&constraints(&["x >= 0", "x <= 0"]), 100);
        assert_eq!(f, Feasibility::Feasible);
        let (f, _) = check_feasibility(&constraints(&["x >= 0", "x < 0"]), 100);
        assert!(matches!(f, Feasibility::Infeasible(_)));
    }
}
