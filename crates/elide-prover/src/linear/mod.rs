//! Linear arithmetic over the fact atoms.
//!
//! Two layers:
//! - `fast_path`: a handful of common shapes (sums of bounded terms, bound
//!   weakening, two-step chains), matched directly;
//! - refutation: the negated goal is added to the linear facts and
//!   Fourier–Motzkin looks for a contradiction.
//!
//! Both refuse goals with non-linear arithmetic (`x * y`, `x / y`, `x ** 2`),
//! and the refutation layer silently skips non-linear or `!=` facts.

pub mod fast_path;
pub mod form;
pub mod fourier_motzkin;

pub use fast_path::{try_simple_linear_proof, FAST_PATH_RULE};
pub use form::{is_linear, linearize, LinearConstraint, LinearForm, LinearizeError, Relation};
pub use fourier_motzkin::{check_feasibility, EliminationTrace, Feasibility};

use crate::fact::{FactSet, TypeFact};
use elide_expr::{CompareOp, Expr, LogicOp};

pub const REFUTATION_RULE: &str = "fourier_motzkin";

/// Outcome of a linear proof attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearProof {
    pub rule: &'static str,
    pub proven: bool,
    /// Why it succeeded, or why it did not.
    pub reason: String,
    pub used_facts: Vec<TypeFact>,
    /// Set when a limit (rather than a genuine model) stopped the attempt.
    pub inconclusive: bool,
}

impl LinearProof {
    pub fn proved<'a>(
        rule: &'static str,
        reason: impl Into<String>,
        used: impl IntoIterator<Item = &'a TypeFact>,
    ) -> Self {
        let mut used_facts: Vec<TypeFact> = Vec::new();
        for f in used {
            if !used_facts.contains(f) {
                used_facts.push(f.clone());
            }
        }
        Self {
            rule,
            proven: true,
            reason: reason.into(),
            used_facts,
            inconclusive: false,
        }
    }

    pub fn failed(rule: &'static str, reason: impl Into<String>) -> Self {
        Self {
            rule,
            proven: false,
            reason: reason.into(),
            used_facts: Vec::new(),
            inconclusive: false,
        }
    }

    fn inconclusive(rule: &'static str, reason: impl Into<String>) -> Self {
        Self {
            inconclusive: true,
            ..Self::failed(rule, reason)
        }
    }
}

/// Prove a canonical goal by refuting its negation against the linear facts.
pub fn prove_by_refutation(goal: &Expr, facts: &FactSet<'_>, max_rows: usize) -> LinearProof {
    let mut assumptions = Vec::new();
    let mut sources: Vec<&TypeFact> = Vec::new();
    for (op, l, r, atom) in facts.comparisons() {
        if op == CompareOp::Ne {
            continue;
        }
        if let Ok(c) = form::constraint_from_comparison(op, l, r) {
            assumptions.push(c);
            let f = facts.fact(atom);
            if !sources.contains(&f) {
                sources.push(f);
            }
        }
    }
    match refute(goal, &assumptions, max_rows) {
        Ok(detail) => LinearProof::proved(REFUTATION_RULE, detail, sources),
        Err(Refusal::Limit(reason)) => LinearProof::inconclusive(REFUTATION_RULE, reason),
        Err(Refusal::NotProven(reason)) => LinearProof::failed(REFUTATION_RULE, reason),
    }
}

enum Refusal {
    NotProven(String),
    Limit(String),
}

fn refute(goal: &Expr, assumptions: &[LinearConstraint], max_rows: usize) -> Result<String, Refusal> {
    match goal {
        Expr::Bool(true) => Ok("trivially true".into()),
        Expr::Logic(LogicOp::And, l, r) => {
            let a = refute(l, assumptions, max_rows)?;
            let b = refute(r, assumptions, max_rows)?;
            Ok(format!("{a}; {b}"))
        }
        Expr::Logic(LogicOp::Or, l, r) => {
            let first = match refute(l, assumptions, max_rows) {
                Ok(detail) => return Ok(detail),
                Err(refusal) => refusal,
            };
            match (first, refute(r, assumptions, max_rows)) {
                (_, Ok(detail)) => Ok(detail),
                (Refusal::Limit(why), Err(_)) | (_, Err(Refusal::Limit(why))) => {
                    Err(Refusal::Limit(why))
                }
                (_, Err(second)) => Err(second),
            }
        }
        Expr::Compare(op, l, r) => {
            let negations: Vec<CompareOp> = match op {
                CompareOp::Eq => vec![CompareOp::Lt, CompareOp::Gt],
                other => vec![other.negated()],
            };
            let mut details = Vec::new();
            for neg in negations {
                let c = form::constraint_from_comparison(neg, l, r)
                    .map_err(|e| Refusal::NotProven(e.to_string()))?;
                let mut system = assumptions.to_vec();
                system.push(c.clone());
                match check_feasibility(&system, max_rows) {
                    (Feasibility::Infeasible(contradiction), trace) => {
                        let via = if trace.eliminated.is_empty() {
                            String::new()
                        } else {
                            format!(" after eliminating {}", trace.eliminated.join(", "))
                        };
                        details.push(format!("negation `{c}` yields `{contradiction}`{via}"));
                    }
                    (Feasibility::Feasible, _) => {
                        return Err(Refusal::NotProven(format!(
                            "negation `{c}` is consistent with the linear facts"
                        )));
                    }
                    (Feasibility::Inconclusive(why), _) => return Err(Refusal::Limit(why)),
                }
            }
            Ok(details.join("; "))
        }
        other => Err(Refusal::NotProven(format!(
            "`{other}` is not a linear arithmetic condition"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brands::BrandCatalog;
    use elide_expr::parse_expr;

    fn refute_goal(goal: &str, specs: &[(&str, &str)]) -> LinearProof {
        refute_with_rows(goal, specs, 256)
    }

    fn refute_with_rows(goal: &str, specs: &[(&str, &str)], max_rows: usize) -> LinearProof {
        let catalog = BrandCatalog::new();
        let facts: Vec<TypeFact> = specs
            .iter()
            .map(|(v, p)| TypeFact::parse(*v, p).expect("fact"))
            .collect();
        let set = FactSet::new(&facts, &catalog);
        prove_by_refutation(&parse_expr(goal).expect("goal").canonical(), &set, max_rows)
    }

    #[test]
    fn proves_combined_bounds() {
        let p = refute_goal("2 * x + y > 3", &[("x", "x >= 1"), ("y", "y > 1")]);
        assert!(p.proven, "{}", p.reason);
    }

    #[test]
    fn proves_range_membership() {
        let p = refute_goal("b + 1 <= 256 && b > -1", &[("b", "b: Byte")]);
        assert!(p.proven, "{}", p.reason);
    }

    #[test]
    fn proves_equalities_both_ways() {
        assert!(refute_goal("x == 4", &[("x", "x >= 4"), ("x", "x <= 4")]).proven);
        assert!(!refute_goal("x == 4", &[("x", "x >= 4")]).proven);
    }

    #[test]
    fn skips_non_linear_and_disequality_facts() {
        let p = refute_goal("x > 0", &[("x", "x * x > 0"), ("x", "x != 0")]);
        assert!(!p.proven);
        assert!(p.used_facts.is_empty());
    }

    #[test]
    fn rejects_non_linear_goals() {
        let p = refute_goal("x * y > 0", &[("x", "x > 0"), ("y", "y > 0")]);
        assert!(!p.proven);
        assert!(p.reason.contains("non-linear"), "{}", p.reason);
    }

    #[test]
    fn disjunction_needs_one_side() {
        assert!(refute_goal("x > 10 || x > 0", &[("x", "x >= 1")]).proven);
    }

    #[test]
    fn disjunction_keeps_row_limit_from_either_side() {
        // `x != 0` negates to an equality (two rows); `x > 0` needs one.
        for goal in ["x != 0 || x > 0", "x > 0 || x != 0"] {
            let p = refute_with_rows(goal, &[], 1);
            assert!(!p.proven);
            assert!(p.inconclusive, "{goal}: {}", p.reason);
            assert!(p.reason.contains("exceed the limit"), "{}", p.reason);
        }
        let p = refute_with_rows("x > 1 || x > 0", &[], 1);
        assert!(!p.proven);
        assert!(!p.inconclusive);
    }
}
