//! Pattern-based linear proofs that avoid building a constraint system.
//!
//! Every pattern here is an instance of something Fourier–Motzkin would also
//! prove from the same facts; the fast path only exists because most contract
//! conditions are one of these shapes and matching them is cheap.

use super::form::{is_linear, linearize};
use super::LinearProof;
use crate::fact::{FactSet, TypeFact};
use elide_expr::{BinaryOp, CompareOp, Expr, Rational};

pub const FAST_PATH_RULE: &str = "linear_fast_path";

/// Try the common shapes on a canonical goal.
pub fn try_simple_linear_proof(goal: &Expr, facts: &FactSet<'_>) -> LinearProof {
    if !is_linear(goal) {
        return LinearProof::failed(FAST_PATH_RULE, format!("`{goal}` is not linear"));
    }
    let Expr::Compare(op @ (CompareOp::Gt | CompareOp::Ge), l, r) = goal else {
        return LinearProof::failed(FAST_PATH_RULE, "no fast-path shape applies");
    };
    let strict = *op == CompareOp::Gt;

    let attempt = match (l.as_num(), r.as_num()) {
        (None, Some(k)) => sum_of_bounded(l, k, strict, facts)
            .or_else(|| lower_bound_weakening(l, k, strict, facts)),
        (Some(k), None) => upper_bound_weakening(r, k, strict, facts),
        _ => None,
    };
    let attempt = attempt.or_else(|| chained_bound(l, r, strict, facts));

    match attempt {
        Some((reason, used)) => LinearProof::proved(FAST_PATH_RULE, reason, used),
        None => LinearProof::failed(FAST_PATH_RULE, "no fast-path shape applies"),
    }
}

type Found<'a> = Option<(String, Vec<&'a TypeFact>)>;

/// `a + b + … > 0` (or `>= 0`) from per-summand bounds.
///
/// Strict goals need every summand non-negative and at least one positive.
fn sum_of_bounded<'a>(term: &Expr, k: Rational, strict: bool, facts: &FactSet<'a>) -> Found<'a> {
    if !k.is_zero() {
        return None;
    }
    let mut summands = Vec::new();
    flatten_sum(term, &mut summands);
    if summands.len() < 2 {
        return None;
    }
    let mut used = Vec::new();
    let mut any_positive = false;
    for s in &summands {
        if let Some(f) = facts.known_positive(s) {
            any_positive = true;
            used.extend(f);
        } else {
            used.extend(facts.known_non_negative(s)?);
        }
    }
    if strict && !any_positive {
        return None;
    }
    let what = if strict { "positive" } else { "non-negative" };
    Some((format!("sum of bounded terms is {what}"), used))
}

fn flatten_sum<'e>(e: &'e Expr, out: &mut Vec<&'e Expr>) {
    match e {
        Expr::Binary(BinaryOp::Add, l, r) => {
            flatten_sum(l, out);
            flatten_sum(r, out);
        }
        other => out.push(other),
    }
}

/// `t > k` from a known `t > k'` with `k' >= k`.
fn lower_bound_weakening<'a>(
    term: &Expr,
    k: Rational,
    strict: bool,
    facts: &FactSet<'a>,
) -> Found<'a> {
    let (have, have_strict, fact) = facts.lower_bound(term)?;
    let holds = if strict {
        have > k || (have == k && have_strict)
    } else {
        have >= k
    };
    let rel = if have_strict { ">" } else { ">=" };
    holds.then(|| (format!("known bound {term} {rel} {have}"), vec![fact]))
}

/// `k > t` from a known `k' > t` with `k' <= k`.
fn upper_bound_weakening<'a>(
    term: &Expr,
    k: Rational,
    strict: bool,
    facts: &FactSet<'a>,
) -> Found<'a> {
    let (have, have_strict, fact) = facts.upper_bound(term)?;
    let holds = if strict {
        have < k || (have == k && have_strict)
    } else {
        have <= k
    };
    let rel = if have_strict { "<" } else { "<=" };
    holds.then(|| (format!("known bound {term} {rel} {have}"), vec![fact]))
}

/// `a > c` from `a > c` (weakened), or from `a > b` and `b > c`.
fn chained_bound<'a>(a: &Expr, c: &Expr, strict: bool, facts: &FactSet<'a>) -> Found<'a> {
    let links: Vec<_> = facts
        .comparisons()
        .filter(|(op, l, r, _)| {
            matches!(op, CompareOp::Gt | CompareOp::Ge)
                && linearize(l).is_ok()
                && linearize(r).is_ok()
        })
        .collect();
    for (op, l, r, atom) in &links {
        if *l == a && *r == c && (op.is_strict() || !strict) {
            return Some((format!("known {l} {} {r}", op.symbol()), vec![facts.fact(atom)]));
        }
    }
    for (op1, l1, m1, atom1) in &links {
        if *l1 != a {
            continue;
        }
        for (op2, m2, r2, atom2) in &links {
            if m1 != m2 || *r2 != c {
                continue;
            }
            if strict && !(op1.is_strict() || op2.is_strict()) {
                continue;
            }
            return Some((
                format!(
                    "{a} {} {m1} {} {c}",
                    op1.symbol(),
                    op2.symbol()
                ),
                vec![facts.fact(atom1), facts.fact(atom2)],
            ));
        }
    }
    None
}
