//! Algebraic rewrite rules.
//!
//! A rule looks at a canonical goal and the fact atoms and either proves the
//! goal outright (reporting which facts it leaned on) or declines. Rules are
//! tried in registration order; a rule that errors or panics is contained
//! and reported as a fault, never propagated.

use crate::fact::{FactSet, TypeFact};
use elide_expr::{BinaryOp, CompareOp, Expr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// What a matching rule reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMatch {
    pub used_facts: Vec<TypeFact>,
    pub justification: String,
    /// Intermediate conditions the rule established along the way.
    pub subgoals: Vec<Expr>,
}

impl RuleMatch {
    pub fn new(justification: impl Into<String>) -> Self {
        Self {
            justification: justification.into(),
            ..Self::default()
        }
    }

    pub fn using<'a>(mut self, facts: impl IntoIterator<Item = &'a TypeFact>) -> Self {
        for f in facts {
            if !self.used_facts.contains(f) {
                self.used_facts.push(f.clone());
            }
        }
        self
    }

    pub fn with_subgoals(mut self, subgoals: Vec<Expr>) -> Self {
        self.subgoals = subgoals;
        self
    }
}

pub trait AlgebraicRule: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// `goal` is canonical (see `Expr::canonical`).
    fn apply(&self, goal: &Expr, facts: &FactSet<'_>) -> anyhow::Result<Option<RuleMatch>>;
}

/// Rule built from a boolean matcher over the raw facts.
///
/// A match cites every fact, since the matcher does not say which it used.
pub struct FnRule<F> {
    name: String,
    description: String,
    matcher: F,
}

impl<F> FnRule<F>
where
    F: Fn(&Expr, &[TypeFact]) -> bool + Send + Sync,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, matcher: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            matcher,
        }
    }
}

impl<F> AlgebraicRule for FnRule<F>
where
    F: Fn(&Expr, &[TypeFact]) -> bool + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&self, goal: &Expr, facts: &FactSet<'_>) -> anyhow::Result<Option<RuleMatch>> {
        if (self.matcher)(goal, facts.facts()) {
            Ok(Some(
                RuleMatch::new(self.description.clone()).using(facts.facts()),
            ))
        } else {
            Ok(None)
        }
    }
}

/// Result of running one rule with fault containment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEvaluation {
    Matched(RuleMatch),
    NoMatch,
    Faulted(String),
}

pub fn evaluate_rule(rule: &dyn AlgebraicRule, goal: &Expr, facts: &FactSet<'_>) -> RuleEvaluation {
    match catch_unwind(AssertUnwindSafe(|| rule.apply(goal, facts))) {
        Ok(Ok(Some(m))) => RuleEvaluation::Matched(m),
        Ok(Ok(None)) => RuleEvaluation::NoMatch,
        Ok(Err(err)) => RuleEvaluation::Faulted(format!("{err:#}")),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "rule panicked".to_string());
            RuleEvaluation::Faulted(format!("panic: {msg}"))
        }
    }
}

// ============================================================================
// Built-in rules
// ============================================================================

/// The goal is literally one of the fact atoms.
pub struct IdentityRule;

impl AlgebraicRule for IdentityRule {
    fn name(&self) -> &str {
        "identity"
    }

    fn description(&self) -> &str {
        "goal is syntactically identical to a known fact"
    }

    fn apply(&self, goal: &Expr, facts: &FactSet<'_>) -> anyhow::Result<Option<RuleMatch>> {
        Ok(facts.find_identical(goal).map(|atom| {
            RuleMatch::new(format!("`{goal}` is assumed")).using([facts.fact(atom)])
        }))
    }
}

/// `t >= 0` from `t > 0` (or any positive lower bound).
pub struct PositiveImpliesNonNegative;

impl AlgebraicRule for PositiveImpliesNonNegative {
    fn name(&self) -> &str {
        "positive_implies_non_negative"
    }

    fn description(&self) -> &str {
        "a positive value is non-negative"
    }

    fn apply(&self, goal: &Expr, facts: &FactSet<'_>) -> anyhow::Result<Option<RuleMatch>> {
        let Some((term, _)) = zero_comparison(goal, CompareOp::Ge) else {
            return Ok(None);
        };
        if term.as_num().is_some() {
            return Ok(None);
        }
        Ok(facts.known_positive(term).map(|used| {
            RuleMatch::new(format!("{term} > 0 implies {term} >= 0"))
                .using(used)
                .with_subgoals(vec![positive(term)])
        }))
    }
}

/// `a + b + … > 0` when every summand is positive.
pub struct SumOfPositives;

impl AlgebraicRule for SumOfPositives {
    fn name(&self) -> &str {
        "sum_of_positives"
    }

    fn description(&self) -> &str {
        "a sum of positive terms is positive"
    }

    fn apply(&self, goal: &Expr, facts: &FactSet<'_>) -> anyhow::Result<Option<RuleMatch>> {
        let Some((term, _)) = zero_comparison(goal, CompareOp::Gt) else {
            return Ok(None);
        };
        let summands = flatten(term, BinaryOp::Add);
        all_positive(&summands, facts, "sum")
    }
}

/// `a * b * … > 0` when every factor is positive.
pub struct ProductOfPositives;

impl AlgebraicRule for ProductOfPositives {
    fn name(&self) -> &str {
        "product_of_positives"
    }

    fn description(&self) -> &str {
        "a product of positive factors is positive"
    }

    fn apply(&self, goal: &Expr, facts: &FactSet<'_>) -> anyhow::Result<Option<RuleMatch>> {
        let Some((term, _)) = zero_comparison(goal, CompareOp::Gt) else {
            return Ok(None);
        };
        let factors = flatten(term, BinaryOp::Mul);
        all_positive(&factors, facts, "product")
    }
}

/// `a > c` from `a > b` and `b > c` (non-strict links give non-strict results).
pub struct Transitivity;

impl AlgebraicRule for Transitivity {
    fn name(&self) -> &str {
        "transitivity"
    }

    fn description(&self) -> &str {
        "orderings chain through a shared middle term"
    }

    fn apply(&self, goal: &Expr, facts: &FactSet<'_>) -> anyhow::Result<Option<RuleMatch>> {
        let Expr::Compare(goal_op @ (CompareOp::Gt | CompareOp::Ge), a, c) = goal else {
            return Ok(None);
        };
        let links: Vec<_> = facts
            .comparisons()
            .filter(|(op, ..)| matches!(op, CompareOp::Gt | CompareOp::Ge))
            .collect();
        for (op1, l1, m1, atom1) in &links {
            if *l1 != a.as_ref() {
                continue;
            }
            for (op2, m2, r2, atom2) in &links {
                if m1 != m2 || *r2 != c.as_ref() {
                    continue;
                }
                let strict = op1.is_strict() || op2.is_strict();
                if *goal_op == CompareOp::Gt && !strict {
                    continue;
                }
                let first = Expr::compare(*op1, (*l1).clone(), (*m1).clone());
                let second = Expr::compare(*op2, (*m2).clone(), (*r2).clone());
                return Ok(Some(
                    RuleMatch::new(format!("{first} and {second} give {goal}"))
                        .using([facts.fact(atom1), facts.fact(atom2)])
                        .with_subgoals(vec![first, second]),
                ));
            }
        }
        Ok(None)
    }
}

/// The built-in rules in their evaluation order.
pub fn builtin_rules() -> Vec<Arc<dyn AlgebraicRule>> {
    vec![
        Arc::new(IdentityRule),
        Arc::new(PositiveImpliesNonNegative),
        Arc::new(SumOfPositives),
        Arc::new(ProductOfPositives),
        Arc::new(Transitivity),
    ]
}

/// `term op 0` → `term`.
fn zero_comparison(goal: &Expr, op: CompareOp) -> Option<(&Expr, CompareOp)> {
    match goal {
        Expr::Compare(o, l, r) if *o == op && r.as_num().is_some_and(|k| k.is_zero()) => {
            Some((l.as_ref(), *o))
        }
        _ => None,
    }
}

fn positive(term: &Expr) -> Expr {
    Expr::compare(CompareOp::Gt, term.clone(), Expr::int(0))
}

fn flatten(term: &Expr, op: BinaryOp) -> Vec<&Expr> {
    let mut out = Vec::new();
    fn walk<'a>(e: &'a Expr, op: BinaryOp, out: &mut Vec<&'a Expr>) {
        match e {
            Expr::Binary(o, l, r) if *o == op => {
                walk(l, op, out);
                walk(r, op, out);
            }
            other => out.push(other),
        }
    }
    walk(term, op, &mut out);
    out
}

fn all_positive(
    terms: &[&Expr],
    facts: &FactSet<'_>,
    what: &str,
) -> anyhow::Result<Option<RuleMatch>> {
    if terms.len() < 2 {
        return Ok(None);
    }
    let mut m = RuleMatch::default();
    for term in terms {
        let Some(used) = facts.known_positive(term) else {
            return Ok(None);
        };
        m = m.using(used);
        m.subgoals.push(positive(term));
    }
    let listed: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
    m.justification = format!("{what} of positive terms {}", listed.join(", "));
    Ok(Some(m))
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered rule set keyed by rule name.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<Arc<dyn AlgebraicRule>>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for rule in builtin_rules() {
            reg.register(rule);
        }
        reg
    }

    /// Insert a rule; a rule with the same name is replaced in place.
    pub fn register(&mut self, rule: Arc<dyn AlgebraicRule>) {
        match self.rules.iter().position(|r| r.name() == rule.name()) {
            Some(i) => self.rules[i] = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AlgebraicRule>> {
        self.rules.iter().find(|r| r.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn AlgebraicRule>> {
        self.rules.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brands::BrandCatalog;
    use elide_expr::parse_expr;

    fn goal(text: &str) -> Expr {
        parse_expr(text).expect("parse goal").canonical()
    }

    fn facts(specs: &[(&str, &str)]) -> Vec<TypeFact> {
        specs
            .iter()
            .map(|(v, p)| TypeFact::parse(*v, p).expect("parse fact"))
            .collect()
    }

    fn run(rule: &dyn AlgebraicRule, g: &str, fs: &[TypeFact]) -> RuleEvaluation {
        let catalog = BrandCatalog::new();
        let set = FactSet::new(fs, &catalog);
        evaluate_rule(rule, &goal(g), &set)
    }

    #[test]
    fn sum_of_positives_cites_both_facts() {
        let fs = facts(&[("x", "x > 0"), ("y", "y > 0")]);
        let RuleEvaluation::Matched(m) = run(&SumOfPositives, "x + y > 0", &fs) else {
            panic!("expected a match");
        };
        assert_eq!(m.used_facts.len(), 2);
        assert_eq!(m.subgoals.len(), 2);
    }

    #[test]
    fn sum_of_positives_needs_every_summand() {
        let fs = facts(&[("x", "x > 0"), ("y", "y >= 0")]);
        assert_eq!(run(&SumOfPositives, "x + y > 0", &fs), RuleEvaluation::NoMatch);
    }

    #[test]
    fn product_of_positives_uses_brands() {
        let fs = facts(&[("x", "x: Positive"), ("y", "y: Positive")]);
        assert!(matches!(
            run(&ProductOfPositives, "0 < x * y", &fs),
            RuleEvaluation::Matched(_)
        ));
    }

    #[test]
    fn transitivity_respects_strictness() {
        let fs = facts(&[("a", "a > b"), ("b", "b > c")]);
        assert!(matches!(run(&Transitivity, "a > c", &fs), RuleEvaluation::Matched(_)));

        let fs = facts(&[("a", "a >= b"), ("b", "b >= c")]);
        assert_eq!(run(&Transitivity, "a > c", &fs), RuleEvaluation::NoMatch);
        assert!(matches!(run(&Transitivity, "c <= a", &fs), RuleEvaluation::Matched(_)));
    }

    #[test]
    fn positive_implies_non_negative() {
        let fs = facts(&[("n", "n > 0")]);
        assert!(matches!(
            run(&PositiveImpliesNonNegative, "n >= 0", &fs),
            RuleEvaluation::Matched(_)
        ));
        assert_eq!(
            run(&PositiveImpliesNonNegative, "n >= 1", &fs),
            RuleEvaluation::NoMatch
        );
    }

    #[test]
    fn panicking_rule_is_contained() {
        let rule = FnRule::new("boom", "always panics", |_: &Expr, _: &[TypeFact]| {
            panic!("boom")
        });
        let RuleEvaluation::Faulted(msg) = run(&rule, "x > 0", &[]) else {
            panic!("expected a fault");
        };
        assert!(msg.contains("boom"));
    }

    #[test]
    fn registration_replaces_by_name() {
        let mut reg = RuleRegistry::with_builtins();
        let before = reg.len();
        reg.register(Arc::new(FnRule::new(
            "transitivity",
            "replacement",
            |_: &Expr, _: &[TypeFact]| false,
        )));
        assert_eq!(reg.len(), before);
        assert_eq!(
            reg.get("transitivity").map(|r| r.description().to_string()),
            Some("replacement".to_string())
        );
        assert_eq!(reg.names().last(), Some(&"transitivity"));
    }
}
