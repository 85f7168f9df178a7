//! Facts, goals and the atom view the strategies search over.
//!
//! A `TypeFact` is what the type system already knows about a variable at a
//! program point. Strategies never look at facts directly: they look at the
//! fact *atoms*, i.e. the canonical conjuncts of every fact's predicate with
//! brand annotations expanded through the catalog.

use crate::brands::BrandCatalog;
use elide_expr::{parse_expr, CompareOp, Expr, ExprParseError, Rational, PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A predicate known to hold for `variable`.
///
/// The predicate may use `$` for the variable (`$ > 0`), name it directly
/// (`x > 0`), or be a brand annotation (`x: Positive`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeFact {
    pub variable: String,
    pub predicate: Expr,
}

impl TypeFact {
    pub fn new(variable: impl Into<String>, predicate: Expr) -> Self {
        Self {
            variable: variable.into(),
            predicate,
        }
    }

    pub fn parse(variable: impl Into<String>, predicate: &str) -> Result<Self, ExprParseError> {
        Ok(Self::new(variable, parse_expr(predicate)?))
    }

    /// Parse a predicate and attach it to its first free variable.
    ///
    /// Returns `Ok(None)` for a predicate with no variables.
    pub fn infer(predicate: &str) -> Result<Option<Self>, ExprParseError> {
        let expr = parse_expr(predicate)?;
        let var = expr
            .free_vars()
            .into_iter()
            .find(|v| v != PLACEHOLDER);
        Ok(var.map(|v| Self::new(v, expr)))
    }

    /// Brand a fact is annotated with (`x: Positive`).
    pub fn brand(&self) -> Option<&str> {
        match &self.predicate {
            Expr::Branded { brand, .. } => Some(brand),
            _ => None,
        }
    }

    /// Predicate with the placeholder bound to the fact's variable.
    pub fn resolved_predicate(&self) -> Expr {
        self.predicate.instantiate(&self.variable)
    }

    /// Canonical conjuncts of the resolved predicate, brands expanded.
    ///
    /// An annotation naming a brand the catalog does not know stays as the
    /// annotation itself, so it can still match an identical annotated goal.
    pub fn atoms(&self, catalog: &BrandCatalog) -> Vec<Expr> {
        expand_brands(&self.resolved_predicate(), catalog)
            .conjuncts()
            .into_iter()
            .map(Expr::canonical)
            .collect()
    }
}

impl fmt::Display for TypeFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {{{}}}", self.variable, self.predicate)
    }
}

/// Replace every known brand annotation with its instantiated predicate.
pub fn expand_brands(expr: &Expr, catalog: &BrandCatalog) -> Expr {
    match expr {
        Expr::Branded { var, brand } => catalog
            .predicate_for_var(brand, var)
            .unwrap_or_else(|| expr.clone()),
        Expr::Logic(op, l, r) => Expr::Logic(
            *op,
            Box::new(expand_brands(l, catalog)),
            Box::new(expand_brands(r, catalog)),
        ),
        Expr::Unary(op, e) => Expr::Unary(*op, Box::new(expand_brands(e, catalog))),
        other => other.clone(),
    }
}

/// A goal to discharge, optionally tagged with the brand it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofGoal {
    pub expr: Expr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl ProofGoal {
    pub fn new(expr: Expr) -> Self {
        Self { expr, brand: None }
    }

    pub fn parse(text: &str) -> Result<Self, ExprParseError> {
        Ok(Self::new(parse_expr(text)?))
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

impl fmt::Display for ProofGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.brand {
            Some(brand) => write!(f, "{} [{brand}]", self.expr),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// One canonical atom and the fact it came from.
#[derive(Debug, Clone)]
pub struct FactAtom {
    pub expr: Expr,
    pub source: usize,
}

/// Facts plus their precomputed atoms.
#[derive(Debug, Clone)]
pub struct FactSet<'a> {
    facts: &'a [TypeFact],
    atoms: Vec<FactAtom>,
}

impl<'a> FactSet<'a> {
    pub fn new(facts: &'a [TypeFact], catalog: &BrandCatalog) -> Self {
        let atoms = facts
            .iter()
            .enumerate()
            .flat_map(|(source, fact)| {
                fact.atoms(catalog)
                    .into_iter()
                    .map(move |expr| FactAtom { expr, source })
            })
            .collect();
        Self { facts, atoms }
    }

    pub fn facts(&self) -> &'a [TypeFact] {
        self.facts
    }

    pub fn atoms(&self) -> &[FactAtom] {
        &self.atoms
    }

    pub fn fact(&self, atom: &FactAtom) -> &'a TypeFact {
        &self.facts[atom.source]
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Atom syntactically identical to a canonical condition.
    pub fn find_identical(&self, canonical: &Expr) -> Option<&FactAtom> {
        self.atoms.iter().find(|a| &a.expr == canonical)
    }

    /// Canonical comparisons `lhs op rhs` from the atoms.
    pub fn comparisons(&self) -> impl Iterator<Item = (CompareOp, &Expr, &Expr, &FactAtom)> {
        self.atoms.iter().filter_map(|a| match &a.expr {
            Expr::Compare(op, l, r) => Some((*op, l.as_ref(), r.as_ref(), a)),
            _ => None,
        })
    }

    /// Tightest literal lower bound for `term`: `(bound, strict, source fact)`.
    ///
    /// Understands `term > k`, `term >= k` and `term == k` in either order.
    pub fn lower_bound(&self, term: &Expr) -> Option<(Rational, bool, &'a TypeFact)> {
        let mut best: Option<(Rational, bool, &'a TypeFact)> = None;
        for (op, l, r, atom) in self.comparisons() {
            let candidate = match op {
                CompareOp::Gt | CompareOp::Ge if l == term => {
                    r.as_num().map(|k| (k, op == CompareOp::Gt))
                }
                CompareOp::Eq if l == term => r.as_num().map(|k| (k, false)),
                CompareOp::Eq if r == term => l.as_num().map(|k| (k, false)),
                _ => None,
            };
            let Some((k, strict)) = candidate else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((bk, bs, _)) => k > *bk || (k == *bk && strict && !bs),
            };
            if better {
                best = Some((k, strict, self.fact(atom)));
            }
        }
        best
    }

    /// Tightest literal upper bound for `term` (`k > term`, `k >= term`, `term == k`).
    pub fn upper_bound(&self, term: &Expr) -> Option<(Rational, bool, &'a TypeFact)> {
        let mut best: Option<(Rational, bool, &'a TypeFact)> = None;
        for (op, l, r, atom) in self.comparisons() {
            let candidate = match op {
                CompareOp::Gt | CompareOp::Ge if r == term => {
                    l.as_num().map(|k| (k, op == CompareOp::Gt))
                }
                CompareOp::Eq if l == term => r.as_num().map(|k| (k, false)),
                CompareOp::Eq if r == term => l.as_num().map(|k| (k, false)),
                _ => None,
            };
            let Some((k, strict)) = candidate else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((bk, bs, _)) => k < *bk || (k == *bk && strict && !bs),
            };
            if better {
                best = Some((k, strict, self.fact(atom)));
            }
        }
        best
    }

    /// Facts showing `term > 0`; literals need none.
    pub fn known_positive(&self, term: &Expr) -> Option<Vec<&'a TypeFact>> {
        if let Some(k) = term.as_num() {
            return k.is_positive().then(Vec::new);
        }
        let (k, strict, fact) = self.lower_bound(term)?;
        (k.is_positive() || (k.is_zero() && strict)).then(|| vec![fact])
    }

    /// Facts showing `term >= 0`; literals need none.
    pub fn known_non_negative(&self, term: &Expr) -> Option<Vec<&'a TypeFact>> {
        if let Some(k) = term.as_num() {
            return (!k.is_negative()).then(Vec::new);
        }
        let (k, _, fact) = self.lower_bound(term)?;
        (!k.is_negative()).then(|| vec![fact])
    }
}
