//! Brand widening edges.
//!
//! An edge `Positive → NonNegative` records that every `Positive` value is a
//! `NonNegative` value, with a short proof sketch. Widening is the reflexive,
//! transitive closure of the edges, computed breadth-first; cycles are fine.
//! The relation is directed: `NonNegative` does not widen to `Positive`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtypingEdge {
    pub from: String,
    pub to: String,
    /// Proof sketch, e.g. `x > 0 ⇒ x >= 0`.
    pub proof: String,
    pub justification: String,
}

impl SubtypingEdge {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        proof: impl Into<String>,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            proof: proof.into(),
            justification: justification.into(),
        }
    }
}

/// Built-in widening edges: `(from, to, proof, justification)`.
pub const BUILTIN_EDGES: &[(&str, &str, &str, &str)] = &[
    ("Positive", "NonNegative", "x > 0 ⇒ x >= 0", "strict lower bound implies non-strict"),
    ("Positive", "NonZero", "x > 0 ⇒ x != 0", "positive values exclude zero"),
    ("Byte", "NonNegative", "0 <= x <= 255 ⇒ x >= 0", "lower bound of the byte range"),
    ("Port", "Positive", "1 <= x <= 65535 ⇒ x > 0", "lower bound of the port range"),
    ("Percentage", "NonNegative", "0 <= x <= 100 ⇒ x >= 0", "lower bound of the percentage range"),
];

/// Directed edges keyed by `(from, to)`.
///
/// `BTreeMap` keeps traversal order, and therefore reported paths, stable.
#[derive(Debug, Clone, Default)]
pub struct SubtypingRegistry {
    edges: BTreeMap<String, BTreeMap<String, SubtypingEdge>>,
}

impl SubtypingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for (from, to, proof, why) in BUILTIN_EDGES {
            reg.register(SubtypingEdge::new(*from, *to, *proof, *why));
        }
        reg
    }

    /// Insert or replace the edge for `(edge.from, edge.to)`.
    pub fn register(&mut self, edge: SubtypingEdge) {
        self.edges
            .entry(edge.from.clone())
            .or_default()
            .insert(edge.to.clone(), edge);
    }

    /// The direct edge only; no transitive search.
    pub fn get(&self, from: &str, to: &str) -> Option<&SubtypingEdge> {
        self.edges.get(from)?.get(to)
    }

    pub fn can_widen(&self, from: &str, to: &str) -> bool {
        self.path(from, to, |_| true).is_some()
    }

    /// Edges of a shortest widening path, `Some(vec![])` when `from == to`.
    ///
    /// `live` filters brands; edges touching a brand it rejects are skipped.
    pub fn path(
        &self,
        from: &str,
        to: &str,
        live: impl Fn(&str) -> bool,
    ) -> Option<Vec<SubtypingEdge>> {
        if from == to {
            return Some(Vec::new());
        }
        self.reachable(from, live)
            .into_iter()
            .find(|(brand, _)| brand == to)
            .map(|(_, path)| path)
    }

    /// Every brand reachable from `from` (excluding `from` itself) with a
    /// shortest path to it, in breadth-first order.
    pub fn reachable(
        &self,
        from: &str,
        live: impl Fn(&str) -> bool,
    ) -> Vec<(String, Vec<SubtypingEdge>)> {
        let mut out = Vec::new();
        if !live(from) {
            return out;
        }
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        seen.insert(from);
        let mut queue: VecDeque<(&str, Vec<SubtypingEdge>)> = VecDeque::new();
        queue.push_back((from, Vec::new()));
        while let Some((brand, path)) = queue.pop_front() {
            let Some(next) = self.edges.get(brand) else {
                continue;
            };
            for (to, edge) in next {
                if !live(to) || !seen.insert(to.as_str()) {
                    continue;
                }
                let mut extended = path.clone();
                extended.push(edge.clone());
                out.push((to.clone(), extended.clone()));
                queue.push_back((to.as_str(), extended));
            }
        }
        out
    }

    pub fn edges(&self) -> impl Iterator<Item = &SubtypingEdge> {
        self.edges.values().flat_map(|m| m.values())
    }

    pub fn len(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
