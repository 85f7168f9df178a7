//! Decidability classification of brands.
//!
//! The classification drives what happens when the pipeline misses: a
//! `compile-time` brand that still needs a runtime check is surprising and
//! gets a build warning, `runtime` brands are expected to be checked at
//! runtime and fail quietly.

use ahash::AHashMap;
use elide_expr::Expr;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decidability {
    /// Always provable statically (literal bounds, brand identity).
    CompileTime,
    /// Provable by a decision procedure (linear arithmetic, SMT).
    Decidable,
    /// Depends on runtime data; elision is never expected.
    Runtime,
}

impl Decidability {
    pub fn as_str(self) -> &'static str {
        match self {
            Decidability::CompileTime => "compile-time",
            Decidability::Decidable => "decidable",
            Decidability::Runtime => "runtime",
        }
    }
}

impl fmt::Display for Decidability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy the front-end should expect to discharge a brand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferredStrategy {
    Constant,
    TypeIdentity,
    Algebraic,
    Linear,
    Smt,
    RuntimeCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecidabilityInfo {
    pub brand: String,
    pub predicate: Expr,
    pub decidability: Decidability,
    pub preferred_strategy: PreferredStrategy,
}

impl DecidabilityInfo {
    pub fn new(
        brand: impl Into<String>,
        predicate: Expr,
        decidability: Decidability,
        preferred_strategy: PreferredStrategy,
    ) -> Self {
        Self {
            brand: brand.into(),
            predicate,
            decidability,
            preferred_strategy,
        }
    }
}

/// Only `compile-time` brands are expected to be discharged without a
/// decision procedure.
pub fn can_prove_at_compile_time(d: Decidability) -> bool {
    d == Decidability::CompileTime
}

pub fn must_check_at_runtime(d: Decidability) -> bool {
    d == Decidability::Runtime
}

/// Built-in classifications: `(brand, decidability, strategy)`.
pub const BUILTIN_DECIDABILITY: &[(&str, Decidability, PreferredStrategy)] = &[
    ("Positive", Decidability::CompileTime, PreferredStrategy::TypeIdentity),
    ("NonNegative", Decidability::CompileTime, PreferredStrategy::TypeIdentity),
    ("Byte", Decidability::Decidable, PreferredStrategy::Linear),
    ("Port", Decidability::Decidable, PreferredStrategy::Linear),
    ("Percentage", Decidability::Decidable, PreferredStrategy::Linear),
    ("NonZero", Decidability::Decidable, PreferredStrategy::Smt),
    ("NonEmpty", Decidability::Decidable, PreferredStrategy::Linear),
    ("Finite", Decidability::Runtime, PreferredStrategy::RuntimeCheck),
    ("Trimmed", Decidability::Runtime, PreferredStrategy::RuntimeCheck),
];

#[derive(Debug, Clone, Default)]
pub struct DecidabilityRegistry {
    entries: AHashMap<String, DecidabilityInfo>,
}

impl DecidabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `info.brand`.
    pub fn register(&mut self, info: DecidabilityInfo) {
        self.entries.insert(info.brand.clone(), info);
    }

    pub fn get(&self, brand: &str) -> Option<&DecidabilityInfo> {
        self.entries.get(brand)
    }

    /// Entries sorted by brand name.
    pub fn entries(&self) -> Vec<&DecidabilityInfo> {
        let mut out: Vec<&DecidabilityInfo> = self.entries.values().collect();
        out.sort_by(|a, b| a.brand.cmp(&b.brand));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elide_expr::parse_expr;

    #[test]
    fn classification_predicates() {
        assert!(can_prove_at_compile_time(Decidability::CompileTime));
        assert!(!can_prove_at_compile_time(Decidability::Decidable));
        assert!(!can_prove_at_compile_time(Decidability::Runtime));
        assert!(must_check_at_runtime(Decidability::Runtime));
        assert!(!must_check_at_runtime(Decidability::Decidable));
    }

    #[test]
    fn registration_overwrites_by_brand() {
        let mut reg = DecidabilityRegistry::new();
        let pred = parse_expr("$ > 0").expect("parse");
        reg.register(DecidabilityInfo::new(
            "Positive",
            pred.clone(),
            Decidability::Runtime,
            PreferredStrategy::RuntimeCheck,
        ));
        reg.register(DecidabilityInfo::new(
            "Positive",
            pred,
            Decidability::CompileTime,
            PreferredStrategy::TypeIdentity,
        ));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.get("Positive").map(|i| i.decidability),
            Some(Decidability::CompileTime)
        );
    }

    #[test]
    fn serializes_kebab_case() {
        let json = serde_json::to_string(&Decidability::CompileTime).expect("json");
        assert_eq!(json, "\"compile-time\"");
    }
}
