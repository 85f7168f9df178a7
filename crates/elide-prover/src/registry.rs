//! The registry context: rules, widening edges, decidability and brands.
//!
//! The engine borrows a context for the duration of a proof, so the registry
//! cannot change under a running proof. Long-lived callers that need to
//! mutate between proofs share one through `SharedRegistry`; the
//! process-wide default lives behind `shared_registry()`.

use crate::brands::{BrandCatalog, BrandFamily};
use crate::decidability::{
    Decidability, DecidabilityInfo, DecidabilityRegistry, PreferredStrategy, BUILTIN_DECIDABILITY,
};
use crate::rules::{AlgebraicRule, RuleRegistry};
use crate::stamp::{RegistryStamp, RegistryToken};
use crate::subtyping::{SubtypingEdge, SubtypingRegistry};
use elide_expr::{Expr, PLACEHOLDER};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
pub struct RegistryContext {
    token: RegistryToken,
    generation: u64,
    rules: RuleRegistry,
    subtyping: SubtypingRegistry,
    decidability: DecidabilityRegistry,
    brands: BrandCatalog,
}

impl Default for RegistryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryContext {
    /// A context preloaded with the built-in rules, edges, classifications and brands.
    pub fn new() -> Self {
        let brands = BrandCatalog::new();
        let mut decidability = DecidabilityRegistry::new();
        for (brand, class, strategy) in BUILTIN_DECIDABILITY {
            let predicate = brands
                .predicate(brand)
                .unwrap_or_else(|| Expr::branded(PLACEHOLDER, *brand));
            decidability.register(DecidabilityInfo::new(*brand, predicate, *class, *strategy));
        }
        Self {
            token: RegistryToken::new(),
            generation: 0,
            rules: RuleRegistry::with_builtins(),
            subtyping: SubtypingRegistry::with_builtins(),
            decidability,
            brands,
        }
    }

    /// A context with nothing registered.
    pub fn empty() -> Self {
        Self {
            token: RegistryToken::new(),
            generation: 0,
            rules: RuleRegistry::new(),
            subtyping: SubtypingRegistry::new(),
            decidability: DecidabilityRegistry::new(),
            brands: BrandCatalog::empty(),
        }
    }

    pub fn stamp(&self) -> RegistryStamp {
        RegistryStamp {
            token: self.token,
            generation: self.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn bump(&mut self) {
        self.generation += 1;
    }

    // ---------------------------------------------------------------------
    // Registration (insert-or-overwrite)
    // ---------------------------------------------------------------------

    pub fn register_algebraic_rule(&mut self, rule: impl AlgebraicRule + 'static) {
        self.register_algebraic_rule_arc(Arc::new(rule));
    }

    pub fn register_algebraic_rule_arc(&mut self, rule: Arc<dyn AlgebraicRule>) {
        tracing::debug!(rule = rule.name(), "registering algebraic rule");
        self.rules.register(rule);
        self.bump();
    }

    /// Edges naming brands the catalog does not know are stored but inert
    /// until both brands are registered.
    pub fn register_subtyping_rule(&mut self, edge: SubtypingEdge) {
        if !self.brands.contains(&edge.from) || !self.brands.contains(&edge.to) {
            tracing::debug!(
                from = %edge.from,
                to = %edge.to,
                "subtyping edge names an unregistered brand; inert until registered"
            );
        }
        self.subtyping.register(edge);
        self.bump();
    }

    pub fn register_decidability(&mut self, info: DecidabilityInfo) {
        self.decidability.register(info);
        self.bump();
    }

    pub fn register_brand(&mut self, name: impl Into<String>, predicate: Expr) {
        self.brands.register(name, predicate);
        self.bump();
    }

    pub fn register_brand_family(&mut self, family: BrandFamily) {
        self.brands.register_family(family);
        self.bump();
    }

    pub fn clear_algebraic_rules(&mut self) {
        self.rules.clear();
        self.bump();
    }

    pub fn clear_subtyping_rules(&mut self) {
        self.subtyping.clear();
        self.bump();
    }

    pub fn clear_decidability(&mut self) {
        self.decidability.clear();
        self.bump();
    }

    pub fn clear_brands(&mut self) {
        self.brands.clear();
        self.bump();
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    pub fn subtyping(&self) -> &SubtypingRegistry {
        &self.subtyping
    }

    pub fn decidability(&self) -> &DecidabilityRegistry {
        &self.decidability
    }

    pub fn brands(&self) -> &BrandCatalog {
        &self.brands
    }

    /// The direct edge, regardless of whether its brands are registered.
    pub fn get_subtyping_rule(&self, from: &str, to: &str) -> Option<&SubtypingEdge> {
        self.subtyping.get(from, to)
    }

    /// Reflexive, transitive widening over live edges only.
    pub fn can_widen(&self, from: &str, to: &str) -> bool {
        self.widening_path(from, to).is_some()
    }

    pub fn widening_path(&self, from: &str, to: &str) -> Option<Vec<SubtypingEdge>> {
        if from == to {
            return Some(Vec::new());
        }
        self.subtyping.path(from, to, |b| self.brands.contains(b))
    }

    /// Brands `from` widens to through live edges, with their paths.
    pub fn widenings_of(&self, from: &str) -> Vec<(String, Vec<SubtypingEdge>)> {
        self.subtyping.reachable(from, |b| self.brands.contains(b))
    }

    /// Classification for a brand, falling back to its parameterized family.
    pub fn get_decidability(&self, brand: &str) -> Option<DecidabilityInfo> {
        if let Some(info) = self.decidability.get(brand) {
            return Some(info.clone());
        }
        let family = self.brands.family_of(brand)?;
        let predicate = family.predicate_for(brand)?;
        let strategy = match family.decidability {
            Decidability::Runtime => PreferredStrategy::RuntimeCheck,
            _ => PreferredStrategy::Linear,
        };
        Some(DecidabilityInfo::new(
            brand,
            predicate,
            family.decidability,
            strategy,
        ))
    }
}

/// A registry shared between threads and mutated between proofs.
pub type SharedRegistry = Arc<RwLock<RegistryContext>>;

/// Wrap a context for sharing.
pub fn share(ctx: RegistryContext) -> SharedRegistry {
    Arc::new(RwLock::new(ctx))
}

/// Process-wide default registry, created with the built-ins on first use.
pub fn shared_registry() -> SharedRegistry {
    static DEFAULT: OnceLock<SharedRegistry> = OnceLock::new();
    DEFAULT
        .get_or_init(|| share(RegistryContext::new()))
        .clone()
}
