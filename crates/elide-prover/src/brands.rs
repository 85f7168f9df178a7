//! Refinement brands and their predicates.
//!
//! The refinement-type library owns the meaning of a brand (`Positive` means
//! `$ > 0`); the prover only needs to look predicates up by name, and to go
//! the other way (which brand, if any, does this goal restate?) when deciding
//! whether a proof miss deserves a warning.
//!
//! Parameterized brands (`Vec<3>`) are resolved through pattern families:
//! a regex over the brand name plus a predicate template whose `{1}`, `{2}`…
//! placeholders take the captured groups.

use crate::decidability::Decidability;
use ahash::AHashMap;
use elide_expr::{parse_expr, Expr, ExprParseError};
use regex::Regex;

/// Built-in brand → predicate table shipped by the refinement-type library.
pub const BUILTIN_BRANDS: &[(&str, &str)] = &[
    ("Positive", "$ > 0"),
    ("NonNegative", "$ >= 0"),
    ("Byte", "$ >= 0 && $ <= 255"),
    ("Port", "$ >= 1 && $ <= 65535"),
    ("Percentage", "$ >= 0 && $ <= 100"),
    ("NonZero", "$ != 0"),
    ("Finite", "Number.isFinite($)"),
    ("NonEmpty", "$.length > 0"),
    ("Trimmed", "$ === $.trim()"),
];

/// A family of parameterized brands such as `Vec<N>`.
#[derive(Debug, Clone)]
pub struct BrandFamily {
    pub name: String,
    pattern: Regex,
    template: String,
    pub decidability: Decidability,
}

impl BrandFamily {
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        template: impl Into<String>,
        decidability: Decidability,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            template: template.into(),
            decidability,
        })
    }

    /// `Vec<N>` → `$.length == N`.
    pub fn fixed_length_vector() -> Self {
        Self::new(
            "Vec<N>",
            r"^Vec<(\d+)>$",
            "$.length == {1}",
            Decidability::Decidable,
        )
        .expect("fixed-length vector pattern is a valid regex")
    }

    pub fn matches(&self, brand: &str) -> bool {
        self.pattern.is_match(brand)
    }

    /// Instantiate the predicate template for a concrete brand name.
    pub fn predicate_for(&self, brand: &str) -> Option<Expr> {
        let caps = self.pattern.captures(brand)?;
        let mut text = self.template.clone();
        for i in 1..caps.len() {
            let group = caps.get(i).map_or("", |m| m.as_str());
            text = text.replace(&format!("{{{i}}}"), group);
        }
        match parse_expr(&text) {
            Ok(expr) => Some(expr),
            Err(err) => {
                tracing::warn!(
                    family = %self.name,
                    brand,
                    error = %err,
                    "brand family template produced an unparsable predicate"
                );
                None
            }
        }
    }
}

/// Brand name → predicate (over `$`).
#[derive(Debug, Clone, Default)]
pub struct BrandCatalog {
    brands: AHashMap<String, Expr>,
    families: Vec<BrandFamily>,
}

impl BrandCatalog {
    /// Catalog with the built-in brands and the `Vec<N>` family.
    pub fn new() -> Self {
        let mut catalog = Self::empty();
        for (name, text) in BUILTIN_BRANDS {
            // Built-in predicates are fixed strings covered by tests.
            if let Ok(pred) = parse_expr(text) {
                catalog.register(*name, pred);
            }
        }
        catalog.register_family(BrandFamily::fixed_length_vector());
        catalog
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Insert or replace a brand.
    pub fn register(&mut self, name: impl Into<String>, predicate: Expr) {
        self.brands.insert(name.into(), predicate);
    }

    pub fn register_text(
        &mut self,
        name: impl Into<String>,
        predicate: &str,
    ) -> Result<(), ExprParseError> {
        let pred = parse_expr(predicate)?;
        self.register(name, pred);
        Ok(())
    }

    /// Insert or replace a family (keyed by family name).
    pub fn register_family(&mut self, family: BrandFamily) {
        self.families.retain(|f| f.name != family.name);
        self.families.push(family);
    }

    pub fn family_of(&self, brand: &str) -> Option<&BrandFamily> {
        self.families.iter().find(|f| f.matches(brand))
    }

    pub fn contains(&self, brand: &str) -> bool {
        self.brands.contains_key(brand) || self.family_of(brand).is_some()
    }

    /// Predicate over `$` for a brand, resolving parameterized families.
    pub fn predicate(&self, brand: &str) -> Option<Expr> {
        if let Some(pred) = self.brands.get(brand) {
            return Some(pred.clone());
        }
        self.family_of(brand)?.predicate_for(brand)
    }

    /// Predicate instantiated for `var`.
    pub fn predicate_for_var(&self, brand: &str, var: &str) -> Option<Expr> {
        Some(self.predicate(brand)?.instantiate(var))
    }

    /// Find the registered brand whose predicate, instantiated for one of the
    /// expression's variables, is the same condition as `expr`.
    ///
    /// Returns `(brand, variable)`. Ties are broken by brand name.
    pub fn brand_of_predicate(&self, expr: &Expr) -> Option<(String, String)> {
        if let Expr::Branded { var, brand } = expr {
            return Some((brand.clone(), var.clone()));
        }
        let target = expr.canonical();
        let vars = expr.free_vars();
        let mut names: Vec<&String> = self.brands.keys().collect();
        names.sort();
        for name in names {
            let pred = &self.brands[name];
            for var in &vars {
                if pred.instantiate(var).canonical() == target {
                    return Some((name.clone(), var.clone()));
                }
            }
        }
        None
    }

    /// Registered (non-family) brand names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.brands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn families(&self) -> &[BrandFamily] {
        &self.families
    }

    pub fn len(&self) -> usize {
        self.brands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty() && self.families.is_empty()
    }

    pub fn clear(&mut self) {
        self.brands.clear();
        self.families.clear();
    }
}
