//! Turning call-site arguments into facts.
//!
//! The front-end knows each argument's static type; the extractor turns the
//! refinement part of that type into `TypeFact`s the engine can use.

use crate::brands::BrandCatalog;
use crate::fact::TypeFact;
use elide_expr::{parse_expr, Expr};
use serde::{Deserialize, Serialize};

/// An argument as the front-end sees it at a call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteArgument {
    pub name: String,
    /// Refinement brand of the argument's type (`Positive`, `Vec<3>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Inline refinement predicate over `$` or the argument name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<String>,
}

impl CallSiteArgument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            brand: None,
            refinement: None,
        }
    }

    pub fn branded(name: impl Into<String>, brand: impl Into<String>) -> Self {
        Self {
            brand: Some(brand.into()),
            ..Self::new(name)
        }
    }

    pub fn refined(name: impl Into<String>, refinement: impl Into<String>) -> Self {
        Self {
            refinement: Some(refinement.into()),
            ..Self::new(name)
        }
    }
}

pub trait FactExtractor: Send + Sync {
    fn extract_facts(&self, args: &[CallSiteArgument]) -> Vec<TypeFact>;
}

/// Facts from brands and inline refinements.
///
/// Brands the catalog knows become annotated facts (`x: Positive`), which
/// the engine expands; unknown brands are kept as annotations as well so an
/// identically annotated goal still matches. Unparsable refinements are
/// skipped.
#[derive(Debug, Clone, Copy)]
pub struct BrandFactExtractor<'a> {
    catalog: &'a BrandCatalog,
}

impl<'a> BrandFactExtractor<'a> {
    pub fn new(catalog: &'a BrandCatalog) -> Self {
        Self { catalog }
    }
}

impl FactExtractor for BrandFactExtractor<'_> {
    fn extract_facts(&self, args: &[CallSiteArgument]) -> Vec<TypeFact> {
        let mut out = Vec::new();
        for arg in args {
            if let Some(brand) = &arg.brand {
                if !self.catalog.contains(brand) {
                    tracing::debug!(argument = %arg.name, brand = %brand, "unknown brand kept as annotation");
                }
                out.push(TypeFact::new(arg.name.clone(), Expr::branded(&arg.name, brand)));
            }
            if let Some(text) = &arg.refinement {
                match parse_expr(text) {
                    Ok(pred) => out.push(TypeFact::new(arg.name.clone(), pred)),
                    Err(err) => tracing::warn!(
                        argument = %arg.name,
                        refinement = %text,
                        error = %err,
                        "skipping unparsable refinement"
                    ),
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_brands_and_refinements() {
        let catalog = BrandCatalog::new();
        let extractor = BrandFactExtractor::new(&catalog);
        let facts = extractor.extract_facts(&[
            CallSiteArgument::branded("n", "Positive"),
            CallSiteArgument::refined("m", "$ < 10"),
            CallSiteArgument::refined("bad", "$ <"),
            CallSiteArgument::new("plain"),
        ]);
        assert_eq!(facts.len(), 2);
        assert_eq!(facts[0].brand(), Some("Positive"));
        assert_eq!(facts[1].resolved_predicate().to_string(), "m < 10");
    }
}
