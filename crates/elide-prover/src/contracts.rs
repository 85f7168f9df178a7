//! Per-function contract decisions.
//!
//! Code generation asks one question per contract condition: emit a runtime
//! check or not? `decide_function` runs every condition of a function
//! through the engine with the facts extracted from its parameters and
//! records the answer, the certificate behind it, and a goal digest that
//! stays stable across compiler runs.

use crate::certificate::ProofCertificate;
use crate::engine::{BuildWarning, EngineError, ProofEngine};
use crate::extract::{CallSiteArgument, FactExtractor};
use crate::fact::ProofGoal;
use anyhow::Context;
use elide_expr::digest::goal_digest_v1;
use elide_expr::Expr;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    Precondition,
    Postcondition,
    Invariant,
}

impl ContractKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractKind::Precondition => "precondition",
            ContractKind::Postcondition => "postcondition",
            ContractKind::Invariant => "invariant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCondition {
    pub kind: ContractKind,
    pub expr: Expr,
    /// Brand the condition restates, when the front-end knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionContracts {
    pub function: String,
    #[serde(default)]
    pub params: Vec<CallSiteArgument>,
    pub conditions: Vec<ContractCondition>,
}

/// A JSON file of function contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractFile {
    pub functions: Vec<FunctionContracts>,
}

impl ContractFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read contracts {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("invalid contracts in {}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The check is elided.
    Proven,
    /// A runtime check is emitted.
    Runtime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub function: String,
    pub kind: ContractKind,
    pub goal: Expr,
    pub goal_digest: String,
    pub decision: Decision,
    pub certificate: ProofCertificate,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<BuildWarning>,
}

pub fn decide_function(
    engine: &ProofEngine<'_>,
    extractor: &dyn FactExtractor,
    contracts: &FunctionContracts,
) -> Result<Vec<DecisionRecord>, EngineError> {
    let facts = extractor.extract_facts(&contracts.params);
    let span = tracing::info_span!("decide", function = %contracts.function, facts = facts.len());
    let _enter = span.enter();

    let mut out = Vec::with_capacity(contracts.conditions.len());
    for cond in &contracts.conditions {
        let mut goal = ProofGoal::new(cond.expr.clone());
        goal.brand = cond.brand.clone();
        let outcome = engine.prove(&goal, &facts)?;
        let decision = if outcome.is_proven() {
            Decision::Proven
        } else {
            Decision::Runtime
        };
        tracing::debug!(goal = %cond.expr, decision = ?decision, "condition decided");
        out.push(DecisionRecord {
            function: contracts.function.clone(),
            kind: cond.kind,
            goal_digest: goal_digest_v1(&cond.expr),
            goal: cond.expr.clone(),
            decision,
            certificate: outcome.certificate,
            warnings: outcome.warnings,
        });
    }
    Ok(out)
}

/// Counts over a batch of decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub proven: usize,
    pub runtime: usize,
    pub warnings: usize,
}

impl DecisionSummary {
    pub fn of(records: &[DecisionRecord]) -> Self {
        records.iter().fold(Self::default(), |mut s, r| {
            match r.decision {
                Decision::Proven => s.proven += 1,
                Decision::Runtime => s.runtime += 1,
            }
            s.warnings += r.warnings.len();
            s
        })
    }
}
