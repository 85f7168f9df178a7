//! The proof engine: a fixed pipeline of strategies, cheapest first.
//!
//! ```text
//! 1. constant evaluation      (no free variables)
//! 2. type identity            (goal is one of the fact atoms)
//! 3. subtyping identity       (a fact's brand widens to one that states the goal)
//! 4. algebraic rules          (registry order)
//! 5. linear arithmetic        (fast path, then Fourier–Motzkin)
//! 6. external solver          (only when ready; never waits)
//! 7. give up                  (classify, warn for compile-time brands)
//! ```
//!
//! A conjunctive goal that no strategy proves whole is split and each
//! conjunct runs the pipeline on its own.
//!
//! Only a strategy that established the goal yields "proven"; limits,
//! faults and an unavailable solver all leave the goal unproven, and an
//! unproven goal keeps its runtime check.

use crate::certificate::{
    format_certificate, CertificateBuilder, ProofCertificate, ProofMethod, ProofStep, StepStatus,
};
use crate::decidability::{can_prove_at_compile_time, must_check_at_runtime, DecidabilityInfo};
use crate::fact::{expand_brands, FactSet, ProofGoal, TypeFact};
use crate::linear::{prove_by_refutation, try_simple_linear_proof, LinearProof};
use crate::registry::RegistryContext;
use crate::rules::{evaluate_rule, RuleEvaluation};
use crate::solver::{SolverHandle, SolverVerdict};
use crate::subtyping::SubtypingEdge;
use anyhow::Context;
use elide_expr::{eval_constant, is_identifier, Expr, Value, PLACEHOLDER};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ============================================================================
// Configuration
// ============================================================================

/// Engine knobs, loadable from JSON (`--config`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Try the pattern-based linear proofs before Fourier–Motzkin
    pub enable_fast_path: bool,
    /// Run Fourier–Motzkin refutation
    pub enable_fourier_motzkin: bool,
    /// Row limit per elimination; exceeding it is inconclusive
    pub max_fm_constraints: usize,
    /// Warn when a compile-time brand needs a runtime check
    pub warn_on_compile_time_fallback: bool,
    /// Consult the external solver when one is attached and ready
    pub use_external_solver: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_fast_path: true,
            enable_fourier_motzkin: true,
            max_fm_constraints: 512,
            warn_on_compile_time_fallback: true,
            use_external_solver: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        serde_json::from_str(text).context("invalid engine configuration")
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }
}

// ============================================================================
// Results
// ============================================================================

/// The only errors `prove` returns; everything else is a failed certificate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("malformed goal `{goal}`: {reason}")]
    MalformedGoal { goal: String, reason: String },
    #[error("malformed fact for `{variable}`: {reason}")]
    MalformedFact { variable: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A compile-time brand could not be proven and keeps its runtime check.
    CompileTimeFallback,
    /// An algebraic rule errored or panicked and was skipped.
    RuleFault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildWarning {
    pub kind: WarningKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub message: String,
    /// Rendered certificate of the failed proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning: {}", self.message)
    }
}

#[derive(Debug, Clone)]
pub struct ProofOutcome {
    pub certificate: ProofCertificate,
    pub warnings: Vec<BuildWarning>,
    /// Classification of the goal's brand, when it has one.
    pub decidability: Option<DecidabilityInfo>,
}

impl ProofOutcome {
    pub fn is_proven(&self) -> bool {
        self.certificate.is_success()
    }

    pub fn method(&self) -> Option<ProofMethod> {
        self.certificate.method
    }
}

enum Search {
    Proven(ProofMethod),
    Refuted(String),
    Unproven(String),
}

// ============================================================================
// Engine
// ============================================================================

pub struct ProofEngine<'r> {
    registry: &'r RegistryContext,
    solver: Option<SolverHandle>,
    config: EngineConfig,
}

impl<'r> ProofEngine<'r> {
    pub fn new(registry: &'r RegistryContext) -> Self {
        Self {
            registry,
            solver: None,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_solver(mut self, solver: SolverHandle) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &'r RegistryContext {
        self.registry
    }

    pub fn is_solver_ready(&self) -> bool {
        self.solver.as_ref().is_some_and(SolverHandle::is_solver_ready)
    }

    /// Parse and prove a goal given as text.
    pub fn prove_text(&self, goal: &str, facts: &[TypeFact]) -> Result<ProofOutcome, EngineError> {
        let goal = ProofGoal::parse(goal).map_err(|err| EngineError::MalformedGoal {
            goal: goal.to_string(),
            reason: err.to_string(),
        })?;
        self.prove(&goal, facts)
    }

    pub fn prove(&self, goal: &ProofGoal, facts: &[TypeFact]) -> Result<ProofOutcome, EngineError> {
        validate_goal(&goal.expr)?;
        for fact in facts {
            validate_fact(fact)?;
        }

        let span = tracing::debug_span!("prove", goal = %goal.expr, facts = facts.len());
        let _enter = span.enter();

        let brands = self.registry.brands();
        let fact_set = FactSet::new(facts, brands);
        let target = expand_brands(&goal.expr, brands).canonical();
        let mut builder = CertificateBuilder::new(goal.expr.clone(), facts.to_vec())
            .with_stamp(self.registry.stamp());
        let mut warnings = Vec::new();

        match self.search(&target, &fact_set, &mut builder, &mut warnings, true) {
            Search::Proven(method) => {
                tracing::debug!(method = %method, "goal proven");
                Ok(ProofOutcome {
                    certificate: builder.succeed(method),
                    warnings,
                    decidability: self.classify(goal),
                })
            }
            Search::Refuted(reason) | Search::Unproven(reason) => {
                Ok(self.give_up(goal, builder, reason, warnings))
            }
        }
    }

    fn search(
        &self,
        goal: &Expr,
        facts: &FactSet<'_>,
        builder: &mut CertificateBuilder,
        warnings: &mut Vec<BuildWarning>,
        split: bool,
    ) -> Search {
        // 1. constants
        if !goal.has_free_vars() {
            match eval_constant(goal) {
                Some(Value::Bool(true)) => {
                    builder.add_step(ProofStep::proved(
                        "constant_evaluation",
                        format!("`{goal}` has no free variables"),
                        "evaluates to true",
                    ));
                    return Search::Proven(ProofMethod::Constant);
                }
                Some(Value::Bool(false)) => {
                    builder.add_step(ProofStep::failed(
                        "constant_evaluation",
                        format!("`{goal}` has no free variables"),
                        "evaluates to false",
                    ));
                    return Search::Refuted(format!("`{goal}` is always false"));
                }
                _ => {}
            }
        }

        // 2. type identity
        if let Some(used) = identical_facts(goal, facts) {
            builder.add_step(
                ProofStep::proved(
                    "type_identity",
                    format!("`{goal}` is already known"),
                    "goal matches the facts syntactically",
                )
                .with_facts(used),
            );
            return Search::Proven(ProofMethod::TypeIdentity);
        }

        // 3. subtyping-assisted identity
        if let Some((used, edges)) = self.widened_facts(goal, facts) {
            let path: Vec<String> = edges
                .iter()
                .map(|e| format!("{} → {} ({})", e.from, e.to, e.proof))
                .collect();
            builder.add_step(
                ProofStep::proved(
                    "type_identity",
                    format!("`{goal}` follows by brand widening"),
                    format!("widened via {}", path.join(", ")),
                )
                .with_facts(used),
            );
            return Search::Proven(ProofMethod::TypeIdentity);
        }

        // 4. algebraic rules
        if self.algebraic(goal, facts, builder, warnings) {
            return Search::Proven(ProofMethod::Algebraic);
        }

        // 5. linear arithmetic
        if self.linear(goal, facts, builder) {
            return Search::Proven(ProofMethod::Linear);
        }

        // 6. external solver
        if self.external(goal, facts, builder) {
            return Search::Proven(ProofMethod::Smt);
        }

        if split && goal.is_conjunction() {
            return self.split_conjunction(goal, facts, builder, warnings);
        }

        Search::Unproven(format!("no strategy proved `{goal}`"))
    }

    fn widened_facts(
        &self,
        goal: &Expr,
        facts: &FactSet<'_>,
    ) -> Option<(Vec<TypeFact>, Vec<SubtypingEdge>)> {
        let brands = self.registry.brands();
        let mut used: Vec<TypeFact> = Vec::new();
        let mut edges: Vec<SubtypingEdge> = Vec::new();
        let mut widened_any = false;

        for conjunct in goal.conjuncts() {
            if let Some(atom) = facts.find_identical(conjunct) {
                push_unique(&mut used, facts.fact(atom).clone());
                continue;
            }
            let (fact, path) = facts.facts().iter().find_map(|fact| {
                let (brand, var) = fact_brand(fact, self.registry)?;
                self.registry
                    .widenings_of(&brand)
                    .into_iter()
                    .find(|(wider, _)| {
                        brands.predicate_for_var(wider, &var).is_some_and(|pred| {
                            pred.conjuncts().into_iter().any(|c| &c.canonical() == conjunct)
                        })
                    })
                    .map(|(_, path)| (fact, path))
            })?;
            widened_any = true;
            push_unique(&mut used, fact.clone());
            for edge in path {
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
        widened_any.then_some((used, edges))
    }

    fn algebraic(
        &self,
        goal: &Expr,
        facts: &FactSet<'_>,
        builder: &mut CertificateBuilder,
        warnings: &mut Vec<BuildWarning>,
    ) -> bool {
        let mut proved = false;
        for rule in self.registry.rules().iter() {
            match evaluate_rule(rule.as_ref(), goal, facts) {
                RuleEvaluation::Matched(m) => {
                    builder.add_step(
                        ProofStep::proved(rule.name(), rule.description(), m.justification)
                            .with_facts(m.used_facts)
                            .with_subgoals(m.subgoals),
                    );
                    proved = true;
                }
                RuleEvaluation::NoMatch => builder.add_step(ProofStep::failed(
                    rule.name(),
                    rule.description(),
                    "pattern did not match",
                )),
                RuleEvaluation::Faulted(msg) => {
                    tracing::warn!(
                        rule = rule.name(),
                        goal = %goal,
                        error = %msg,
                        "algebraic rule faulted; treating as no match"
                    );
                    builder.add_step(ProofStep::inconclusive(
                        rule.name(),
                        rule.description(),
                        format!("rule faulted: {msg}"),
                    ));
                    warnings.push(BuildWarning {
                        kind: WarningKind::RuleFault,
                        brand: None,
                        message: format!("rule `{}` faulted on `{goal}`: {msg}", rule.name()),
                        certificate: None,
                    });
                }
            }
        }
        proved
    }

    fn linear(&self, goal: &Expr, facts: &FactSet<'_>, builder: &mut CertificateBuilder) -> bool {
        if self.config.enable_fast_path {
            let p = try_simple_linear_proof(goal, facts);
            let proven = p.proven;
            builder.add_step(linear_step(p, "linear arithmetic fast path"));
            if proven {
                return true;
            }
        }
        if self.config.enable_fourier_motzkin {
            let p = prove_by_refutation(goal, facts, self.config.max_fm_constraints);
            let proven = p.proven;
            builder.add_step(linear_step(p, "Fourier–Motzkin refutation"));
            if proven {
                return true;
            }
        }
        false
    }

    fn external(&self, goal: &Expr, facts: &FactSet<'_>, builder: &mut CertificateBuilder) -> bool {
        if !self.config.use_external_solver {
            return false;
        }
        let Some(solver) = &self.solver else {
            return false;
        };
        let description = format!("external solver {}", solver.name());
        if !solver.is_solver_ready() {
            tracing::debug!(solver = solver.name(), state = %solver.state(), "solver not ready; skipping");
            builder.add_step(ProofStep::inconclusive(
                "smt",
                description,
                format!("solver is {}", solver.state()),
            ));
            return false;
        }
        let assumptions: Vec<Expr> = facts.atoms().iter().map(|a| a.expr.clone()).collect();
        match solver.check(goal, &assumptions) {
            SolverVerdict::Proven => {
                builder.add_step(
                    ProofStep::proved("smt", description, "negated goal is unsatisfiable")
                        .with_facts(facts.facts().iter().cloned()),
                );
                true
            }
            SolverVerdict::Refuted => {
                builder.add_step(ProofStep::failed(
                    "smt",
                    description,
                    "a model of the facts violates the goal",
                ));
                false
            }
            SolverVerdict::Unknown(why) => {
                builder.add_step(ProofStep::inconclusive("smt", description, why));
                false
            }
        }
    }

    fn split_conjunction(
        &self,
        goal: &Expr,
        facts: &FactSet<'_>,
        builder: &mut CertificateBuilder,
        warnings: &mut Vec<BuildWarning>,
    ) -> Search {
        let parts: Vec<Expr> = goal.conjuncts().into_iter().cloned().collect();
        let mut child_steps = Vec::new();
        let mut open = Vec::new();
        let mut refuted = None;

        for part in &parts {
            let mut child = CertificateBuilder::new(part.clone(), Vec::new());
            match self.search(part, facts, &mut child, warnings, false) {
                Search::Proven(_) => {}
                Search::Refuted(reason) => {
                    refuted.get_or_insert(reason);
                    open.push(part.to_string());
                }
                Search::Unproven(_) => open.push(part.to_string()),
            }
            for mut step in child.steps().iter().cloned() {
                step.description = format!("[{part}] {}", step.description);
                child_steps.push(step);
            }
        }

        let status = if open.is_empty() {
            StepStatus::Proved
        } else {
            StepStatus::Failed
        };
        let justification = if open.is_empty() {
            format!("all {} conjuncts proven", parts.len())
        } else {
            format!("unproven: {}", open.join(", "))
        };
        builder.add_step(
            ProofStep::new("conjunction", "split conjunctive goal", justification, status)
                .with_subgoals(parts.iter().cloned()),
        );
        for step in child_steps {
            builder.add_step(step);
        }

        match (open.is_empty(), refuted) {
            (true, _) => Search::Proven(ProofMethod::Conjunction),
            (false, Some(reason)) => Search::Refuted(reason),
            (false, None) => Search::Unproven(format!("no strategy proved {}", open.join(", "))),
        }
    }

    /// Brand classification of a goal: explicit tag first, then reverse lookup.
    fn classify(&self, goal: &ProofGoal) -> Option<DecidabilityInfo> {
        let brand = match &goal.brand {
            Some(b) => b.clone(),
            None => self.registry.brands().brand_of_predicate(&goal.expr)?.0,
        };
        self.registry.get_decidability(&brand)
    }

    fn give_up(
        &self,
        goal: &ProofGoal,
        builder: CertificateBuilder,
        reason: String,
        mut warnings: Vec<BuildWarning>,
    ) -> ProofOutcome {
        let decidability = self.classify(goal);
        let reason = match &decidability {
            Some(info) if must_check_at_runtime(info.decidability) => {
                format!("{reason}; brand `{}` is checked at runtime", info.brand)
            }
            _ => reason,
        };
        let certificate = builder.fail(reason);

        if let Some(info) = &decidability {
            if can_prove_at_compile_time(info.decidability)
                && self.config.warn_on_compile_time_fallback
            {
                tracing::warn!(
                    brand = %info.brand,
                    goal = %goal.expr,
                    "compile-time brand could not be proven; keeping runtime check"
                );
                warnings.push(BuildWarning {
                    kind: WarningKind::CompileTimeFallback,
                    brand: Some(info.brand.clone()),
                    message: format!(
                        "`{}` for compile-time brand `{}` could not be proven; a runtime check is emitted",
                        goal.expr, info.brand
                    ),
                    certificate: Some(format_certificate(&certificate)),
                });
            }
        }
        tracing::debug!(reason = certificate.failure_reason.as_deref().unwrap_or(""), "goal unproven");

        ProofOutcome {
            certificate,
            warnings,
            decidability,
        }
    }
}

fn linear_step(p: LinearProof, description: &str) -> ProofStep {
    let status = if p.proven {
        StepStatus::Proved
    } else if p.inconclusive {
        StepStatus::Inconclusive
    } else {
        StepStatus::Failed
    };
    ProofStep::new(p.rule, description, p.reason, status).with_facts(p.used_facts)
}

/// Every conjunct of `goal` is a fact atom.
fn identical_facts(goal: &Expr, facts: &FactSet<'_>) -> Option<Vec<TypeFact>> {
    let mut used = Vec::new();
    for conjunct in goal.conjuncts() {
        let atom = facts.find_identical(conjunct)?;
        push_unique(&mut used, facts.fact(atom).clone());
    }
    Some(used)
}

/// Brand a fact carries, explicitly or by restating a brand predicate.
fn fact_brand(fact: &TypeFact, registry: &RegistryContext) -> Option<(String, String)> {
    match &fact.predicate {
        Expr::Branded { var, brand } => {
            let var = if var == PLACEHOLDER { &fact.variable } else { var };
            Some((brand.clone(), var.clone()))
        }
        _ => registry
            .brands()
            .brand_of_predicate(&fact.resolved_predicate()),
    }
}

fn push_unique(out: &mut Vec<TypeFact>, fact: TypeFact) {
    if !out.contains(&fact) {
        out.push(fact);
    }
}

fn validate_goal(goal: &Expr) -> Result<(), EngineError> {
    if !goal.is_boolean() {
        return Err(EngineError::MalformedGoal {
            goal: goal.to_string(),
            reason: "not a boolean condition".into(),
        });
    }
    Ok(())
}

fn validate_fact(fact: &TypeFact) -> Result<(), EngineError> {
    if !is_identifier(&fact.variable) || fact.variable == PLACEHOLDER {
        return Err(EngineError::MalformedFact {
            variable: fact.variable.clone(),
            reason: "not a variable name".into(),
        });
    }
    if !fact.predicate.is_boolean() {
        return Err(EngineError::MalformedFact {
            variable: fact.variable.clone(),
            reason: format!("`{}` is not a boolean condition", fact.predicate),
        });
    }
    Ok(())
}
