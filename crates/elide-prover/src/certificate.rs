//! Proof certificates and the builder that records them.
//!
//! A certificate is the trace of one `prove` call: every strategy that ran,
//! what it concluded, which facts it used, and the final outcome. Traces are
//! append-only; finalizing the builder consumes it, so a finished
//! certificate cannot grow new steps.
//!
//! Serialized certificates are versioned JSON; the registry token they were
//! produced under is process-local and not serialized (only the generation).

use crate::fact::TypeFact;
use crate::stamp::{RegistryStamp, RegistryStampMismatch};
use elide_expr::digest::goal_digest_v1;
use elide_expr::Expr;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

pub const CERTIFICATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
    Pending,
}

/// The strategy that discharged a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofMethod {
    Constant,
    TypeIdentity,
    Algebraic,
    Linear,
    Smt,
    /// Every conjunct was discharged separately.
    Conjunction,
}

impl ProofMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ProofMethod::Constant => "constant",
            ProofMethod::TypeIdentity => "type_identity",
            ProofMethod::Algebraic => "algebraic",
            ProofMethod::Linear => "linear",
            ProofMethod::Smt => "smt",
            ProofMethod::Conjunction => "conjunction",
        }
    }
}

impl fmt::Display for ProofMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Proved,
    Failed,
    /// The strategy could not decide (limits, unavailable solver, faults).
    Inconclusive,
}

impl StepStatus {
    fn label(self) -> &'static str {
        match self {
            StepStatus::Proved => "proved",
            StepStatus::Failed => "failed",
            StepStatus::Inconclusive => "inconclusive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub rule: String,
    pub description: String,
    pub justification: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub used_facts: Vec<TypeFact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgoals: Vec<Expr>,
    pub status: StepStatus,
}

impl ProofStep {
    pub fn new(
        rule: impl Into<String>,
        description: impl Into<String>,
        justification: impl Into<String>,
        status: StepStatus,
    ) -> Self {
        Self {
            rule: rule.into(),
            description: description.into(),
            justification: justification.into(),
            used_facts: Vec::new(),
            subgoals: Vec::new(),
            status,
        }
    }

    pub fn proved(
        rule: impl Into<String>,
        description: impl Into<String>,
        justification: impl Into<String>,
    ) -> Self {
        Self::new(rule, description, justification, StepStatus::Proved)
    }

    pub fn failed(
        rule: impl Into<String>,
        description: impl Into<String>,
        justification: impl Into<String>,
    ) -> Self {
        Self::new(rule, description, justification, StepStatus::Failed)
    }

    pub fn inconclusive(
        rule: impl Into<String>,
        description: impl Into<String>,
        justification: impl Into<String>,
    ) -> Self {
        Self::new(rule, description, justification, StepStatus::Inconclusive)
    }

    pub fn with_facts(mut self, facts: impl IntoIterator<Item = TypeFact>) -> Self {
        self.used_facts.extend(facts);
        self
    }

    pub fn with_subgoals(mut self, subgoals: impl IntoIterator<Item = Expr>) -> Self {
        self.subgoals.extend(subgoals);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofCertificate {
    pub version: u32,
    pub goal: Expr,
    pub goal_digest: String,
    pub assumptions: Vec<TypeFact>,
    pub steps: Vec<ProofStep>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ProofMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub registry_generation: u64,
    #[serde(skip)]
    stamp: Option<RegistryStamp>,
}

impl ProofCertificate {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    pub fn stamp(&self) -> Option<RegistryStamp> {
        self.stamp
    }

    /// Check the certificate still describes the given registry state.
    ///
    /// Deserialized certificates carry no token and only compare generations.
    pub fn check_stamp(&self, current: RegistryStamp) -> Result<(), RegistryStampMismatch> {
        match self.stamp {
            Some(stamp) => stamp.check(current),
            None if self.registry_generation == current.generation => Ok(()),
            None => Err(RegistryStampMismatch {
                expected: RegistryStamp {
                    token: current.token,
                    generation: self.registry_generation,
                },
                actual: current,
            }),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Accumulates steps for one goal; consumed by `succeed`/`fail`.
#[derive(Debug, Clone)]
pub struct CertificateBuilder {
    goal: Expr,
    assumptions: Vec<TypeFact>,
    steps: Vec<ProofStep>,
    stamp: Option<RegistryStamp>,
}

impl CertificateBuilder {
    pub fn new(goal: Expr, assumptions: Vec<TypeFact>) -> Self {
        Self {
            goal,
            assumptions,
            steps: Vec::new(),
            stamp: None,
        }
    }

    pub fn with_stamp(mut self, stamp: RegistryStamp) -> Self {
        self.stamp = Some(stamp);
        self
    }

    pub fn add_step(&mut self, step: ProofStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    pub fn goal(&self) -> &Expr {
        &self.goal
    }

    /// Certificate-so-far with a `pending` outcome.
    pub fn snapshot(&self) -> ProofCertificate {
        self.clone().finish(Outcome::Pending, None, None)
    }

    pub fn succeed(self, method: ProofMethod) -> ProofCertificate {
        self.finish(Outcome::Success, Some(method), None)
    }

    pub fn fail(self, reason: impl Into<String>) -> ProofCertificate {
        self.finish(Outcome::Failure, None, Some(reason.into()))
    }

    fn finish(
        self,
        outcome: Outcome,
        method: Option<ProofMethod>,
        failure_reason: Option<String>,
    ) -> ProofCertificate {
        ProofCertificate {
            version: CERTIFICATE_VERSION,
            goal_digest: goal_digest_v1(&self.goal),
            goal: self.goal,
            assumptions: self.assumptions,
            steps: self.steps,
            outcome,
            method,
            failure_reason,
            registry_generation: self.stamp.map_or(0, |s| s.generation),
            stamp: self.stamp,
        }
    }
}

/// Human-readable rendering used in build warnings and the CLI.
pub fn format_certificate(cert: &ProofCertificate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "goal: {}", cert.goal);
    match (cert.outcome, cert.method) {
        (Outcome::Success, Some(method)) => {
            let _ = writeln!(out, "outcome: success ({method})");
        }
        (Outcome::Failure, _) => {
            let _ = writeln!(
                out,
                "outcome: failure ({})",
                cert.failure_reason.as_deref().unwrap_or("unproven")
            );
        }
        (Outcome::Pending, _) => {
            let _ = writeln!(out, "outcome: pending");
        }
        (Outcome::Success, None) => {
            let _ = writeln!(out, "outcome: success");
        }
    }
    if cert.assumptions.is_empty() {
        let _ = writeln!(out, "assumptions: none");
    } else {
        let _ = writeln!(out, "assumptions:");
        for fact in &cert.assumptions {
            let _ = writeln!(out, "  - {fact}");
        }
    }
    let _ = writeln!(out, "steps:");
    if cert.steps.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for (i, step) in cert.steps.iter().enumerate() {
        let _ = writeln!(
            out,
            "  {}. [{}] {}: {}",
            i + 1,
            step.status.label(),
            step.rule,
            step.description
        );
        if !step.justification.is_empty() {
            let _ = writeln!(out, "     because {}", step.justification);
        }
        if !step.used_facts.is_empty() {
            let used: Vec<String> = step.used_facts.iter().map(|f| f.to_string()).collect();
            let _ = writeln!(out, "     using {}", used.join(", "));
        }
        if !step.subgoals.is_empty() {
            let subs: Vec<String> = step.subgoals.iter().map(|g| g.to_string()).collect();
            let _ = writeln!(out, "     subgoals {}", subs.join(", "));
        }
    }
    out
}

impl fmt::Display for ProofCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_certificate(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stamp::RegistryToken;
    use elide_expr::parse_expr;

    fn builder() -> CertificateBuilder {
        let goal = parse_expr("x + y > 0").expect("parse");
        let facts = vec![
            TypeFact::parse("x", "x > 0").expect("fact"),
            TypeFact::parse("y", "y > 0").expect("fact"),
        ];
        CertificateBuilder::new(goal, facts)
    }

    #[test]
    fn success_carries_method_and_trace() {
        let mut b = builder();
        b.add_step(ProofStep::failed("identity", "no identical fact", ""));
        b.add_step(
            ProofStep::proved("sum_of_positives", "sum is positive", "x > 0, y > 0")
                .with_subgoals([parse_expr("x > 0").expect("parse")]),
        );
        assert_eq!(b.snapshot().outcome, Outcome::Pending);
        let cert = b.succeed(ProofMethod::Algebraic);
        assert!(cert.is_success());
        assert_eq!(cert.steps.len(), 2);
        let text = format_certificate(&cert);
        assert!(text.contains("outcome: success (algebraic)"));
        assert!(text.contains("2. [proved] sum_of_positives"));
        assert!(text.contains("y: {y > 0}"));
    }

    #[test]
    fn failure_records_reason() {
        let cert = builder().fail("no strategy applied");
        assert_eq!(cert.outcome, Outcome::Failure);
        assert!(format_certificate(&cert).contains("failure (no strategy applied)"));
    }

    #[test]
    fn json_omits_token_but_keeps_generation() {
        let stamp = RegistryStamp {
            token: RegistryToken::new(),
            generation: 7,
        };
        let cert = builder().with_stamp(stamp).succeed(ProofMethod::Linear);
        let json = cert.to_json_pretty().expect("json");
        assert!(json.contains("\"registry_generation\": 7"));
        assert!(json.contains("\"method\": \"linear\""));

        let back: ProofCertificate = serde_json::from_str(&json).expect("parse");
        assert_eq!(back.stamp(), None);
        assert_eq!(back.goal, cert.goal);
        assert!(back.check_stamp(stamp).is_ok());
        let newer = RegistryStamp {
            generation: 8,
            ..stamp
        };
        assert!(back.check_stamp(newer).is_err());
        assert!(cert.check_stamp(newer).is_err());
    }
}
