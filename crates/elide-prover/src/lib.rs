//! Elide: contract verification and proof elision
//!
//! Decides, for each contract condition, whether it can be proven from the
//! refinement facts known at that program point. Proven conditions lose
//! their runtime check; everything else keeps it.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                        PROOF ELISION PIPELINE                      │
//! ├────────────────────────────────────────────────────────────────────┤
//! │                                                                    │
//! │  call-site args ──► FactExtractor ──► TypeFact[] ─┐                │
//! │                                                   ▼                │
//! │  contract cond ──► ProofGoal ──────────────► ProofEngine           │
//! │                                                   │                │
//! │        RegistryContext ───────────────────────────┤                │
//! │        (rules, widening edges,                    │                │
//! │         decidability, brands)                     │                │
//! │                                                   ▼                │
//! │   constant → identity → widening → rules → linear → solver         │
//! │                                                   │                │
//! │                                                   ▼                │
//! │                          ProofCertificate + BuildWarning[]         │
//! │                                                                    │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The registry is an explicit value. Most callers build one
//! `RegistryContext::new()` and lend it to every engine; code that needs a
//! process-wide default uses `shared_registry()`.

pub mod brands;
pub mod certificate;
pub mod contracts;
pub mod decidability;
pub mod engine;
pub mod extract;
pub mod fact;
pub mod linear;
pub mod registry;
pub mod rules;
pub mod smtlib;
pub mod solver;
pub mod stamp;
pub mod subtyping;

pub use brands::{BrandCatalog, BrandFamily, BUILTIN_BRANDS};
pub use certificate::{
    format_certificate, CertificateBuilder, Outcome, ProofCertificate, ProofMethod, ProofStep,
    StepStatus, CERTIFICATE_VERSION,
};
pub use contracts::{
    decide_function, ContractCondition, ContractFile, ContractKind, Decision, DecisionRecord,
    DecisionSummary, FunctionContracts,
};
pub use decidability::{
    can_prove_at_compile_time, must_check_at_runtime, Decidability, DecidabilityInfo,
    DecidabilityRegistry, PreferredStrategy,
};
pub use engine::{
    BuildWarning, EngineConfig, EngineError, ProofEngine, ProofOutcome, WarningKind,
};
pub use extract::{BrandFactExtractor, CallSiteArgument, FactExtractor};
pub use fact::{FactSet, ProofGoal, TypeFact};
pub use linear::{prove_by_refutation, try_simple_linear_proof, LinearProof};
pub use registry::{share, shared_registry, RegistryContext, SharedRegistry};
pub use rules::{AlgebraicRule, FnRule, RuleEvaluation, RuleMatch, RuleRegistry};
pub use smtlib::{render_refutation_query, Z3ProcessSolver};
pub use solver::{ExternalSolver, SolverHandle, SolverState, SolverVerdict};
pub use stamp::{RegistryStamp, RegistryStampMismatch, RegistryToken};
pub use subtyping::{SubtypingEdge, SubtypingRegistry};
