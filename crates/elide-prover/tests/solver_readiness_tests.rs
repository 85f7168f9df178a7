use elide_expr::Expr;
use elide_prover::{
    EngineConfig, ExternalSolver, ProofEngine, ProofMethod, RegistryContext, SolverHandle,
    SolverState, SolverVerdict, StepStatus, TypeFact,
};
use std::sync::Arc;
use tokio::sync::Notify;

/// Solver whose startup waits until the test releases it.
struct Gated {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait::async_trait]
impl ExternalSolver for Gated {
    fn name(&self) -> &str {
        "gated"
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(())
    }

    fn check(&self, _goal: &Expr, _assumptions: &[Expr]) -> SolverVerdict {
        SolverVerdict::Proven
    }
}

fn facts() -> Vec<TypeFact> {
    vec![TypeFact::parse("x", "x > 1").expect("fact")]
}

fn smt_status(outcome: &elide_prover::ProofOutcome) -> Option<(StepStatus, String)> {
    outcome
        .certificate
        .steps
        .iter()
        .find(|s| s.rule == "smt")
        .map(|s| (s.status, s.justification.clone()))
}

#[tokio::test]
async fn engine_never_waits_for_solver_startup() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let handle = SolverHandle::new(Gated {
        started: started.clone(),
        release: release.clone(),
    });
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg).with_solver(handle.clone());

    let goal = "x * x > x";
    let out = engine.prove_text(goal, &facts()).expect("prove");
    assert!(!out.is_proven());
    let (status, why) = smt_status(&out).expect("smt step");
    assert_eq!(status, StepStatus::Inconclusive);
    assert!(why.contains("uninitialized"));

    let init = tokio::spawn({
        let handle = handle.clone();
        async move { handle.initialize().await }
    });
    started.notified().await;
    assert_eq!(handle.state(), SolverState::Initializing);

    let out = engine.prove_text(goal, &facts()).expect("prove");
    assert!(!out.is_proven());
    let (_, why) = smt_status(&out).expect("smt step");
    assert!(why.contains("initializing"));

    release.notify_one();
    assert_eq!(init.await.expect("join"), SolverState::Ready);
    assert!(engine.is_solver_ready());

    let out = engine.prove_text(goal, &facts()).expect("prove");
    assert!(out.is_proven());
    assert_eq!(out.method(), Some(ProofMethod::Smt));
}

#[tokio::test]
async fn solver_can_be_switched_off() {
    let handle = SolverHandle::new(Gated {
        started: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
    });
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg)
        .with_solver(handle)
        .with_config(EngineConfig {
            use_external_solver: false,
            ..EngineConfig::default()
        });
    let out = engine.prove_text("x * x > x", &facts()).expect("prove");
    assert!(smt_status(&out).is_none());
}
