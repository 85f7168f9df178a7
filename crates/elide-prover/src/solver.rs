//! External solver plugin and its readiness state machine.
//!
//! A solver backend is started asynchronously (probing a binary, loading a
//! library) while proofs keep running. Until it reports ready, the engine
//! treats the SMT step as inconclusive and moves on; it never waits.
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initializing ──ok──▶ Ready
//!                                       │
//!                                       └──err──▶ Failed ──initialize()──▶ Initializing …
//! ```

use elide_expr::Expr;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Answer of a solver for "do the assumptions entail the goal?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverVerdict {
    /// The negated goal is unsatisfiable under the assumptions.
    Proven,
    /// A model of the assumptions violates the goal.
    Refuted,
    Unknown(String),
}

#[async_trait::async_trait]
pub trait ExternalSolver: Send + Sync {
    fn name(&self) -> &str;

    /// Bring the backend up; called once per readiness cycle.
    async fn initialize(&self) -> anyhow::Result<()>;

    /// `assumptions` are brand-expanded fact atoms.
    fn check(&self, goal: &Expr, assumptions: &[Expr]) -> SolverVerdict;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

impl fmt::Display for SolverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverState::Uninitialized => f.write_str("uninitialized"),
            SolverState::Initializing => f.write_str("initializing"),
            SolverState::Ready => f.write_str("ready"),
            SolverState::Failed(why) => write!(f, "failed: {why}"),
        }
    }
}

/// Shared handle owning a solver and its state.
#[derive(Clone)]
pub struct SolverHandle {
    solver: Arc<dyn ExternalSolver>,
    state: Arc<RwLock<SolverState>>,
}

impl fmt::Debug for SolverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolverHandle")
            .field("solver", &self.solver.name())
            .field("state", &*self.state.read())
            .finish()
    }
}

impl SolverHandle {
    pub fn new(solver: impl ExternalSolver + 'static) -> Self {
        Self::from_arc(Arc::new(solver))
    }

    pub fn from_arc(solver: Arc<dyn ExternalSolver>) -> Self {
        Self {
            solver,
            state: Arc::new(RwLock::new(SolverState::Uninitialized)),
        }
    }

    pub fn name(&self) -> &str {
        self.solver.name()
    }

    pub fn state(&self) -> SolverState {
        self.state.read().clone()
    }

    pub fn is_solver_ready(&self) -> bool {
        *self.state.read() == SolverState::Ready
    }

    /// Run the backend's initialization.
    ///
    /// Concurrent or repeated calls while initializing or ready return the
    /// current state without starting a second initialization; a failed
    /// solver may be retried.
    pub async fn initialize(&self) -> SolverState {
        {
            let mut state = self.state.write();
            match &*state {
                SolverState::Initializing | SolverState::Ready => return state.clone(),
                SolverState::Uninitialized | SolverState::Failed(_) => {
                    *state = SolverState::Initializing;
                }
            }
        }
        tracing::debug!(solver = self.solver.name(), "initializing external solver");
        let next = match self.solver.initialize().await {
            Ok(()) => {
                tracing::info!(solver = self.solver.name(), "external solver ready");
                SolverState::Ready
            }
            Err(err) => {
                tracing::warn!(
                    solver = self.solver.name(),
                    error = %format!("{err:#}"),
                    "external solver failed to initialize"
                );
                SolverState::Failed(format!("{err:#}"))
            }
        };
        *self.state.write() = next.clone();
        next
    }

    /// Ask the solver, or report `Unknown` when it is not ready.
    pub fn check(&self, goal: &Expr, assumptions: &[Expr]) -> SolverVerdict {
        let state = self.state();
        if state != SolverState::Ready {
            return SolverVerdict::Unknown(format!("solver {} is {state}", self.solver.name()));
        }
        self.solver.check(goal, assumptions)
    }
}
