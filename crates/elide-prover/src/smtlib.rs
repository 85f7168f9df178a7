//! SMT-LIB2 rendering and a `z3` subprocess backend.
//!
//! Entailment is checked by refutation: assert the assumptions and the
//! negated goal over reals, then `unsat` means the goal follows. Assumptions
//! the renderer cannot express are dropped (fewer assumptions can only make
//! a proof harder); an unrenderable goal is an error.

use crate::solver::{ExternalSolver, SolverVerdict};
use anyhow::{bail, Context, Result};
use elide_expr::{BinaryOp, CompareOp, Expr, LogicOp, Rational, UnaryOp};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::io::Write;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot express `{0}` in SMT-LIB")]
pub struct SmtRenderError(pub String);

/// Render the refutation query for `assumptions ⊢ goal`.
pub fn render_refutation_query(goal: &Expr, assumptions: &[Expr]) -> Result<String, SmtRenderError> {
    let mut symbols = BTreeSet::new();
    let goal_term = render_bool(goal, &mut symbols)?;
    let mut asserted = Vec::new();
    for a in assumptions {
        let mut local = BTreeSet::new();
        match render_bool(a, &mut local) {
            Ok(term) => {
                symbols.extend(local);
                asserted.push(term);
            }
            Err(err) => tracing::debug!(assumption = %a, error = %err, "dropping assumption"),
        }
    }

    let mut out = String::new();
    for sym in &symbols {
        out.push_str(&format!("(declare-const {} Real)\n", sym.rendered));
        if sym.is_length {
            out.push_str(&format!("(assert (>= {} 0.0))\n", sym.rendered));
        }
    }
    for term in asserted {
        out.push_str(&format!("(assert {term})\n"));
    }
    out.push_str(&format!("(assert (not {goal_term}))\n(check-sat)\n"));
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Symbol {
    rendered: String,
    is_length: bool,
}

fn symbol(name: &str, is_length: bool) -> Symbol {
    let simple = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    let rendered = if simple {
        name.to_string()
    } else {
        format!("|{}|", name.replace('|', "_"))
    };
    Symbol { rendered, is_length }
}

fn render_bool(e: &Expr, syms: &mut BTreeSet<Symbol>) -> Result<String, SmtRenderError> {
    Ok(match e {
        Expr::Bool(b) => b.to_string(),
        Expr::Compare(op, l, r) => {
            let (a, b) = (render_num(l, syms)?, render_num(r, syms)?);
            match op {
                CompareOp::Lt => format!("(< {a} {b})"),
                CompareOp::Le => format!("(<= {a} {b})"),
                CompareOp::Gt => format!("(> {a} {b})"),
                CompareOp::Ge => format!("(>= {a} {b})"),
                CompareOp::Eq => format!("(= {a} {b})"),
                CompareOp::Ne => format!("(distinct {a} {b})"),
            }
        }
        Expr::Logic(op, l, r) => {
            let (a, b) = (render_bool(l, syms)?, render_bool(r, syms)?);
            match op {
                LogicOp::And => format!("(and {a} {b})"),
                LogicOp::Or => format!("(or {a} {b})"),
            }
        }
        Expr::Unary(UnaryOp::Not, inner) => format!("(not {})", render_bool(inner, syms)?),
        other => return Err(SmtRenderError(other.to_string())),
    })
}

fn render_num(e: &Expr, syms: &mut BTreeSet<Symbol>) -> Result<String, SmtRenderError> {
    Ok(match e {
        Expr::Num(n) => render_rational(*n),
        Expr::Var(name) => {
            let s = symbol(name, false);
            let out = s.rendered.clone();
            syms.insert(s);
            out
        }
        Expr::Member(base, field) if field == "length" && matches!(**base, Expr::Var(_)) => {
            let s = symbol(&e.to_string(), true);
            let out = s.rendered.clone();
            syms.insert(s);
            out
        }
        Expr::Unary(UnaryOp::Neg, inner) => format!("(- {})", render_num(inner, syms)?),
        Expr::Binary(op, l, r) => {
            let a = render_num(l, syms)?;
            match op {
                BinaryOp::Pow => {
                    let Some(k) = r.as_num().filter(|k| k.is_integer() && !k.is_negative()) else {
                        return Err(SmtRenderError(e.to_string()));
                    };
                    match k.numer() {
                        0 => "1.0".to_string(),
                        1 => a,
                        n if n <= 8 => format!("(* {})", vec![a; n as usize].join(" ")),
                        _ => return Err(SmtRenderError(e.to_string())),
                    }
                }
                BinaryOp::Rem => return Err(SmtRenderError(e.to_string())),
                _ => {
                    let b = render_num(r, syms)?;
                    let sym = match op {
                        BinaryOp::Add => "+",
                        BinaryOp::Sub => "-",
                        BinaryOp::Mul => "*",
                        _ => "/",
                    };
                    format!("({sym} {a} {b})")
                }
            }
        }
        other => return Err(SmtRenderError(other.to_string())),
    })
}

fn render_rational(n: Rational) -> String {
    let num = n.numer().unsigned_abs();
    let body = if n.is_integer() {
        format!("{num}.0")
    } else {
        format!("(/ {num}.0 {}.0)", n.denom())
    };
    if n.is_negative() {
        format!("(- {body})")
    } else {
        body
    }
}

/// Runs `z3 -in` per query.
#[derive(Debug)]
pub struct Z3ProcessSolver {
    binary: String,
    version: RwLock<Option<String>>,
}

impl Default for Z3ProcessSolver {
    fn default() -> Self {
        Self::new("z3")
    }
}

impl Z3ProcessSolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            version: RwLock::new(None),
        }
    }

    pub fn version(&self) -> Option<String> {
        self.version.read().clone()
    }

    fn run(&self, query: &str) -> Result<String> {
        let mut child = Command::new(&self.binary)
            .arg("-in")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.binary))?;
        child
            .stdin
            .take()
            .context("solver stdin unavailable")?
            .write_all(query.as_bytes())?;
        let output = child.wait_with_output()?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait::async_trait]
impl ExternalSolver for Z3ProcessSolver {
    fn name(&self) -> &str {
        "z3"
    }

    async fn initialize(&self) -> Result<()> {
        let output = tokio::process::Command::new(&self.binary)
            .arg("-version")
            .output()
            .await
            .with_context(|| format!("failed to run `{} -version`", self.binary))?;
        if !output.status.success() {
            bail!("`{} -version` exited with {}", self.binary, output.status);
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        tracing::debug!(binary = %self.binary, version = %version, "probed solver");
        *self.version.write() = Some(version);
        Ok(())
    }

    fn check(&self, goal: &Expr, assumptions: &[Expr]) -> SolverVerdict {
        let query = match render_refutation_query(goal, assumptions) {
            Ok(q) => q,
            Err(err) => return SolverVerdict::Unknown(err.to_string()),
        };
        match self.run(&query) {
            Ok(answer) => match answer.lines().next().unwrap_or("") {
                "unsat" => SolverVerdict::Proven,
                "sat" => SolverVerdict::Refuted,
                other => SolverVerdict::Unknown(format!("solver answered `{other}`")),
            },
            Err(err) => SolverVerdict::Unknown(format!("{err:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{SolverHandle, SolverState};
    use elide_expr::parse_expr;

    #[test]
    fn renders_refutation_query() {
        let goal = parse_expr("x * y > 0").expect("parse");
        let facts = vec![
            parse_expr("x > 0").expect("parse"),
            parse_expr("y >= 0.5").expect("parse"),
            parse_expr("s.trim() == s").expect("parse"),
        ];
        let q = render_refutation_query(&goal, &facts).expect("render");
        assert!(q.contains("(declare-const x Real)"));
        assert!(q.contains("(assert (>= y (/ 1.0 2.0)))"));
        assert!(q.contains("(assert (not (> (* x y) 0.0)))"));
        assert!(!q.contains("trim"));
        assert!(q.ends_with("(check-sat)\n"));
    }

    #[test]
    fn length_members_are_non_negative_symbols() {
        let goal = parse_expr("v.length >= 0").expect("parse");
        let q = render_refutation_query(&goal, &[]).expect("render");
        assert!(q.contains("(declare-const |v.length| Real)"));
        assert!(q.contains("(assert (>= |v.length| 0.0))"));
    }

    #[test]
    fn unrenderable_goal_is_an_error() {
        let goal = parse_expr("Number.isFinite(x)").expect("parse");
        assert!(render_refutation_query(&goal, &[]).is_err());
    }

    #[tokio::test]
    async fn missing_binary_fails_initialization() {
        let handle = SolverHandle::new(Z3ProcessSolver::new("/nonexistent/elide-z3"));
        assert!(matches!(handle.initialize().await, SolverState::Failed(_)));
        assert!(!handle.is_solver_ready());
    }
}
