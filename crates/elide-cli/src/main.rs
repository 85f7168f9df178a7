//! Elide CLI
//!
//! Command-line front-end for the proof-elision engine:
//! - `prove`: prove one condition from a list of facts
//! - `check`: decide every contract condition in a JSON contracts file
//! - `widen`: query the brand widening graph
//! - `brands`: list known brands and their decidability

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use elide_prover::{
    decide_function, format_certificate, BrandFactExtractor, BuildWarning, ContractFile,
    Decision, DecidabilityInfo, DecisionRecord, DecisionSummary, EngineConfig, ProofCertificate,
    ProofEngine, ProofGoal, RegistryContext, SolverHandle, SolverState, TypeFact,
    Z3ProcessSolver,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "elide")]
#[command(
    author,
    version,
    about = "Elide: prove contract conditions at compile time and drop their runtime checks"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Engine options shared by `prove` and `check`.
#[derive(Args, Debug, Clone, Default)]
struct EngineArgs {
    /// Engine configuration JSON; flags below override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the pattern-based linear proofs
    #[arg(long, global = true)]
    no_fast_path: bool,

    /// Skip Fourier–Motzkin refutation
    #[arg(long, global = true)]
    no_fourier_motzkin: bool,

    /// Row limit for Fourier–Motzkin elimination
    #[arg(long, global = true)]
    max_fm_rows: Option<usize>,

    /// Consult a z3 binary for goals the built-in strategies cannot prove
    #[arg(long, global = true, num_args = 0..=1, default_missing_value = "z3", value_name = "BIN")]
    z3: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Prove a single condition.
    ///
    /// Facts are predicates such as `x > 0` or brand annotations such as
    /// `x: Positive`; each is attached to its first variable.
    Prove {
        /// Goal condition, e.g. "x + y > 0"
        goal: String,
        /// Known fact (repeatable)
        #[arg(short, long = "fact")]
        facts: Vec<String>,
        /// Brand the goal restates (used for decidability classification)
        #[arg(long)]
        brand: Option<String>,
        /// Print the full certificate
        #[arg(long)]
        explain: bool,
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Decide every condition in a contracts file.
    Check {
        /// Contracts JSON (`{ "functions": [...] }`)
        input: PathBuf,
        /// Write decision records as JSON
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Print certificates for conditions that keep their runtime check
        #[arg(long)]
        explain: bool,
        /// Fail if any compile-time brand falls back to a runtime check
        #[arg(long)]
        deny_warnings: bool,
    },

    /// Show how one brand widens to another.
    Widen {
        /// Source brand
        from: String,
        /// Target brand; omit to list every brand reachable from `from`
        to: Option<String>,
    },

    /// List known brands with their predicates and decidability.
    Brands {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let registry = RegistryContext::new();

    match cli.command {
        Commands::Prove {
            goal,
            facts,
            brand,
            explain,
            json,
        } => {
            let engine = build_engine(&registry, &cli.engine)?;
            cmd_prove(&engine, &goal, &facts, brand, explain, json)?;
        }
        Commands::Check {
            input,
            out,
            explain,
            deny_warnings,
        } => {
            let engine = build_engine(&registry, &cli.engine)?;
            cmd_check(&engine, &input, out.as_deref(), explain, deny_warnings)?;
        }
        Commands::Widen { from, to } => cmd_widen(&registry, &from, to.as_deref())?,
        Commands::Brands { json } => cmd_brands(&registry, json)?,
    }
    Ok(())
}

// ============================================================================
// Engine setup
// ============================================================================

fn engine_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if args.no_fast_path {
        config.enable_fast_path = false;
    }
    if args.no_fourier_motzkin {
        config.enable_fourier_motzkin = false;
    }
    if let Some(rows) = args.max_fm_rows {
        config.max_fm_constraints = rows;
    }
    Ok(config)
}

fn build_engine<'r>(registry: &'r RegistryContext, args: &EngineArgs) -> Result<ProofEngine<'r>> {
    let config = engine_config(args)?;
    let mut engine = ProofEngine::new(registry).with_config(config);
    if let Some(binary) = &args.z3 {
        let handle = SolverHandle::new(Z3ProcessSolver::new(binary.clone()));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        match runtime.block_on(handle.initialize()) {
            SolverState::Ready => tracing::info!(solver = %binary, "external solver ready"),
            state => eprintln!(
                "{} external solver {} is {}; continuing without it",
                "warning:".yellow().bold(),
                binary,
                state
            ),
        }
        engine = engine.with_solver(handle);
    }
    Ok(engine)
}

fn parse_facts(texts: &[String]) -> Result<Vec<TypeFact>> {
    texts
        .iter()
        .map(|text| {
            TypeFact::infer(text)
                .map_err(|e| anyhow!("invalid fact `{text}`: {e}"))?
                .ok_or_else(|| anyhow!("fact `{text}` mentions no variable"))
        })
        .collect()
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Serialize)]
struct ProveReport<'a> {
    proven: bool,
    certificate: &'a ProofCertificate,
    warnings: &'a [BuildWarning],
    #[serde(skip_serializing_if = "Option::is_none")]
    decidability: Option<&'a DecidabilityInfo>,
}

fn cmd_prove(
    engine: &ProofEngine<'_>,
    goal: &str,
    facts: &[String],
    brand: Option<String>,
    explain: bool,
    json: bool,
) -> Result<()> {
    let facts = parse_facts(facts)?;
    let mut goal = ProofGoal::parse(goal).map_err(|e| anyhow!("invalid goal `{goal}`: {e}"))?;
    goal.brand = brand;
    let outcome = engine.prove(&goal, &facts)?;

    if json {
        let report = ProveReport {
            proven: outcome.is_proven(),
            certificate: &outcome.certificate,
            warnings: &outcome.warnings,
            decidability: outcome.decidability.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match outcome.method() {
        Some(method) if outcome.is_proven() => {
            println!("{} {} ({})", "ok".green().bold(), goal.expr, method);
        }
        _ => {
            println!(
                "{} {}: {}",
                "runtime".yellow().bold(),
                goal.expr,
                outcome
                    .certificate
                    .failure_reason
                    .as_deref()
                    .unwrap_or("unproven")
            );
        }
    }
    for warning in &outcome.warnings {
        eprintln!("{} {}", "warning:".yellow().bold(), warning.message);
    }
    if explain {
        print!("{}", format_certificate(&outcome.certificate));
    }
    Ok(())
}

fn cmd_check(
    engine: &ProofEngine<'_>,
    input: &Path,
    out: Option<&Path>,
    explain: bool,
    deny_warnings: bool,
) -> Result<()> {
    let file = ContractFile::load(input)?;
    let extractor = BrandFactExtractor::new(engine.registry().brands());

    let mut records: Vec<DecisionRecord> = Vec::new();
    for function in &file.functions {
        let decided = decide_function(engine, &extractor, function)
            .with_context(|| format!("in function `{}`", function.function))?;
        println!("{}", function.function.bold());
        for record in &decided {
            print_decision(record, explain);
        }
        records.extend(decided);
    }

    let summary = DecisionSummary::of(&records);
    println!(
        "{} {} elided, {} runtime checks, {} warnings",
        "summary:".bold(),
        summary.proven.to_string().green(),
        summary.runtime.to_string().yellow(),
        summary.warnings
    );

    if let Some(out) = out {
        let text = serde_json::to_string_pretty(&records)?;
        std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))?;
        eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
    }

    if deny_warnings && summary.warnings > 0 {
        return Err(anyhow!(
            "{} compile-time condition(s) fell back to runtime checks",
            summary.warnings
        ));
    }
    Ok(())
}

fn print_decision(record: &DecisionRecord, explain: bool) {
    let kind = record.kind.as_str();
    match record.decision {
        Decision::Proven => {
            let method = record
                .certificate
                .method
                .map(|m| m.to_string())
                .unwrap_or_default();
            println!(
                "  {} {kind} {} ({method})",
                "elide".green().bold(),
                record.goal
            );
        }
        Decision::Runtime => {
            println!("  {} {kind} {}", "check".yellow().bold(), record.goal);
            if explain {
                for line in format_certificate(&record.certificate).lines() {
                    println!("      {line}");
                }
            }
        }
    }
    for warning in &record.warnings {
        eprintln!("  {} {}", "warning:".yellow().bold(), warning.message);
    }
}

fn cmd_widen(registry: &RegistryContext, from: &str, to: Option<&str>) -> Result<()> {
    if !registry.brands().contains(from) {
        return Err(anyhow!("unknown brand `{from}`"));
    }
    match to {
        Some(to) => match registry.widening_path(from, to) {
            Some(path) if path.is_empty() => println!("{} {from} is {to}", "yes".green().bold()),
            Some(path) => {
                println!("{} {from} widens to {to}", "yes".green().bold());
                for edge in path {
                    println!("  {} → {}: {}", edge.from, edge.to, edge.proof);
                }
            }
            None => println!("{} {from} does not widen to {to}", "no".red().bold()),
        },
        None => {
            let reachable = registry.widenings_of(from);
            if reachable.is_empty() {
                println!("{from} widens to no other brand");
            }
            for (brand, path) in reachable {
                let hops: Vec<&str> = path.iter().map(|e| e.to.as_str()).collect();
                println!("{} {} (via {})", "→".yellow(), brand.bold(), hops.join(" → "));
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct BrandEntry {
    name: String,
    predicate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    decidability: Option<DecidabilityInfo>,
}

fn cmd_brands(registry: &RegistryContext, json: bool) -> Result<()> {
    let entries: Vec<BrandEntry> = registry
        .brands()
        .names()
        .into_iter()
        .filter_map(|name| {
            let predicate = registry.brands().predicate(&name)?.to_string();
            Some(BrandEntry {
                decidability: registry.get_decidability(&name),
                name,
                predicate,
            })
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for entry in &entries {
        let class = entry
            .decidability
            .as_ref()
            .map(|d| d.decidability.to_string())
            .unwrap_or_else(|| "unclassified".to_string());
        println!("{} {:<14} {}", format!("{:<12}", entry.name).bold(), class, entry.predicate);
    }
    for family in registry.brands().families() {
        println!(
            "{} {:<14} (family)",
            format!("{:<12}", family.name).bold(),
            family.decidability.to_string()
        );
    }
    Ok(())
}
