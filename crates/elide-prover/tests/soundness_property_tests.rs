//! Property tests for the proof pipeline.
//!
//! A proof is only worth eliding a check for if the goal really holds, so
//! every "proven" outcome is cross-checked against concrete integer
//! assignments that satisfy the facts.

use elide_expr::{eval_with, parse_expr, Rational, Value};
use elide_prover::fact::expand_brands;
use elide_prover::{
    prove_by_refutation, try_simple_linear_proof, BrandCatalog, FactSet, ProofEngine,
    RegistryContext, TypeFact,
};
use proptest::prelude::*;

const VARS: [&str; 3] = ["x", "y", "z"];
const GRID: std::ops::RangeInclusive<i64> = -3..=3;

fn var() -> impl Strategy<Value = &'static str> {
    prop::sample::select(VARS.to_vec())
}

fn op() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![">", ">=", "<", "<=", "==", "!="])
}

fn ordering_op() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![">", ">=", "<", "<="])
}

fn linear_term() -> impl Strategy<Value = String> {
    prop_oneof![
        var().prop_map(str::to_string),
        (var(), var()).prop_map(|(a, b)| format!("{a} + {b}")),
        (var(), var()).prop_map(|(a, b)| format!("{a} - {b}")),
        (1i64..=3, var()).prop_map(|(k, a)| format!("{k} * {a}")),
    ]
}

fn term() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => linear_term(),
        1 => (var(), var()).prop_map(|(a, b)| format!("{a} * {b}")),
    ]
}

fn rhs() -> impl Strategy<Value = String> {
    prop_oneof![
        (-3i64..=3).prop_map(|k| k.to_string()),
        var().prop_map(str::to_string),
    ]
}

/// Facts about one variable: refinements and brands.
fn fact() -> impl Strategy<Value = TypeFact> {
    prop_oneof![
        3 => (var(), ordering_op(), -3i64..=3).prop_map(|(v, o, k)| (v.to_string(), format!("{v} {o} {k}"))),
        2 => (var(), ordering_op(), var()).prop_map(|(v, o, w)| (v.to_string(), format!("{v} {o} {w}"))),
        1 => (var(), -3i64..=3).prop_map(|(v, k)| (v.to_string(), format!("{v} == {k}"))),
        1 => (var(), prop::sample::select(vec!["Positive", "NonNegative", "NonZero", "Byte"]))
            .prop_map(|(v, b)| (v.to_string(), format!("{v}: {b}"))),
    ]
    .prop_map(|(v, text)| TypeFact::parse(v, &text).expect("generated fact parses"))
}

fn goal() -> impl Strategy<Value = String> {
    (term(), op(), rhs()).prop_map(|(l, o, r)| format!("{l} {o} {r}"))
}

fn linear_goal() -> impl Strategy<Value = String> {
    (linear_term(), ordering_op(), rhs()).prop_map(|(l, o, r)| format!("{l} {o} {r}"))
}

fn holds(expr: &elide_expr::Expr, point: &[(&str, i64)]) -> Option<bool> {
    let lookup = |name: &str| {
        point
            .iter()
            .find(|(v, _)| *v == name)
            .map(|(_, k)| Rational::from(*k))
    };
    match eval_with(expr, &lookup)? {
        Value::Bool(b) => Some(b),
        _ => None,
    }
}

/// Every grid point satisfying all facts also satisfies the goal.
fn assert_entailed(goal: &str, facts: &[TypeFact], catalog: &BrandCatalog) {
    let goal_expr = parse_expr(goal).expect("goal parses");
    let fact_exprs: Vec<_> = facts
        .iter()
        .map(|f| expand_brands(&f.resolved_predicate(), catalog))
        .collect();
    for x in GRID {
        for y in GRID {
            for z in GRID {
                let point = [("x", x), ("y", y), ("z", z)];
                let satisfied = fact_exprs
                    .iter()
                    .all(|f| holds(f, &point) == Some(true));
                if !satisfied {
                    continue;
                }
                if let Some(value) = holds(&goal_expr, &point) {
                    assert!(
                        value,
                        "`{goal}` proven but false at x={x} y={y} z={z} under {facts:?}"
                    );
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proven_goals_hold_on_every_satisfying_point(
        facts in prop::collection::vec(fact(), 0..5),
        goal in goal(),
    ) {
        let reg = RegistryContext::new();
        let engine = ProofEngine::new(&reg);
        let outcome = engine.prove_text(&goal, &facts).expect("generated goals are well formed");
        if outcome.is_proven() {
            assert_entailed(&goal, &facts, reg.brands());
        }
    }

    #[test]
    fn fast_path_proofs_are_refutation_proofs(
        facts in prop::collection::vec(fact(), 0..5),
        goal in linear_goal(),
    ) {
        let catalog = BrandCatalog::new();
        let set = FactSet::new(&facts, &catalog);
        let target = parse_expr(&goal).expect("goal parses").canonical();

        let fast = try_simple_linear_proof(&target, &set);
        if fast.proven {
            let fm = prove_by_refutation(&target, &set, 4096);
            prop_assert!(fm.proven, "fast path proved `{}` but refutation did not: {}", goal, fm.reason);
        }
    }

    #[test]
    fn non_linear_goals_never_reach_linear_success(
        facts in prop::collection::vec(fact(), 0..5),
        a in var(),
        b in var(),
        o in ordering_op(),
        k in -3i64..=3,
    ) {
        let catalog = BrandCatalog::new();
        let set = FactSet::new(&facts, &catalog);
        let target = parse_expr(&format!("{a} * {b} {o} {k}")).expect("goal parses").canonical();

        let fast = try_simple_linear_proof(&target, &set);
        prop_assert!(!fast.proven);
        prop_assert!(fast.reason.contains("not linear"));
        prop_assert!(!prove_by_refutation(&target, &set, 4096).proven);
    }

    #[test]
    fn refutation_limit_is_never_a_proof(
        facts in prop::collection::vec(fact(), 0..5),
        goal in linear_goal(),
    ) {
        let catalog = BrandCatalog::new();
        let set = FactSet::new(&facts, &catalog);
        let target = parse_expr(&goal).expect("goal parses").canonical();

        let tight = prove_by_refutation(&target, &set, 1);
        prop_assert!(!(tight.proven && tight.inconclusive));
        if tight.proven {
            assert_entailed(&goal, &facts, &catalog);
        }
    }
}

#[test]
fn product_of_positives_is_algebraic_not_linear() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let facts = vec![
        TypeFact::parse("x", "x > 0").expect("fact"),
        TypeFact::parse("y", "y > 0").expect("fact"),
    ];
    let out = engine.prove_text("x * y > 0", &facts).expect("prove");
    assert!(out.is_proven());
    assert!(out
        .certificate
        .steps
        .iter()
        .any(|s| s.rule == "product_of_positives"));

    let out = engine
        .prove_text("x * y > 0", &facts[..1])
        .expect("prove");
    assert!(!out.is_proven());
}
