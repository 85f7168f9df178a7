use elide_expr::parse_expr;
use elide_prover::{
    can_prove_at_compile_time, Decidability, DecidabilityInfo, EngineConfig, Outcome, PreferredStrategy, ProofEngine,
    ProofGoal, ProofMethod, RegistryContext, StepStatus, SubtypingEdge, TypeFact, WarningKind,
};

fn facts(specs: &[(&str, &str)]) -> Vec<TypeFact> {
    specs
        .iter()
        .map(|(v, p)| TypeFact::parse(*v, p).expect("fact parses"))
        .collect()
}

fn proved_rules(outcome: &elide_prover::ProofOutcome) -> Vec<String> {
    outcome
        .certificate
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Proved)
        .map(|s| s.rule.clone())
        .collect()
}

#[test]
fn identical_fact_is_proven_by_identity() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x > 0", &facts(&[("x", "x > 0")]))
        .expect("prove");
    assert_eq!(out.certificate.outcome, Outcome::Success);
    assert_eq!(out.method(), Some(ProofMethod::TypeIdentity));
    assert_eq!(proved_rules(&out), vec!["type_identity"]);
    assert_eq!(out.certificate.steps[0].used_facts, facts(&[("x", "x > 0")]));
}

#[test]
fn sum_of_positive_facts_is_positive() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x + y > 0", &facts(&[("x", "x > 0"), ("y", "y > 0")]))
        .expect("prove");
    assert!(out.is_proven());
    assert_eq!(out.method(), Some(ProofMethod::Algebraic));
    assert_eq!(proved_rules(&out), vec!["sum_of_positives"]);
}

#[test]
fn sum_is_proven_by_linear_fast_path_without_rules() {
    let mut reg = RegistryContext::new();
    reg.clear_algebraic_rules();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x + y > 0", &facts(&[("x", "x > 0"), ("y", "y > 0")]))
        .expect("prove");
    assert_eq!(out.method(), Some(ProofMethod::Linear));
    assert_eq!(proved_rules(&out), vec!["linear_fast_path"]);
}

#[test]
fn orderings_chain_by_transitivity() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("a > c", &facts(&[("a", "a > b"), ("b", "b > c")]))
        .expect("prove");
    assert!(out.is_proven());
    assert_eq!(proved_rules(&out), vec!["transitivity"]);
    let step = out
        .certificate
        .steps
        .iter()
        .find(|s| s.rule == "transitivity")
        .expect("transitivity step");
    assert_eq!(step.used_facts.len(), 2);
}

#[test]
fn brand_widening_proves_weaker_bound() {
    let mut reg = RegistryContext::new();
    reg.clear_subtyping_rules();
    reg.register_subtyping_rule(SubtypingEdge::new(
        "Positive",
        "NonNegative",
        "x > 0 ⇒ x >= 0",
        "strict bound implies non-strict",
    ));
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x >= 0", &facts(&[("x", "x: Positive")]))
        .expect("prove");
    assert!(out.is_proven());
    assert_eq!(out.method(), Some(ProofMethod::TypeIdentity));
    assert_eq!(proved_rules(&out), vec!["type_identity"]);
    assert!(out.certificate.steps[0].justification.contains("Positive → NonNegative"));

    assert!(reg.can_widen("Positive", "NonNegative"));
    assert!(!reg.can_widen("NonNegative", "Positive"));
}

#[test]
fn unprovable_bound_fails_without_warning() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x < 1000000", &facts(&[("x", "x > 0")]))
        .expect("prove");
    assert_eq!(out.certificate.outcome, Outcome::Failure);
    assert!(out.certificate.failure_reason.is_some());
    assert!(out.warnings.is_empty());
    assert!(out.decidability.is_none());
}

#[test]
fn unprovable_compile_time_brand_warns() {
    let mut reg = RegistryContext::new();
    let small = parse_expr("$ < 1000000").expect("parse");
    reg.register_brand("Small", small.clone());
    reg.register_decidability(DecidabilityInfo::new(
        "Small",
        small,
        Decidability::CompileTime,
        PreferredStrategy::Linear,
    ));
    let engine = ProofEngine::new(&reg);

    let out = engine
        .prove_text("x < 1000000", &facts(&[("x", "x > 0")]))
        .expect("prove");
    assert!(!out.is_proven());
    assert_eq!(out.warnings.len(), 1);
    let warning = &out.warnings[0];
    assert_eq!(warning.kind, WarningKind::CompileTimeFallback);
    assert_eq!(warning.brand.as_deref(), Some("Small"));
    let rendered = warning.certificate.as_deref().expect("rendered certificate");
    assert!(rendered.contains("goal: x < 1000000"));
    assert!(rendered.contains("outcome: failure"));

    let quiet = ProofEngine::new(&reg).with_config(EngineConfig {
        warn_on_compile_time_fallback: false,
        ..EngineConfig::default()
    });
    let out = quiet
        .prove_text("x < 1000000", &facts(&[("x", "x > 0")]))
        .expect("prove");
    assert!(out.warnings.is_empty());
}

#[test]
fn brand_goal_expands_through_catalog() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let goal = ProofGoal::parse("b: Byte").expect("parse");
    let out = engine
        .prove(&goal, &facts(&[("b", "b >= 0"), ("b", "b < 200")]))
        .expect("prove");
    assert!(out.is_proven(), "{}", out.certificate);
}

#[test]
fn vector_length_brands_match() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("v.length > 2", &facts(&[("v", "v: Vec<3>")]))
        .expect("prove");
    assert!(out.is_proven(), "{}", out.certificate);
    assert_eq!(out.method(), Some(ProofMethod::Linear));
}

#[test]
fn certificates_record_the_registry_generation() {
    let mut reg = RegistryContext::new();
    let cert = ProofEngine::new(&reg)
        .prove_text("x > 0", &facts(&[("x", "x > 0")]))
        .expect("prove")
        .certificate;
    assert!(cert.check_stamp(reg.stamp()).is_ok());

    reg.clear_decidability();
    assert!(cert.check_stamp(reg.stamp()).is_err());
}

#[test]
fn every_registered_rule_is_tried() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x + y > 0", &facts(&[("x", "x > 0"), ("y", "y > 0")]))
        .expect("prove");
    assert_eq!(out.method(), Some(ProofMethod::Algebraic));
    let tried: Vec<&str> = out.certificate.steps.iter().map(|s| s.rule.as_str()).collect();
    for name in reg.rules().names() {
        assert!(tried.contains(&name), "{name} missing from {tried:?}");
    }
    assert_eq!(proved_rules(&out), vec!["sum_of_positives"]);
}

#[test]
fn decidable_brand_fallback_is_quiet() {
    assert!(can_prove_at_compile_time(Decidability::CompileTime));
    assert!(!can_prove_at_compile_time(Decidability::Decidable));

    let mut reg = RegistryContext::new();
    let medium = parse_expr("$ < 1000000").expect("parse");
    reg.register_brand("Medium", medium.clone());
    reg.register_decidability(DecidabilityInfo::new(
        "Medium",
        medium,
        Decidability::Decidable,
        PreferredStrategy::Linear,
    ));
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x < 1000000", &facts(&[("x", "x > 0")]))
        .expect("prove");
    assert!(!out.is_proven());
    assert_eq!(
        out.decidability.as_ref().map(|d| d.decidability),
        Some(Decidability::Decidable)
    );
    assert!(out.warnings.is_empty());
}

#[test]
fn constants_at_the_i128_boundary_do_not_panic() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let half = 1i128 << 126;
    let out = engine
        .prove_text(&format!("0 - {half} - {half} < 0"), &[])
        .expect("prove");
    assert_eq!(out.method(), Some(ProofMethod::Constant));

    let out = engine
        .prove_text(&format!("0 - {half} - {half} - 1 < 0"), &[])
        .expect("prove");
    assert!(!out.is_proven());
}

#[test]
fn huge_constant_exponents_stay_undecided() {
    let reg = RegistryContext::new();
    let engine = ProofEngine::new(&reg);
    let out = engine
        .prove_text("x + 1 ** 128 > 0", &facts(&[("x", "x > 0")]))
        .expect("prove");
    assert!(out.is_proven(), "{}", out.certificate);

    for exp in ["100000000", "4294967295"] {
        let out = engine
            .prove_text(&format!("x + 1 ** {exp} > 0"), &facts(&[("x", "x > 0")]))
            .expect("prove");
        assert!(!out.is_proven());
    }
}
