use elide_prover::decidability::BUILTIN_DECIDABILITY;
use elide_prover::rules::IdentityRule;
use elide_prover::{RegistryContext, SubtypingEdge, SubtypingRegistry};
use proptest::prelude::*;

const BRANDS: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

fn edge_list() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..BRANDS.len(), 0usize..BRANDS.len()), 0..12)
}

fn build(edges: &[(usize, usize)]) -> SubtypingRegistry {
    let mut reg = SubtypingRegistry::new();
    for (from, to) in edges {
        reg.register(SubtypingEdge::new(
            BRANDS[*from],
            BRANDS[*to],
            format!("{} ⇒ {}", BRANDS[*from], BRANDS[*to]),
            "generated",
        ));
    }
    reg
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn widening_is_reflexive(edges in edge_list(), b in 0usize..BRANDS.len()) {
        let reg = build(&edges);
        prop_assert!(reg.can_widen(BRANDS[b], BRANDS[b]));
        prop_assert_eq!(reg.path(BRANDS[b], BRANDS[b], |_| true), Some(Vec::new()));
    }

    #[test]
    fn widening_is_transitive(
        edges in edge_list(),
        a in 0usize..BRANDS.len(),
        b in 0usize..BRANDS.len(),
        c in 0usize..BRANDS.len(),
    ) {
        let reg = build(&edges);
        if reg.can_widen(BRANDS[a], BRANDS[b]) && reg.can_widen(BRANDS[b], BRANDS[c]) {
            prop_assert!(reg.can_widen(BRANDS[a], BRANDS[c]));
        }
    }

    #[test]
    fn paths_are_connected_chains_of_registered_edges(
        edges in edge_list(),
        a in 0usize..BRANDS.len(),
        c in 0usize..BRANDS.len(),
    ) {
        let reg = build(&edges);
        if let Some(path) = reg.path(BRANDS[a], BRANDS[c], |_| true) {
            let mut at = BRANDS[a].to_string();
            for edge in &path {
                prop_assert_eq!(&edge.from, &at);
                prop_assert!(reg.get(&edge.from, &edge.to).is_some());
                at = edge.to.clone();
            }
            prop_assert_eq!(at, BRANDS[c]);
        }
    }

    #[test]
    fn re_registering_edges_is_idempotent(edges in edge_list()) {
        let once = build(&edges);
        let mut doubled = edges.clone();
        doubled.extend(edges.iter().copied());
        let twice = build(&doubled);

        prop_assert_eq!(once.len(), twice.len());
        for a in BRANDS {
            for b in BRANDS {
                prop_assert_eq!(once.can_widen(a, b), twice.can_widen(a, b));
            }
        }
    }

    #[test]
    fn reachability_matches_pairwise_widening(edges in edge_list(), a in 0usize..BRANDS.len()) {
        let reg = build(&edges);
        let reached: Vec<String> = reg
            .reachable(BRANDS[a], |_| true)
            .into_iter()
            .map(|(brand, _)| brand)
            .collect();
        for b in BRANDS.iter().filter(|b| **b != BRANDS[a]) {
            prop_assert_eq!(reached.iter().any(|r| r == *b), reg.can_widen(BRANDS[a], b));
        }
    }
}

#[test]
fn single_edge_is_not_symmetric() {
    let mut reg = SubtypingRegistry::new();
    reg.register(SubtypingEdge::new("Positive", "NonNegative", "x > 0 ⇒ x >= 0", "weaker"));
    assert!(reg.can_widen("Positive", "NonNegative"));
    assert!(!reg.can_widen("NonNegative", "Positive"));
    assert!(reg.get("NonNegative", "Positive").is_none());
}

#[test]
fn cycles_terminate() {
    let mut reg = SubtypingRegistry::new();
    reg.register(SubtypingEdge::new("A", "B", "", ""));
    reg.register(SubtypingEdge::new("B", "C", "", ""));
    reg.register(SubtypingEdge::new("C", "A", "", ""));
    assert!(reg.can_widen("C", "B"));
    assert!(!reg.can_widen("A", "D"));
}

#[test]
fn direct_lookup_ignores_transitive_edges() {
    let reg = RegistryContext::new();
    assert!(reg.can_widen("Port", "NonNegative"));
    assert!(reg.get_subtyping_rule("Port", "NonNegative").is_none());
    assert!(reg.get_subtyping_rule("Port", "Positive").is_some());
}

#[test]
fn context_generation_counts_mutations() {
    let mut reg = RegistryContext::new();
    let start = reg.generation();
    reg.register_algebraic_rule(IdentityRule);
    reg.register_algebraic_rule(IdentityRule);
    assert_eq!(reg.rules().names().iter().filter(|n| **n == "identity").count(), 1);
    reg.register_subtyping_rule(SubtypingEdge::new("Byte", "NonNegative", "", ""));
    assert_eq!(reg.generation(), start + 3);

    let other = RegistryContext::new();
    assert!(reg.stamp().check(other.stamp()).is_err());
}

#[test]
fn builtin_decidability_covers_builtin_brands() {
    let reg = RegistryContext::new();
    for (brand, ..) in BUILTIN_DECIDABILITY {
        let info = reg.get_decidability(brand).expect("classified");
        assert!(reg.brands().contains(&info.brand));
    }
    assert!(reg.get_decidability("Vec<4>").is_some());
    assert!(reg.get_decidability("Unknown").is_none());
}
