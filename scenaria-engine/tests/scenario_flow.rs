use std::sync::Arc;

use scenaria_config::MixedNodePolicy;
use scenaria_core::store::Value;
use scenaria_engine::prelude::*;

macro_rules! fixture {
    ($name:literal) => {
        concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/", $name)
    };
}

const DEMO: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../scenarios/first_card.yaml");

fn load(path: &str) -> Simulation {
    let scenario = Scenario::load(path, &LoadOptions::default()).unwrap();
    Simulation::new(Arc::new(scenario))
}

fn number(sim: &Simulation, path: &str) -> f64 {
    match sim.read(path).unwrap() {
        Value::Number(n) => *n,
        other => panic!("{path} is not a number: {other}"),
    }
}

#[test]
fn auto_node_applies_first_matching_option() {
    let mut sim = load(fixture!("first_match.yaml"));
    let mut rng = ScriptedSource::default();

    assert!(sim.available_options().unwrap().is_empty());
    let resolution = sim.advance(&mut rng).unwrap();

    assert_eq!(resolution.option, "streak");
    assert_eq!(resolution.selection, Selection::Matched);
    assert_eq!(number(&sim, "score"), 665.0);
    assert_eq!(rng.taken(), 0);

    assert_eq!(sim.acknowledge().unwrap(), &State::Terminal);
    assert!(sim.is_terminal());
}

#[test]
fn unmatched_auto_node_without_fallback_leaves_store_alone() {
    let mut sim = load(fixture!("no_fallback.yaml"));
    let before = sim.store().clone();

    let err = sim.advance(&mut ScriptedSource::default()).unwrap_err();
    match err {
        SimulationError::NoApplicableOption { node, store } => {
            assert_eq!(node, "audit");
            assert_eq!(store, before);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sim.store(), &before);
    assert_eq!(
        sim.state(),
        &State::AwaitingChoice {
            node: "audit".into()
        }
    );
    assert!(sim.history().is_empty());
}

#[test]
fn certain_bonus_always_fires() {
    for draw in [0.0, 0.5, 0.999] {
        let mut sim = load(fixture!("bonus.yaml"));
        let mut rng = ScriptedSource::new([draw]);
        let resolution = sim.choose_option("sure", &mut rng).unwrap();

        let bonus = resolution.bonus.unwrap();
        assert!(bonus.fired);
        assert_eq!(bonus.feedback.as_deref(), Some("Lucky!"));
        assert_eq!(number(&sim, "score"), 655.0);
        assert_eq!(number(&sim, "cash"), 110.0);
        assert_eq!(rng.taken(), 1);
    }
}

#[test]
fn impossible_bonus_never_fires() {
    for draw in [0.0, 0.5, 0.999] {
        let mut sim = load(fixture!("bonus.yaml"));
        let mut rng = ScriptedSource::new([draw]);
        let resolution = sim.choose_option("never", &mut rng).unwrap();

        let bonus = resolution.bonus.unwrap();
        assert!(!bonus.fired);
        assert_eq!(bonus.feedback, None);
        assert_eq!(number(&sim, "score"), 650.0);
        assert_eq!(number(&sim, "cash"), 110.0);
        assert_eq!(rng.taken(), 1);
    }
}

#[test]
fn mixed_nodes_are_rejected_by_default() {
    let err = Scenario::load(fixture!("mixed.yaml"), &LoadOptions::default()).unwrap_err();
    assert!(
        matches!(err, DocumentError::AmbiguousNode(ref node) if node == "offer"),
        "{err}"
    );
}

#[test]
fn mixed_nodes_resolve_conditioned_first_when_allowed() {
    let options = LoadOptions {
        mixed_nodes: MixedNodePolicy::ConditionedFirst,
    };
    let scenario = Scenario::load(fixture!("mixed.yaml"), &options).unwrap();
    assert_eq!(scenario.node("offer").unwrap().mode, NodeMode::Auto);

    let mut sim = Simulation::new(Arc::new(scenario));
    let resolution = sim.advance(&mut ScriptedSource::default()).unwrap();
    assert_eq!(resolution.option, "standard");
    assert_eq!(number(&sim, "cash"), 900.0);
}

#[test]
fn gated_choices_clamp_and_fall_back() {
    let mut sim = load(fixture!("gated_choice.yaml"));
    let mut rng = ScriptedSource::default();

    let available: Vec<&str> = sim
        .available_options()
        .unwrap()
        .iter()
        .map(|option| option.id.as_str())
        .collect();
    assert_eq!(available, ["pay_minimum"]);
    assert!(matches!(
        sim.choose_option("pay_full", &mut rng),
        Err(SimulationError::OptionUnavailable { .. })
    ));
    assert!(matches!(
        sim.advance(&mut rng),
        Err(SimulationError::ChoiceRequired(_))
    ));

    let resolution = sim.choose_option("pay_minimum", &mut rng).unwrap();
    assert_eq!(resolution.next, Next::Node("broke".into()));
    assert_eq!(number(&sim, "cash"), 0.0);
    assert_eq!(number(&sim, "cc.balance"), 275.0);
    assert!((number(&sim, "computed.utilizationPct") - 27.5).abs() < 1e-9);
    assert_eq!(
        sim.read("computed.utilizationPct").unwrap(),
        sim.read("utilizationPct").unwrap()
    );

    sim.acknowledge().unwrap();
    assert!(sim.available_options().unwrap().is_empty());
    let resolution = sim.advance(&mut rng).unwrap();
    assert_eq!(resolution.option, "tough_luck");
    assert_eq!(resolution.selection, Selection::Fallback);
    assert_eq!(resolution.feedback.as_deref(), Some("Nothing left to spend."));
    assert!(resolution.deltas.is_empty());
}

#[test]
fn reset_restores_the_initial_snapshot() {
    let mut sim = load(fixture!("gated_choice.yaml"));
    let initial = sim.store().clone();
    sim.choose_option("pay_minimum", &mut ScriptedSource::default())
        .unwrap();
    sim.acknowledge().unwrap();
    assert_ne!(sim.store(), &initial);

    sim.reset();
    assert_eq!(sim.store(), &initial);
    assert!(sim.history().is_empty());
    assert_eq!(
        sim.state(),
        &State::AwaitingChoice {
            node: "bill".into()
        }
    );
}

#[test]
fn seeded_runs_are_reproducible() {
    let digest = |seed| {
        let mut sim = load(DEMO);
        let mut rng = SeededSource::from_seed(seed);
        run(&mut sim, &ChoicePolicy::Random, &mut rng, 100)
            .unwrap()
            .digest
    };
    assert_eq!(digest(7), digest(7));
    assert_eq!(digest(7).len(), 64);
}

#[test]
fn demo_scenario_plays_to_the_end() {
    let mut sim = load(DEMO);
    assert_eq!(sim.scenario().title(), "Your First Credit Card");
    assert!(sim.scenario().unreachable().is_empty());

    let policy = ChoicePolicy::Scripted(vec!["pay_full".into(), "modest".into(), "accept".into()]);
    // Bonus on the limit offer does not fire.
    let mut rng = ScriptedSource::new([0.9]);
    let report = run(&mut sim, &policy, &mut rng, 100).unwrap();

    let path: Vec<&str> = report.steps.iter().map(|s| s.option.as_str()).collect();
    assert_eq!(path, ["pay_full", "modest", "accept", "stellar"]);
    assert_eq!(report.steps[0].badge.as_deref(), Some("On-Time Payer"));
    assert_eq!(report.steps[3].selection, Selection::Matched);
    // 650 + 15 + 10 + 20 + 25
    assert_eq!(number(&sim, "score"), 720.0);
    assert_eq!(number(&sim, "computed.utilizationPct"), 7.0);

    let rows = sim.projection().unwrap();
    assert_eq!(rows[0].label.as_deref(), Some("Credit Score"));
    assert_eq!(rows[0].value, Value::Number(720.0));
}

#[test]
fn script_that_runs_out_is_reported() {
    let mut sim = load(DEMO);
    let policy = ChoicePolicy::Scripted(vec!["miss".into()]);
    let err = run(&mut sim, &policy, &mut ScriptedSource::default(), 100).unwrap_err();
    assert!(matches!(err, RunError::ScriptExhausted(ref node) if node == "shopping"));
}
