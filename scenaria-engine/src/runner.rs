//! # Headless Runner
//!
//! Drives a simulation to its terminal node without a host, picking options
//! with a [`ChoicePolicy`]. The run digest covers the visited path and the
//! final store, so replaying a seeded run must reproduce it exactly.

use blake3::Hasher;
use tracing::info;

use scenaria_core::store::Store;

use crate::error::RunError;
use crate::random::RandomSource;
use crate::simulation::{Resolution, Simulation};

/// How a headless run picks among the options of a choice node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoicePolicy {
    /// The first available option.
    First,
    /// A uniformly random available option, drawn from the run's source.
    Random,
    /// Option ids consumed in order, one per choice node visited.
    Scripted(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub steps: Vec<Resolution>,
    pub final_store: Store,
    /// Hex encoded BLAKE3 hash of the visited path and the final store.
    pub digest: String,
}

/// Runs `simulation` from its current state until it terminates.
pub fn run<R: RandomSource + ?Sized>(
    simulation: &mut Simulation,
    policy: &ChoicePolicy,
    rng: &mut R,
    max_steps: usize,
) -> Result<RunReport, RunError> {
    let mut script = match policy {
        ChoicePolicy::Scripted(ids) => ids.as_slice(),
        _ => &[],
    }
    .iter();

    let mut steps = 0;
    while !simulation.is_terminal() {
        if steps == max_steps {
            return Err(RunError::StepLimit(max_steps));
        }

        let available: Vec<String> = simulation
            .available_options()?
            .iter()
            .map(|option| option.id.clone())
            .collect();
        if available.is_empty() {
            simulation.advance(rng)?;
        } else {
            let choice = match policy {
                ChoicePolicy::First => available[0].clone(),
                ChoicePolicy::Random => {
                    let idx = (rng.next_unit() * available.len() as f64) as usize;
                    available[idx.min(available.len() - 1)].clone()
                }
                ChoicePolicy::Scripted(_) => script.next().cloned().ok_or_else(|| {
                    let node = simulation.current_node().map(|n| n.id.clone());
                    RunError::ScriptExhausted(node.unwrap_or_default())
                })?,
            };
            simulation.choose_option(&choice, rng)?;
        }
        simulation.acknowledge()?;
        steps += 1;
    }

    let digest = digest(simulation.history(), simulation.store());
    info!(steps, digest = %digest, "Run complete");
    Ok(RunReport {
        steps: simulation.history().to_vec(),
        final_store: simulation.store().clone(),
        digest,
    })
}

/// Hashes the visited path (node, option, bonus outcome) and every leaf of
/// the final store. Ids are length-prefixed so no two paths share an
/// encoding.
pub fn digest(history: &[Resolution], store: &Store) -> String {
    let mut hasher = Hasher::new();
    for step in history {
        for id in [&step.node, &step.option] {
            hasher.update(&(id.len() as u64).to_le_bytes());
            hasher.update(id.as_bytes());
        }
        let fired = step.bonus.as_ref().is_some_and(|bonus| bonus.fired);
        hasher.update(if fired { b"+" } else { b";" });
    }
    for (path, value) in store.leaves() {
        hasher.update(format!("{path}={value}\n").as_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::random::{ScriptedSource, SeededSource};
    use crate::scenario::{LoadOptions, Next, Scenario};
    use crate::simulation::Selection;

    const LOOP: &str = r#"
initial_state: { laps: 0 }
nodes:
  - id: track
    options:
      - id: again
        effects: [ { path: laps, op: add, value: 1 } ]
        next: track
      - id: stop
        bonus: { probability: 0.5, effects: [ { path: laps, op: multiply, value: 10 } ] }
"#;

    fn simulation() -> Simulation {
        let scenario = Scenario::from_yaml_str(LOOP, &LoadOptions::default()).unwrap();
        Simulation::new(Arc::new(scenario))
    }

    #[test]
    fn scripted_runs_follow_the_script() {
        let mut sim = simulation();
        let policy = ChoicePolicy::Scripted(vec!["again".into(), "again".into(), "stop".into()]);
        let report = run(&mut sim, &policy, &mut ScriptedSource::new([0.1]), 10).unwrap();
        assert_eq!(report.steps.len(), 3);
        assert_eq!(report.final_store.get("laps").unwrap().as_number(), Some(20.0));
    }

    #[test]
    fn stops_at_the_step_limit() {
        let mut sim = simulation();
        let err = run(&mut sim, &ChoicePolicy::First, &mut ScriptedSource::default(), 5).unwrap_err();
        assert_eq!(err, RunError::StepLimit(5));
        assert_eq!(sim.history().len(), 5);
    }

    #[test]
    fn reports_an_exhausted_script() {
        let mut sim = simulation();
        let policy = ChoicePolicy::Scripted(vec!["again".into()]);
        let err = run(&mut sim, &policy, &mut ScriptedSource::default(), 10).unwrap_err();
        assert_eq!(err, RunError::ScriptExhausted("track".into()));
    }

    #[test]
    fn seeded_runs_share_a_digest() {
        let report = |seed| {
            let mut sim = simulation();
            run(&mut sim, &ChoicePolicy::Random, &mut SeededSource::from_seed(seed), 10_000)
                .unwrap()
        };
        let a = report(7);
        let b = report(7);
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn digest_depends_on_the_path() {
        let mut short = simulation();
        let mut long = simulation();
        let stop = ChoicePolicy::Scripted(vec!["stop".into()]);
        let lap = ChoicePolicy::Scripted(vec!["again".into(), "stop".into()]);
        let a = run(&mut short, &stop, &mut ScriptedSource::new([0.9]), 10).unwrap();
        let b = run(&mut long, &lap, &mut ScriptedSource::new([0.9]), 10).unwrap();
        assert_ne!(a.digest, b.digest);
    }

    fn visit(node: &str, option: &str) -> Resolution {
        Resolution {
            node: node.into(),
            option: option.into(),
            label: String::new(),
            selection: Selection::Chosen,
            deltas: Vec::new(),
            feedback: None,
            explanation: None,
            badge: None,
            bonus: None,
            next: Next::End,
        }
    }

    #[test]
    fn digest_keeps_ids_apart() {
        let store = simulation().store().clone();
        let split = [("a/b", "c"), ("a", "b/c"), ("a/b;", "c"), ("a", "b;c")];
        let digests: Vec<String> = split
            .iter()
            .map(|(node, option)| digest(&[visit(node, option)], &store))
            .collect();
        for (i, first) in digests.iter().enumerate() {
            for second in &digests[i + 1..] {
                assert_ne!(first, second);
            }
        }
        assert_ne!(
            digest(&[visit("ab", "c"), visit("d", "e")], &store),
            digest(&[visit("a", "bc"), visit("d", "e")], &store)
        );
    }
}
