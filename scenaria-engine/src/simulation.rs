//! ## scenaria-engine::simulation
//! **Turn-based state machine over a compiled scenario**
//!
//! A simulation is `AwaitingChoice` at a node, `Resolved` after an option's
//! effects were applied, and `Terminal` once a resolution leading to the end
//! marker is acknowledged. Each transition computes the complete next store
//! before publishing it, so a failed transition leaves the previous store in
//! place.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use scenaria_core::effect;
use scenaria_core::error::StoreError;
use scenaria_core::store::{Store, Value};

use crate::document::NodeMode;
use crate::error::SimulationError;
use crate::random::RandomSource;
use crate::scenario::{Next, Node, Scenario, ScenarioOption};

/// How the resolved option was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Picked by the host.
    Chosen,
    /// First conditioned option whose conditions held.
    Matched,
    Fallback,
}

/// A single leaf that changed during a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub path: String,
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BonusOutcome {
    pub fired: bool,
    /// Present only when the bonus fired.
    pub feedback: Option<String>,
}

/// The payload handed to the host after a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub node: String,
    pub option: String,
    pub label: String,
    pub selection: Selection,
    pub deltas: Vec<Delta>,
    pub feedback: Option<String>,
    pub explanation: Option<String>,
    pub badge: Option<String>,
    pub bonus: Option<BonusOutcome>,
    pub next: Next,
}

#[derive(Debug, Clone, PartialEq)]
pub enum State {
    AwaitingChoice { node: String },
    Resolved(Resolution),
    Terminal,
}

/// A sidebar row: the path as declared, its label and its current value.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionRow {
    pub path: String,
    pub label: Option<String>,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct Simulation {
    scenario: Arc<Scenario>,
    store: Store,
    state: State,
    history: Vec<Resolution>,
}

impl Simulation {
    pub fn new(scenario: Arc<Scenario>) -> Self {
        let store = scenario.initial_state().clone();
        let state = State::AwaitingChoice {
            node: scenario.start().to_string(),
        };
        Self {
            scenario,
            store,
            state,
            history: Vec::new(),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Every resolution since the last reset, oldest first.
    ///
    /// Nothing is evicted: a graph that cycles keeps appending one entry per
    /// transition until the host calls [`Simulation::reset`]. Headless runs
    /// stay bounded through the runner's step limit.
    pub fn history(&self) -> &[Resolution] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state == State::Terminal
    }

    /// The node awaiting a choice, or the node just resolved.
    pub fn current_node(&self) -> Option<&Node> {
        match &self.state {
            State::AwaitingChoice { node } => self.scenario.node(node),
            State::Resolved(resolution) => self.scenario.node(&resolution.node),
            State::Terminal => None,
        }
    }

    /// Reads a path from the current store, following aliases.
    pub fn read(&self, path: &str) -> Result<&Value, StoreError> {
        let canonical = self.scenario.schema().resolve(path).unwrap_or(path);
        self.store.get(canonical)
    }

    /// Sidebar rows for the current store.
    pub fn projection(&self) -> Result<Vec<ProjectionRow>, StoreError> {
        self.scenario
            .sidebar()
            .iter()
            .map(|entry| {
                Ok(ProjectionRow {
                    path: entry.path.clone(),
                    label: entry.label.clone(),
                    value: self.read(&entry.path)?.clone(),
                })
            })
            .collect()
    }

    /// Options the host may choose at the current node. Auto nodes offer none.
    pub fn available_options(&self) -> Result<Vec<&ScenarioOption>, SimulationError> {
        let node = self.awaiting(&self.scenario)?;
        match node.mode {
            NodeMode::Auto => Ok(Vec::new()),
            NodeMode::Choice => self.available_in(node),
        }
    }

    /// Resolves the current choice node with the option `id`.
    #[instrument(level = "debug", skip(self, rng))]
    pub fn choose_option<R: RandomSource + ?Sized>(
        &mut self,
        id: &str,
        rng: &mut R,
    ) -> Result<Resolution, SimulationError> {
        let scenario = Arc::clone(&self.scenario);
        let node = self.awaiting(&scenario)?;
        if node.mode == NodeMode::Auto {
            return Err(SimulationError::AutoResolving(node.id.clone()));
        }
        let option = node.option(id).ok_or_else(|| SimulationError::UnknownOption {
            node: node.id.clone(),
            option: id.to_string(),
        })?;
        if !self.applies(node, option)? {
            return Err(SimulationError::OptionUnavailable {
                node: node.id.clone(),
                option: id.to_string(),
            });
        }
        self.resolve(node, option, Selection::Chosen, rng)
    }

    /// Resolves the current node without a host choice: the first matching
    /// conditioned option of an auto node, otherwise the fallback.
    #[instrument(level = "debug", skip(self, rng))]
    pub fn advance<R: RandomSource + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Resolution, SimulationError> {
        let scenario = Arc::clone(&self.scenario);
        let node = self.awaiting(&scenario)?;
        let matched = match node.mode {
            NodeMode::Auto => self.first_match(node)?,
            NodeMode::Choice => {
                if !self.available_in(node)?.is_empty() {
                    return Err(SimulationError::ChoiceRequired(node.id.clone()));
                }
                None
            }
        };

        let selected = matched
            .map(|option| (option, Selection::Matched))
            .or_else(|| node.fallback.as_ref().map(|f| (f, Selection::Fallback)));
        let Some((option, selection)) = selected else {
            warn!(node = %node.id, state = %self.store, "no applicable option");
            return Err(SimulationError::NoApplicableOption {
                node: node.id.clone(),
                store: self.store.clone(),
            });
        };
        self.resolve(node, option, selection, rng)
    }

    /// Moves past a resolved transition to the next node or to the end.
    pub fn acknowledge(&mut self) -> Result<&State, SimulationError> {
        let next = match &self.state {
            State::Resolved(resolution) => resolution.next.clone(),
            State::AwaitingChoice { .. } => return Err(SimulationError::NotResolved),
            State::Terminal => return Err(SimulationError::Finished),
        };
        self.state = match next {
            Next::Node(node) => State::AwaitingChoice { node },
            Next::End => {
                info!(steps = self.history.len(), "Scenario finished");
                State::Terminal
            }
        };
        Ok(&self.state)
    }

    /// Discards all progress and returns to the initial snapshot.
    pub fn reset(&mut self) {
        self.store = self.scenario.initial_state().clone();
        self.state = State::AwaitingChoice {
            node: self.scenario.start().to_string(),
        };
        self.history.clear();
    }

    fn awaiting<'s>(&self, scenario: &'s Scenario) -> Result<&'s Node, SimulationError> {
        match &self.state {
            State::AwaitingChoice { node } => scenario
                .node(node)
                .ok_or_else(|| SimulationError::UnknownNode(node.clone())),
            State::Resolved(_) => Err(SimulationError::AwaitingAcknowledgement),
            State::Terminal => Err(SimulationError::Finished),
        }
    }

    fn applies(&self, node: &Node, option: &ScenarioOption) -> Result<bool, SimulationError> {
        option
            .applies(&self.store)
            .map_err(|source| SimulationError::Eval {
                node: node.id.clone(),
                option: option.id.clone(),
                source,
            })
    }

    fn available_in<'n>(&self, node: &'n Node) -> Result<Vec<&'n ScenarioOption>, SimulationError> {
        let mut available = Vec::with_capacity(node.options.len());
        for option in &node.options {
            if self.applies(node, option)? {
                available.push(option);
            }
        }
        Ok(available)
    }

    fn first_match<'n>(&self, node: &'n Node) -> Result<Option<&'n ScenarioOption>, SimulationError> {
        for option in node.options.iter().filter(|option| option.is_conditioned()) {
            if self.applies(node, option)? {
                return Ok(Some(option));
            }
        }
        Ok(None)
    }

    fn resolve<R: RandomSource + ?Sized>(
        &mut self,
        node: &Node,
        option: &ScenarioOption,
        selection: Selection,
        rng: &mut R,
    ) -> Result<Resolution, SimulationError> {
        let eval = |source| SimulationError::Eval {
            node: node.id.clone(),
            option: option.id.clone(),
            source,
        };

        let mut next = effect::apply(&option.effects, &self.store).map_err(eval)?;
        let bonus = match &option.bonus {
            Some(bonus) => {
                let fired = bonus.draw(rng);
                if fired {
                    next = effect::apply(&bonus.effects, &next).map_err(eval)?;
                }
                Some(BonusOutcome {
                    fired,
                    feedback: bonus.feedback.clone().filter(|_| fired),
                })
            }
            None => None,
        };
        let next = self.scenario.derived().recompute(&next).map_err(eval)?;

        let deltas = self
            .store
            .diff(&next)
            .into_iter()
            .map(|(path, before, after)| Delta {
                path,
                before: before.clone(),
                after: after.clone(),
            })
            .collect();
        let resolution = Resolution {
            node: node.id.clone(),
            option: option.id.clone(),
            label: option.label.clone(),
            selection,
            deltas,
            feedback: option.feedback.clone(),
            explanation: option.explanation.clone(),
            badge: option.badge.clone(),
            bonus,
            next: option.next.clone(),
        };
        info!(
            node = %resolution.node,
            option = %resolution.option,
            selection = ?selection,
            changes = resolution.deltas.len(),
            "Transition resolved"
        );

        self.store = next;
        self.history.push(resolution.clone());
        self.state = State::Resolved(resolution.clone());
        Ok(resolution)
    }
}
