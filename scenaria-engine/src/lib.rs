//! # scenaria-engine
//!
//! Scenario graph engine built on `scenaria-core`.
//!
//! ### Key Submodules:
//! - `document`: Serde model of scenario documents
//! - `scenario`: Loading, validation and the compiled node graph
//! - `simulation`: The `AwaitingChoice` / `Resolved` / `Terminal` state machine
//! - `random`: Injectable random sources for bonus draws
//! - `runner`: Headless runs with choice policies and a replayable digest

pub mod document;
pub mod error;
pub mod random;
pub mod runner;
pub mod scenario;
pub mod simulation;

pub mod prelude {
    pub use crate::document::{NodeMode, ScenarioDocument};
    pub use crate::error::{DocumentError, RunError, SimulationError};
    pub use crate::random::{RandomSource, ScriptedSource, SeededSource};
    pub use crate::runner::{run, ChoicePolicy, RunReport};
    pub use crate::scenario::{LoadOptions, Next, Node, Scenario, ScenarioOption};
    pub use crate::simulation::{Resolution, Selection, Simulation, State};
}

pub use error::{DocumentError, RunError, SimulationError};
pub use scenario::{LoadOptions, Scenario};
pub use simulation::Simulation;
