//! Error types for document loading, transitions and headless runs.

use std::path::PathBuf;

use thiserror::Error;

use scenaria_core::error::{DefinitionError, EvalError};
use scenaria_core::store::Store;

/// A scenario document that cannot be loaded. The simulation never starts.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read scenario document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed scenario document: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("{context}: {source}")]
    Definition {
        context: String,
        #[source]
        source: DefinitionError,
    },

    #[error("initial state key `{0}` is empty or contains `.`")]
    InvalidKey(String),

    #[error("initial state cannot be evaluated: {0}")]
    InitialState(#[source] EvalError),

    #[error("initial value {value} of `{path}` is outside its declared bounds")]
    OutOfBounds { path: String, value: f64 },

    #[error("scenario declares no nodes")]
    NoNodes,

    #[error("node id `{0}` is declared more than once")]
    DuplicateNode(String),

    #[error("node id `{0}` is reserved for the terminal marker")]
    ReservedNodeId(String),

    #[error("node `{node}` declares option id `{option}` more than once")]
    DuplicateOption { node: String, option: String },

    #[error("node `{0}` has no options and no fallback")]
    EmptyNode(String),

    #[error(
        "node `{0}` mixes conditioned and unconditioned options; declare `mode: auto` or `mode: choice`"
    )]
    AmbiguousNode(String),

    #[error("auto node `{0}` has no conditioned option and no fallback")]
    UngatedAutoNode(String),

    #[error("bonus probability {probability} of option `{option}` in node `{node}` is outside [0, 1]")]
    InvalidProbability {
        node: String,
        option: String,
        probability: f64,
    },

    #[error("option `{option}` of node `{node}` leads to unknown node `{target}`")]
    DanglingReference {
        node: String,
        option: String,
        target: String,
    },

    #[error("start node `{0}` does not exist")]
    UnknownStart(String),
}

/// A transition that could not be carried out. The store is left unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("node `{node}`, option `{option}`: {source}")]
    Eval {
        node: String,
        option: String,
        #[source]
        source: EvalError,
    },

    #[error("no applicable option at node `{node}` for state {store}")]
    NoApplicableOption { node: String, store: Store },

    #[error("node `{0}` does not exist")]
    UnknownNode(String),

    #[error("node `{node}` has no option `{option}`")]
    UnknownOption { node: String, option: String },

    #[error("option `{option}` of node `{node}` is not available in the current state")]
    OptionUnavailable { node: String, option: String },

    #[error("node `{0}` is waiting for a choice")]
    ChoiceRequired(String),

    #[error("node `{0}` resolves automatically and offers no choice")]
    AutoResolving(String),

    #[error("the previous transition has not been acknowledged")]
    AwaitingAcknowledgement,

    #[error("there is no resolved transition to acknowledge")]
    NotResolved,

    #[error("the scenario has finished")]
    Finished,
}

/// Failures of a headless run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error("run did not terminate within {0} steps")]
    StepLimit(usize),

    #[error("no scripted choice left for node `{0}`")]
    ScriptExhausted(String),
}
