//! Simulation engine parameters.
//!
//! Controls how scenario documents are interpreted and how headless runs are
//! bounded:
//! - Randomness seeding for bonus events and random choice policies
//! - Step limits for cyclic scenario graphs
//! - Handling of nodes that mix conditioned and unconditioned options

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// How a node that mixes conditioned and unconditioned options, and declares
/// no explicit mode, is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedNodePolicy {
    /// Refuse to load the document.
    #[default]
    Reject,
    /// Load the node as auto-resolving; its unconditioned options are ignored.
    ConditionedFirst,
}

impl fmt::Display for MixedNodePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixedNodePolicy::Reject => f.write_str("reject"),
            MixedNodePolicy::ConditionedFirst => f.write_str("conditioned_first"),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct EngineConfig {
    /// Seed for bonus draws. Absent means seeded from host entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Maximum transitions in a headless run.
    #[serde(default = "default_max_steps")]
    #[validate(range(min = 1, max = 1_000_000))]
    pub max_steps: usize,

    #[serde(default)]
    pub mixed_nodes: MixedNodePolicy,
}

fn default_max_steps() -> usize {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_steps: default_max_steps(),
            mixed_nodes: MixedNodePolicy::default(),
        }
    }
}
